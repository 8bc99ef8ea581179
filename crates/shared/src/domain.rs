use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

/// Largest input accepted by the primary converter (500 MiB).
pub const MAX_INPUT_BYTES: u64 = 500 * 1024 * 1024;
pub const MP4_MEDIA_TYPE: &str = "video/mp4";
pub const MOV_EXTENSION: &str = "mov";

/// A file chosen by the user, held entirely in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedFile {
    name: String,
    bytes: Arc<[u8]>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shares the content without copying it.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }
}

impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("size", &self.size())
            .finish()
    }
}

/// Name and formatted size shown next to the upload area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub size_label: String,
}

impl From<&SelectedFile> for FileInfo {
    fn from(file: &SelectedFile) -> Self {
        Self {
            name: file.name().to_string(),
            size_label: crate::format::format_file_size(file.size()),
        }
    }
}

/// Bytes handed to the host for download, with the name and media type they
/// should be saved under.
#[derive(Clone, PartialEq, Eq)]
pub struct DownloadArtifact {
    pub file_name: String,
    pub media_type: &'static str,
    pub bytes: Arc<[u8]>,
}

impl DownloadArtifact {
    pub fn mp4(file_name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: MP4_MEDIA_TYPE,
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl fmt::Debug for DownloadArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadArtifact")
            .field("file_name", &self.file_name)
            .field("media_type", &self.media_type)
            .field("size", &self.size())
            .finish()
    }
}

/// Host features the in-browser engine depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CapabilityReport {
    pub webassembly: bool,
    pub shared_memory: bool,
    pub workers: bool,
    pub file_reading: bool,
}

impl CapabilityReport {
    pub fn all_present(&self) -> bool {
        self.webassembly && self.shared_memory && self.workers && self.file_reading
    }

    /// What a native (non-browser) host offers: threads and file access, no
    /// WebAssembly runtime.
    pub fn native() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get() > 1)
            .unwrap_or(false);
        Self {
            webassembly: cfg!(target_arch = "wasm32"),
            shared_memory: true,
            workers,
            file_reading: true,
        }
    }
}
