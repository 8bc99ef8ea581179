//! Contract for the external transcoding engine and a native-process adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

pub mod args;
mod process;

pub use process::ProcessEngine;

pub const DEFAULT_CORE_SCRIPT: &str = "/ffmpeg-core.js";
pub const DEFAULT_WASM_MODULE: &str = "/ffmpeg-core.wasm";

/// Same-origin locations of the engine's core script and binary module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineAssets {
    pub core_script: String,
    pub wasm_module: String,
}

impl Default for EngineAssets {
    fn default() -> Self {
        Self {
            core_script: DEFAULT_CORE_SCRIPT.into(),
            wasm_module: DEFAULT_WASM_MODULE.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Log(String),
    /// Fractional completion of the running `exec`, 0.0 to 1.0.
    Progress(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    SharedMemoryUnavailable,
    WorkerLoadFailed,
    CrossOriginBlocked,
    AssetFetchFailed,
    ExecutionFailed,
    FileNotFound,
    Io,
    Other,
}

impl EngineErrorKind {
    /// Best-effort kind for engines that only report text.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("sharedarraybuffer") || lower.contains("shared memory") {
            Self::SharedMemoryUnavailable
        } else if lower.contains("worker") {
            Self::WorkerLoadFailed
        } else if lower.contains("cors") || lower.contains("cross-origin") {
            Self::CrossOriginBlocked
        } else if lower.contains("fetch") {
            Self::AssetFetchFailed
        } else {
            Self::Other
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: EngineErrorKind::classify(&message),
            message,
        }
    }

    pub fn kind(&self) -> EngineErrorKind {
        self.kind
    }
}

/// The call/response surface of the transcoding engine: a private virtual
/// filesystem plus command-line style execution.
#[async_trait]
pub trait TranscodingEngine: Send + Sync {
    async fn load(&self, assets: &EngineAssets) -> Result<(), EngineError>;
    async fn write_file(&self, name: &str, bytes: &[u8]) -> Result<(), EngineError>;
    async fn exec(&self, args: &[String]) -> Result<(), EngineError>;
    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError>;
    async fn delete_file(&self, name: &str) -> Result<(), EngineError>;
    fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_load_failures() {
        assert_eq!(
            EngineErrorKind::classify("SharedArrayBuffer is not defined"),
            EngineErrorKind::SharedMemoryUnavailable
        );
        assert_eq!(
            EngineErrorKind::classify("failed to construct 'Worker'"),
            EngineErrorKind::WorkerLoadFailed
        );
        assert_eq!(
            EngineErrorKind::classify("blocked by CORS policy"),
            EngineErrorKind::CrossOriginBlocked
        );
        assert_eq!(
            EngineErrorKind::classify("TypeError: Failed to fetch"),
            EngineErrorKind::AssetFetchFailed
        );
        assert_eq!(
            EngineErrorKind::classify("out of memory"),
            EngineErrorKind::Other
        );
    }

    #[test]
    fn shared_memory_wins_over_worker_wording() {
        let err = EngineError::from_message("Worker needs SharedArrayBuffer");
        assert_eq!(err.kind(), EngineErrorKind::SharedMemoryUnavailable);
    }

    #[test]
    fn default_assets_are_same_origin_paths() {
        let assets = EngineAssets::default();
        assert_eq!(assets.core_script, "/ffmpeg-core.js");
        assert_eq!(assets.wasm_module, "/ffmpeg-core.wasm");
    }
}
