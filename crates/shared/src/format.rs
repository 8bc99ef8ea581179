//! File-name and file-size helpers shared by both controllers.

use crate::{
    domain::{SelectedFile, MOV_EXTENSION},
    error::ValidationError,
};

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Formats a byte count with base-1024 units and at most two decimals,
/// e.g. `1500000` -> `"1.43 MB"`. Anything past GB stays in GB.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", SIZE_UNITS[unit])
}

/// Strips the last extension: `clip.final.mov` -> `clip.final`.
pub fn base_name(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) => {
            let suffix = &file_name[idx + 1..];
            if suffix.is_empty() || suffix.contains('/') {
                file_name
            } else {
                &file_name[..idx]
            }
        }
        None => file_name,
    }
}

/// Name of the file produced by a real conversion.
pub fn converted_file_name(original: &str) -> String {
    format!("{}_converted.mp4", base_name(original))
}

/// Name of the file produced by the extension-only fallback.
pub fn renamed_file_name(original: &str) -> String {
    format!("{}.mp4", base_name(original))
}

pub fn has_mov_extension(file_name: &str) -> bool {
    file_name
        .to_ascii_lowercase()
        .ends_with(&format!(".{MOV_EXTENSION}"))
}

/// Checks the extension and, when `max_bytes` is set, the size.
pub fn validate_selection(
    file: &SelectedFile,
    max_bytes: Option<u64>,
) -> Result<(), ValidationError> {
    validate_name_and_size(file.name(), file.size(), max_bytes)
}

/// Same checks as [`validate_selection`] for a file not yet read.
pub fn validate_name_and_size(
    name: &str,
    size: u64,
    max_bytes: Option<u64>,
) -> Result<(), ValidationError> {
    if !has_mov_extension(name) {
        return Err(ValidationError::UnsupportedExtension {
            name: name.to_string(),
        });
    }

    if let Some(limit) = max_bytes {
        if size > limit {
            return Err(ValidationError::FileTooLarge {
                name: name.to_string(),
                size,
                limit,
            });
        }
    }

    Ok(())
}
