use thiserror::Error;

/// Reasons a selected file is refused before any state changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("'{name}' is not a .mov file")]
    UnsupportedExtension { name: String },
    #[error("'{name}' is {size} bytes, above the {limit} byte limit")]
    FileTooLarge { name: String, size: u64, limit: u64 },
}

impl ValidationError {
    /// Text rendered in the error region.
    pub fn user_message(&self) -> String {
        match self {
            Self::UnsupportedExtension { .. } => "Please select a valid MOV file.".to_string(),
            Self::FileTooLarge { limit, .. } => format!(
                "File size too large. Please select a file smaller than {}MB.",
                limit / (1024 * 1024)
            ),
        }
    }
}
