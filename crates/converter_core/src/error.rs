//! Converter failures and the text shown for them.

use shared::error::ValidationError;
use thiserror::Error;
use transcoder::{EngineError, EngineErrorKind};

use crate::compat::{BrowserFamily, UNSUPPORTED_BROWSER_MESSAGE};

pub const CONVERSION_FAILED_MESSAGE: &str =
    "Conversion failed. Please try again or use a different file.";
pub const CONVERSION_UNAVAILABLE_MESSAGE: &str =
    "Browser-based conversion is not available. Please use the alternative solutions above.";

#[derive(Debug, Error)]
pub enum ConverterError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{family} {version} is older than the supported {family} {minimum}")]
    IncompatibleBrowser {
        family: BrowserFamily,
        version: u32,
        minimum: u32,
    },
    #[error("host has no WebAssembly runtime")]
    MissingWebAssembly,
    #[error("transcoding engine failed to load: {source}")]
    EngineLoad { source: EngineError },
    #[error("conversion failed: {source}")]
    Conversion { source: EngineError },
    #[error("a conversion is already running")]
    Busy,
    #[error("in-browser conversion is not available")]
    ConversionUnavailable,
    #[error("failed to deliver download: {source}")]
    Delivery {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ConverterError {
    /// Text rendered in the error region.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.user_message(),
            Self::IncompatibleBrowser { .. } | Self::MissingWebAssembly => {
                UNSUPPORTED_BROWSER_MESSAGE.to_string()
            }
            Self::EngineLoad { source } => load_diagnostic(source.kind()),
            Self::Conversion { .. } => CONVERSION_FAILED_MESSAGE.to_string(),
            Self::Busy => "Please wait for the current conversion to finish.".to_string(),
            Self::ConversionUnavailable => CONVERSION_UNAVAILABLE_MESSAGE.to_string(),
            Self::Delivery { .. } => "The converted file could not be saved.".to_string(),
        }
    }
}

pub fn load_diagnostic(kind: EngineErrorKind) -> String {
    let hint = match kind {
        EngineErrorKind::SharedMemoryUnavailable => {
            "Your browser needs to support SharedArrayBuffer. Try using Chrome, Firefox, or Edge with the latest version."
        }
        EngineErrorKind::WorkerLoadFailed => {
            "Web Worker loading failed. Make sure you're accessing the page over http:// (not file://)."
        }
        EngineErrorKind::CrossOriginBlocked => {
            "Cross-origin loading blocked. Please make sure the server is running with proper CORS headers."
        }
        EngineErrorKind::AssetFetchFailed => {
            "Could not load FFmpeg files. Make sure all files are present in the ./ffmpeg/ directory."
        }
        _ => "Please check the browser console for details and try refreshing the page.",
    };
    format!("Failed to load video converter. {hint}")
}
