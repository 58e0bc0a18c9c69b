use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the detection and cropping core.
#[derive(Debug, Error)]
pub enum CropError {
    /// The source raster could not be read or decoded.
    #[error("failed to load image {}: {source}", path.display())]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A candidate quad collapses to zero width, zero height or coincident corners.
    #[error("degenerate quad: {reason}")]
    DegenerateQuad { reason: String },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("failed to write image {}: {source}", path.display())]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CropError {
    pub fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegenerateQuad {
            reason: reason.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Whether the error only invalidates one candidate rather than the whole image.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::DegenerateQuad { .. })
    }
}

pub type Result<T> = std::result::Result<T, CropError>;
