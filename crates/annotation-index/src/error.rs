//! Error types for annotation loading

use receipt_common::{DetectionError, SourceError};
use std::io;
use thiserror::Error;

/// Annotation loading errors
#[derive(Debug, Error)]
pub enum AnnotationError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed XML; the whole document is rejected
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Document ended before every element was closed
    #[error("Document ended with {open_elements} unclosed elements")]
    Truncated { open_elements: usize },

    /// One box could not be turned into a detection
    #[error("Invalid box: {0}")]
    InvalidBox(String),

    /// Image entry lacks the dimensions needed for normalized export
    #[error("Image {0} has no usable width/height")]
    MissingDimensions(String),
}

impl From<DetectionError> for AnnotationError {
    fn from(err: DetectionError) -> Self {
        AnnotationError::InvalidBox(err.to_string())
    }
}

impl From<AnnotationError> for SourceError {
    fn from(err: AnnotationError) -> Self {
        match err {
            AnnotationError::Io(e) => SourceError::Unavailable(e.to_string()),
            other => SourceError::Parse(other.to_string()),
        }
    }
}

/// Result type for annotation operations
pub type Result<T> = std::result::Result<T, AnnotationError>;
