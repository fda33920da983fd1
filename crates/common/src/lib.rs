//! Common types shared by every receipt analysis crate
//!
//! Holds the detection data model, the label vocabulary, and the error
//! taxonomy that adapters use to report why a source came back empty.

mod analysis;
mod detection;
mod label;

use std::time::Duration;
use thiserror::Error;

pub use analysis::{
    AnalysisResult, AnalysisStatus, ExtractedFields, ExtractedItem, ExtractedItems, Extraction,
};
pub use detection::{BoundingBox, Detection, DetectionError, GeometryError};
pub use label::{Label, LABEL_ALIASES};

/// Confidence assigned to every human-verified ground-truth detection
pub const GROUND_TRUTH_CONFIDENCE: f32 = 0.95;

/// Why a detection or extraction source produced nothing
///
/// None of these reach the caller of the fusion pipeline; they only decide
/// which fallback branch runs.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed source data: {0}")]
    Parse(String),

    #[error("Source timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type for source adapter operations
pub type Result<T> = std::result::Result<T, SourceError>;
