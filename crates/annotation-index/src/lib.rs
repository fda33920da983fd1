//! Ground-truth annotation index
//!
//! Loads a CVAT-style XML export of hand-labeled receipts and serves the
//! labeled boxes for an image by filename. The index is built once at
//! startup and never mutated afterwards, so it can be shared freely across
//! concurrent requests.
//!
//! # Example
//! ```no_run
//! use receipt_annotation_index::AnnotationIndex;
//!
//! let index = AnnotationIndex::load("data/annotations.xml");
//! if let Some(detections) = index.lookup("receipt1.jpg") {
//!     for detection in detections {
//!         println!("{} {:?} {}", detection.label, detection.bbox, detection.text);
//!     }
//! }
//! ```

mod error;
mod index;
mod parser;
pub mod yolo;

pub use error::{AnnotationError, Result};
pub use index::{AnnotationIndex, IndexStats};
pub use parser::{parse_annotations, AnnotatedImage, RawBox};
