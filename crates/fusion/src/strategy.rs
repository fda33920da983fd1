//! Ranked geometry strategies
//!
//! Each strategy proposes the boxes for an image. The pipeline asks them in
//! rank order and keeps the first non-empty answer.

use crate::sources::Detector;
use async_trait::async_trait;
use receipt_annotation_index::AnnotationIndex;
use receipt_common::{Detection, ExtractedFields, Extraction};
use std::sync::Arc;
use tracing::{debug, warn};

/// Detection label -> cloud field whose value replaces the box text
pub const FIELD_FOR_LABEL: &[(&str, &str)] = &[
    ("TOTAL", "Total"),
    ("DATE", "TransactionDate"),
    ("STORE", "MerchantName"),
];

/// Everything a strategy may look at for one request
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    /// Uploaded file name, matched exactly against the index
    pub identifier: &'a str,
    pub image: &'a [u8],
    /// Cloud output, possibly empty
    pub extraction: &'a Extraction,
}

/// One source of box geometry
#[async_trait]
pub trait GeometryStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Boxes for the request, or an empty list to fall through
    async fn detections(&self, request: &AnalysisRequest<'_>) -> Vec<Detection>;
}

/// Overwrite the text of STORE, DATE and TOTAL boxes with matching cloud fields
///
/// Geometry, label and confidence are left alone. Labels without a field, or
/// whose field the cloud did not return, keep their text.
pub fn backfill_text(detections: &mut [Detection], fields: &ExtractedFields) {
    for detection in detections {
        let Some(value) = FIELD_FOR_LABEL
            .iter()
            .find(|(label, _)| *label == detection.label.as_str())
            .and_then(|(_, field)| fields.get(*field))
        else {
            continue;
        };
        detection.text.clone_from(value);
    }
}

/// Human-verified boxes from the annotation index, with cloud text backfill
pub struct AnnotationStrategy {
    index: Arc<AnnotationIndex>,
}

impl AnnotationStrategy {
    pub fn new(index: Arc<AnnotationIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl GeometryStrategy for AnnotationStrategy {
    fn name(&self) -> &'static str {
        "ground-truth"
    }

    async fn detections(&self, request: &AnalysisRequest<'_>) -> Vec<Detection> {
        let Some(indexed) = self.index.lookup(request.identifier) else {
            debug!("No annotation entry for {:?}", request.identifier);
            return Vec::new();
        };

        let mut detections = indexed.to_vec();
        backfill_text(&mut detections, &request.extraction.fields);
        detections
    }
}

/// Boxes predicted by the local detector, used as-is
pub struct DetectorStrategy {
    detector: Arc<dyn Detector>,
}

impl DetectorStrategy {
    pub fn new(detector: Arc<dyn Detector>) -> Self {
        Self { detector }
    }
}

#[async_trait]
impl GeometryStrategy for DetectorStrategy {
    fn name(&self) -> &'static str {
        "detector"
    }

    async fn detections(&self, request: &AnalysisRequest<'_>) -> Vec<Detection> {
        match self.detector.detect_image(request.image).await {
            Ok(detections) => detections,
            Err(e) => {
                warn!("Detector {} failed: {}", self.detector.name(), e);
                Vec::new()
            }
        }
    }
}
