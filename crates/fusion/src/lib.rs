//! Fusion Pipeline - Priority-ordered merge of receipt detection sources
//!
//! Produces one analysis result per uploaded receipt image from three
//! sources of different trust:
//!
//! 1. **Cloud extraction** runs first and fills `fields` and `items`. It never
//!    contributes geometry, and its failure is swallowed.
//! 2. **Ground truth** from the annotation index wins whenever the file name
//!    has an entry. The cloud text replaces the text of STORE, DATE and TOTAL
//!    boxes.
//! 3. **Local detector** boxes are used as-is when there is no ground truth.
//!
//! Geometry sources are tried in rank order and the first non-empty answer
//! is kept. There is no statistical merging. If every source comes back
//! empty the request fails with [`FusionError::NotFound`].
//!
//! ## Example
//!
//! ```rust
//! use receipt_annotation_index::AnnotationIndex;
//! use receipt_fusion::{FusionConfig, FusionPipeline};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let xml = r#"<annotations><image name="r.jpg">
//!     <box label="TOTAL" xtl="0" ytl="0" xbr="10" ybr="10"/>
//! </image></annotations>"#;
//! let index = Arc::new(AnnotationIndex::from_xml(xml).unwrap());
//! let pipeline = FusionPipeline::standard(FusionConfig::default(), None, index, None);
//!
//! let result = pipeline.analyze("r.jpg", b"").await.unwrap();
//! assert_eq!(result.detections.len(), 1);
//! # }
//! ```

mod assemble;
mod sources;
mod strategy;

use receipt_annotation_index::AnnotationIndex;
use receipt_common::{AnalysisResult, Extraction, SourceError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use assemble::SourceSettings;
pub use sources::{Detector, FieldSource};
pub use strategy::{
    backfill_text, AnalysisRequest, AnnotationStrategy, DetectorStrategy, GeometryStrategy,
    FIELD_FOR_LABEL,
};

/// Fusion errors
#[derive(Error, Debug)]
pub enum FusionError {
    #[error("No detections found for '{identifier}'. Loaded XML keys: {known_identifiers:?}")]
    NotFound {
        identifier: String,
        known_identifiers: Vec<String>,
    },
}

/// Configuration for the fusion pipeline
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// Deadline for the cloud call; expiry counts as a cloud failure
    pub cloud_timeout: Option<Duration>,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            cloud_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Shared, read-only pipeline; one instance serves every request
pub struct FusionPipeline {
    config: FusionConfig,
    field_source: Option<Arc<dyn FieldSource>>,
    strategies: Vec<Box<dyn GeometryStrategy>>,
    known_identifiers: Vec<String>,
}

impl FusionPipeline {
    /// Build a pipeline from an explicit strategy ranking
    ///
    /// `known_identifiers` only feeds the NotFound diagnostic.
    pub fn new(
        config: FusionConfig,
        field_source: Option<Arc<dyn FieldSource>>,
        strategies: Vec<Box<dyn GeometryStrategy>>,
        known_identifiers: Vec<String>,
    ) -> Self {
        Self {
            config,
            field_source,
            strategies,
            known_identifiers,
        }
    }

    /// Ground truth first, then the detector when one is loaded
    pub fn standard(
        config: FusionConfig,
        field_source: Option<Arc<dyn FieldSource>>,
        index: Arc<AnnotationIndex>,
        detector: Option<Arc<dyn Detector>>,
    ) -> Self {
        let known_identifiers = index.identifiers();

        let mut strategies: Vec<Box<dyn GeometryStrategy>> =
            vec![Box::new(AnnotationStrategy::new(index))];
        match detector {
            Some(detector) => strategies.push(Box::new(DetectorStrategy::new(detector))),
            None => warn!("No local detector loaded - only ground truth boxes are available"),
        }
        if field_source.is_none() {
            warn!("No cloud field source configured - fields and items will be empty");
        }

        Self::new(config, field_source, strategies, known_identifiers)
    }

    /// Names of the geometry strategies in rank order
    #[must_use]
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    #[must_use]
    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Analyze one image
    ///
    /// # Errors
    ///
    /// Returns `FusionError::NotFound` if no strategy produced a detection.
    pub async fn analyze(
        &self,
        identifier: &str,
        image: &[u8],
    ) -> Result<AnalysisResult, FusionError> {
        let extraction = self.extract_fields(image).await;

        let request = AnalysisRequest {
            identifier,
            image,
            extraction: &extraction,
        };

        for strategy in &self.strategies {
            let detections = strategy.detections(&request).await;
            if detections.is_empty() {
                debug!("Strategy {} found nothing for {:?}", strategy.name(), identifier);
                continue;
            }

            info!(
                "Analyzed {:?}: {} detections from {}, {} cloud fields, {} cloud items",
                identifier,
                detections.len(),
                strategy.name(),
                extraction.fields.len(),
                extraction.items.len()
            );
            return Ok(AnalysisResult::success(detections, extraction));
        }

        warn!("No detections found for {:?}", identifier);
        Err(FusionError::NotFound {
            identifier: identifier.to_string(),
            known_identifiers: self.known_identifiers.clone(),
        })
    }

    /// Cloud fields, or empty on absence, failure or deadline expiry
    async fn extract_fields(&self, image: &[u8]) -> Extraction {
        let Some(source) = &self.field_source else {
            return Extraction::default();
        };

        let call = source.extract_fields(image);
        let outcome = match self.config.cloud_timeout {
            Some(deadline) => tokio::time::timeout(deadline, call)
                .await
                .unwrap_or_else(|_| Err(SourceError::Timeout(deadline))),
            None => call.await,
        };

        match outcome {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!("Field source {} failed: {}", source.name(), e);
                Extraction::default()
            }
        }
    }
}
