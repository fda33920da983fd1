//! Build a pipeline from files and credentials
//!
//! Every source is optional at startup. A missing annotation file, model or
//! cloud credential is logged and that source is left out.

use crate::{Detector, FieldSource, FusionConfig, FusionPipeline};
use receipt_annotation_index::AnnotationIndex;
use receipt_cloud_extraction::{CloudExtractionConfig, ReceiptExtractor};
use receipt_object_detection::{ObjectDetectionConfig, ReceiptDetector};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Where each source lives
#[derive(Debug, Clone, Default)]
pub struct SourceSettings {
    /// Ground-truth XML
    pub annotations_path: Option<PathBuf>,
    /// YOLOv8 ONNX model
    pub model_path: Option<PathBuf>,
    pub detector: ObjectDetectionConfig,
    /// Document Intelligence connection; `None` disables the cloud
    pub cloud: Option<CloudExtractionConfig>,
    pub fusion: FusionConfig,
}

impl FusionPipeline {
    /// Load every configured source and rank them in the standard order
    pub fn load(settings: &SourceSettings) -> Self {
        let index = settings
            .annotations_path
            .as_ref()
            .map_or_else(AnnotationIndex::empty, AnnotationIndex::load);
        info!("Annotation index ready with {} images", index.len());

        let detector = settings.model_path.as_ref().and_then(|path| {
            match ReceiptDetector::new(path, settings.detector.clone()) {
                Ok(detector) => Some(Arc::new(detector) as Arc<dyn Detector>),
                Err(e) => {
                    warn!("Local detector disabled: {}", e);
                    None
                }
            }
        });

        let field_source = settings.cloud.clone().and_then(|config| {
            match ReceiptExtractor::new(config) {
                Ok(extractor) => Some(Arc::new(extractor) as Arc<dyn FieldSource>),
                Err(e) => {
                    warn!("Cloud extraction disabled: {}", e);
                    None
                }
            }
        });

        Self::standard(
            settings.fusion.clone(),
            field_source,
            Arc::new(index),
            detector,
        )
    }
}
