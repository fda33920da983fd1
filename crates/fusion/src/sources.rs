//! Source seams: where fields and detector boxes come from

use async_trait::async_trait;
use receipt_cloud_extraction::ReceiptExtractor;
use receipt_common::{Detection, Extraction, SourceError};
use receipt_object_detection::ReceiptDetector;

/// Text fields and line items for an image, without geometry
#[async_trait]
pub trait FieldSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn extract_fields(&self, image: &[u8]) -> Result<Extraction, SourceError>;
}

/// Boxes predicted from image pixels
#[async_trait]
pub trait Detector: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn detect_image(&self, image: &[u8]) -> Result<Vec<Detection>, SourceError>;
}

#[async_trait]
impl FieldSource for ReceiptExtractor {
    fn name(&self) -> &str {
        "azure-document-intelligence"
    }

    async fn extract_fields(&self, image: &[u8]) -> Result<Extraction, SourceError> {
        Ok(self.try_extract(image).await?)
    }
}

#[async_trait]
impl Detector for ReceiptDetector {
    fn name(&self) -> &str {
        "yolov8"
    }

    /// Runs inference on the blocking pool; the session itself is shared
    async fn detect_image(&self, image: &[u8]) -> Result<Vec<Detection>, SourceError> {
        let detector = self.clone();
        let bytes = image.to_vec();

        let detections = tokio::task::spawn_blocking(move || detector.detect_bytes(&bytes))
            .await
            .map_err(|e| SourceError::Unavailable(format!("Detector task failed: {e}")))??;

        Ok(detections)
    }
}
