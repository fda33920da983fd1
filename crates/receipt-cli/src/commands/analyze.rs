//! Analyze one receipt image in-process

use super::overlay::{draw_detections, load_font};
use anyhow::{Context as _, Result};
use clap::Args;
use receipt_cloud_extraction::CloudExtractionConfig;
use receipt_fusion::{FusionConfig, FusionPipeline, SourceSettings};
use receipt_object_detection::ObjectDetectionConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Args)]
pub struct AnalyzeCommand {
    /// Receipt image; its file name is the ground-truth lookup key
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    /// Ground-truth XML file
    #[arg(long, default_value = "data/annotations.xml")]
    annotations: PathBuf,

    /// YOLOv8 ONNX model
    #[arg(long, default_value = "models/receipt-yolov8.onnx")]
    model: PathBuf,

    /// Detector class names in id order
    #[arg(long, value_delimiter = ',', env = "YOLO_CLASS_NAMES")]
    class_names: Vec<String>,

    /// Seconds to wait for cloud extraction
    #[arg(long, default_value = "30", env = "CLOUD_TIMEOUT_SECS")]
    cloud_timeout: u64,

    /// Skip cloud extraction even if credentials are set
    #[arg(long)]
    no_cloud: bool,

    /// Also write the image with the detections drawn on it
    #[arg(long, value_name = "OUT.png")]
    overlay: Option<PathBuf>,

    /// TrueType font for overlay labels; a system font is used if omitted
    #[arg(long, requires = "overlay")]
    font: Option<PathBuf>,
}

impl AnalyzeCommand {
    pub async fn execute(self) -> Result<()> {
        let bytes = std::fs::read(&self.image)
            .with_context(|| format!("Failed to read {}", self.image.display()))?;
        let identifier = identifier_for(&self.image);

        let pipeline = FusionPipeline::load(&self.source_settings());
        let result = pipeline
            .analyze(&identifier, &bytes)
            .await
            .with_context(|| format!("Analysis of {} failed", self.image.display()))?;

        println!("{}", serde_json::to_string_pretty(&result)?);

        if let Some(out) = &self.overlay {
            let mut image = image::load_from_memory(&bytes)
                .context("Failed to decode image for overlay")?
                .to_rgb8();
            let font = load_font(self.font.as_deref());
            draw_detections(&mut image, &result.detections, font.as_ref());
            image
                .save(out)
                .with_context(|| format!("Failed to write overlay {}", out.display()))?;
            info!("Overlay written to {}", out.display());
        }

        Ok(())
    }

    fn source_settings(&self) -> SourceSettings {
        let mut detector = ObjectDetectionConfig::default();
        if !self.class_names.is_empty() {
            detector = detector.with_class_names(self.class_names.iter().map(|s| s.trim()));
        }

        let cloud = if self.no_cloud {
            None
        } else {
            cloud_from_env()
        };

        SourceSettings {
            annotations_path: Some(self.annotations.clone()),
            model_path: Some(self.model.clone()),
            detector,
            cloud,
            fusion: FusionConfig {
                cloud_timeout: Some(Duration::from_secs(self.cloud_timeout)),
            },
        }
    }
}

/// File name of the image, trimmed, as the ground-truth key
fn identifier_for(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().trim().to_string())
        .unwrap_or_default()
}

fn cloud_from_env() -> Option<CloudExtractionConfig> {
    let endpoint = std::env::var("AZURE_DI_ENDPOINT").ok()?;
    let key = std::env::var("AZURE_DI_KEY").ok()?;
    Some(CloudExtractionConfig::new(endpoint, key))
}
