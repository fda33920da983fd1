//! End-to-end receipt analysis scenarios
//!
//! Each test wires a real annotation index into the fusion pipeline together
//! with scripted cloud and detector sources.

use anyhow::Result;
use async_trait::async_trait;
use receipt_annotation_index::{yolo::YOLO_CLASS_NAMES, AnnotationIndex};
use receipt_common::{BoundingBox, Detection, Extraction, Label, SourceError};
use receipt_fusion::{Detector, FieldSource, FusionConfig, FusionError, FusionPipeline};
use receipt_object_detection::DEFAULT_CLASS_NAMES;
use std::io::Write;
use std::sync::Arc;

const ANNOTATIONS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<annotations>
  <version>1.1</version>
  <meta><task><name>receipts</name></task></meta>
  <image id="0" name="receipt1.jpg" width="1000" height="1500">
    <box label="STORE" source="manual" occluded="0" xtl="100.5" ytl="40.25" xbr="620.0" ybr="110.75" z_order="0">
    </box>
  </image>
  <image id="1" name="receipt3.jpg" width="1000" height="1500">
    <box label="TOTAL" xtl="50" ytl="50" xbr="40" ybr="60"/>
  </image>
</annotations>
"#;

/// Cloud source returning a fixed extraction, or failing
struct ScriptedCloud(Option<Extraction>);

#[async_trait]
impl FieldSource for ScriptedCloud {
    fn name(&self) -> &str {
        "scripted-cloud"
    }

    async fn extract_fields(&self, _image: &[u8]) -> Result<Extraction, SourceError> {
        self.0
            .clone()
            .ok_or_else(|| SourceError::Unavailable("quota exceeded".to_string()))
    }
}

/// Detector returning one box per label
struct ScriptedDetector(Vec<&'static str>);

#[async_trait]
impl Detector for ScriptedDetector {
    fn name(&self) -> &str {
        "scripted-detector"
    }

    async fn detect_image(&self, _image: &[u8]) -> Result<Vec<Detection>, SourceError> {
        self.0
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let top = 100.0 * i as f32;
                let bbox = BoundingBox::from_edges(20.0, top, 300.0, top + 40.0)
                    .map_err(|e| SourceError::Parse(e.to_string()))?;
                Detection::new(Label::parse(label), bbox, "", 0.72)
                    .map_err(|e| SourceError::Parse(e.to_string()))
            })
            .collect()
    }
}

fn load_index() -> Result<Arc<AnnotationIndex>> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(ANNOTATIONS.as_bytes())?;
    Ok(Arc::new(AnnotationIndex::try_load(file.path())?))
}

fn merchant(name: &str) -> Extraction {
    let mut extraction = Extraction::default();
    extraction
        .fields
        .insert("MerchantName".to_string(), name.to_string());
    extraction
}

#[tokio::test]
async fn scenario_ground_truth_with_cloud_merchant() -> Result<()> {
    let index = load_index()?;
    let pipeline = FusionPipeline::standard(
        FusionConfig::default(),
        Some(Arc::new(ScriptedCloud(Some(merchant("Acme"))))),
        Arc::clone(&index),
        Some(Arc::new(ScriptedDetector(vec!["ITEM", "TOTAL"]))),
    );

    let result = pipeline.analyze("receipt1.jpg", b"jpeg").await?;

    assert_eq!(result.detections.len(), 1);
    let store = &result.detections[0];
    assert_eq!(store.label, Label::Store);
    assert_eq!(store.text, "Acme");
    assert_eq!(store.bbox.to_array(), [100.5, 40.25, 620.0, 110.75]);
    assert!((store.confidence - 0.95).abs() < f32::EPSILON);
    assert_eq!(result.fields.get("MerchantName").map(String::as_str), Some("Acme"));

    let json = serde_json::to_value(&result)?;
    assert_eq!(json["status"], "success");
    assert_eq!(json["detections"][0]["label"], "STORE");
    Ok(())
}

#[tokio::test]
async fn scenario_detector_fallback_with_failed_cloud() -> Result<()> {
    let pipeline = FusionPipeline::standard(
        FusionConfig::default(),
        Some(Arc::new(ScriptedCloud(None))),
        load_index()?,
        Some(Arc::new(ScriptedDetector(vec!["item", "total"]))),
    );

    let result = pipeline.analyze("receipt2.jpg", b"jpeg").await?;

    let labels: Vec<&str> = result.detections.iter().map(|d| d.label.as_str()).collect();
    assert_eq!(labels, vec!["item", "total"]);
    assert!(result.detections.iter().all(|d| d.text.is_empty()));
    assert!(result.fields.is_empty());
    assert!(result.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn scenario_no_sources_is_not_found() -> Result<()> {
    let pipeline = FusionPipeline::standard(
        FusionConfig::default(),
        Some(Arc::new(ScriptedCloud(Some(merchant("Acme"))))),
        load_index()?,
        None,
    );

    let err = pipeline
        .analyze("receipt2.jpg", b"jpeg")
        .await
        .expect_err("no source can produce boxes");
    let FusionError::NotFound {
        identifier,
        known_identifiers,
    } = err;
    assert_eq!(identifier, "receipt2.jpg");
    assert_eq!(known_identifiers, vec!["receipt1.jpg".to_string()]);
    Ok(())
}

#[tokio::test]
async fn degenerate_ground_truth_never_returned() -> Result<()> {
    let index = load_index()?;
    assert!(index.lookup("receipt3.jpg").is_none());
    assert_eq!(index.stats().dropped_boxes, 1);

    let pipeline = FusionPipeline::standard(
        FusionConfig::default(),
        None,
        index,
        Some(Arc::new(ScriptedDetector(vec!["TOTAL"]))),
    );
    let result = pipeline.analyze("receipt3.jpg", b"jpeg").await?;
    assert_eq!(result.detections.len(), 1);
    assert!((result.detections[0].confidence - 0.72).abs() < f32::EPSILON);
    Ok(())
}

#[test]
fn detector_classes_match_training_export() {
    assert_eq!(DEFAULT_CLASS_NAMES, YOLO_CLASS_NAMES);
}
