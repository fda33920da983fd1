//! Receipt region detection using `YOLOv8` via ONNX Runtime
//!
//! Wraps a `YOLOv8` model fine-tuned on receipt regions and exported to ONNX.
//! The detector only localizes and classifies; it never reads text, so every
//! detection it emits has an empty `text`.
//!
//! # Features
//! - Class names supplied by configuration (defaults to the receipt classes)
//! - Boxes mapped back to original image pixels
//! - Per-class non-maximum suppression, as the exported model's runtime does
//! - Session loaded once and shared behind a mutex
//!
//! # Example
//! ```no_run
//! use receipt_object_detection::{ObjectDetectionConfig, ReceiptDetector};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let detector = ReceiptDetector::new("models/receipt-yolov8.onnx", ObjectDetectionConfig::default())?;
//!
//! let bytes = std::fs::read("receipt.jpg")?;
//! for detection in detector.detect_bytes(&bytes)? {
//!     println!("{}: {:.2}%", detection.label, detection.confidence * 100.0);
//! }
//! # Ok(())
//! # }
//! ```

use image::RgbImage;
use ndarray::Array;
use ort::{
    execution_providers::CPUExecutionProvider,
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use receipt_common::{BoundingBox, Detection, Label, SourceError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

/// Class names of the receipt model, in class-id order
pub const DEFAULT_CLASS_NAMES: &[&str] = &["STORE", "DATE_TIME", "ITEM", "TOTAL"];

/// Configuration for receipt detection
///
/// The thresholds are the model's own decoding parameters, matching the
/// defaults the model was validated with. No further filtering is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectDetectionConfig {
    /// Minimum class score for a candidate box (0.0-1.0)
    pub confidence_threshold: f32,
    /// `IoU` threshold for non-maximum suppression (0.0-1.0)
    pub iou_threshold: f32,
    /// Maximum number of detections to return per image
    pub max_detections: usize,
    /// Input image size (`YOLOv8` default is 640x640)
    pub input_size: u32,
    /// Label for each class id
    pub class_names: Vec<String>,
}

impl Default for ObjectDetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
            max_detections: 300,
            input_size: 640,
            class_names: DEFAULT_CLASS_NAMES.iter().map(ToString::to_string).collect(),
        }
    }
}

impl ObjectDetectionConfig {
    /// Replace the class names
    #[must_use]
    pub fn with_class_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.class_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Class name for a class id, `"unknown"` when out of range
    #[must_use]
    pub fn class_name(&self, class_id: usize) -> &str {
        self.class_names
            .get(class_id)
            .map_or("unknown", String::as_str)
    }
}

/// One decoded model prediction in original image pixels
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Receipt detector backed by a shared ONNX session
///
/// Cloning is cheap; clones share the session. `Session::run` needs
/// exclusive access, so inference calls are serialized by the mutex.
#[derive(Clone)]
pub struct ReceiptDetector {
    session: Arc<Mutex<Session>>,
    config: Arc<ObjectDetectionConfig>,
}

impl ReceiptDetector {
    /// Load the ONNX model at `model_path`
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        config: ObjectDetectionConfig,
    ) -> Result<Self, ObjectDetectionError> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(ObjectDetectionError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        info!("Loading YOLOv8 model from {}", model_path.display());

        let session = Session::builder()
            .map_err(|e| ObjectDetectionError::ModelLoad(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ObjectDetectionError::ModelLoad(e.to_string()))?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .map_err(|e| ObjectDetectionError::ModelLoad(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| ObjectDetectionError::ModelLoad(e.to_string()))?;

        info!(
            "YOLOv8 model loaded successfully ({} classes configured)",
            config.class_names.len()
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            config: Arc::new(config),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ObjectDetectionConfig {
        &self.config
    }

    /// Detect receipt regions in encoded image bytes (JPEG, PNG, ...)
    pub fn detect_bytes(&self, bytes: &[u8]) -> Result<Vec<Detection>, ObjectDetectionError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| ObjectDetectionError::ImageDecode(e.to_string()))?
            .to_rgb8();
        self.detect(&image)
    }

    /// Detect receipt regions in a decoded image
    pub fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, ObjectDetectionError> {
        debug!(
            "Running receipt detection on {}x{} image",
            image.width(),
            image.height()
        );

        let input_array = Self::preprocess_image(image, &self.config);

        let predictions = {
            let mut session = self.session.lock().map_err(|e| {
                ObjectDetectionError::Inference(format!("Failed to lock session mutex: {e}"))
            })?;

            // Zero-copy tensor: use view instead of clone
            let input_tensor = TensorRef::from_array_view(input_array.view())
                .map_err(|e| ObjectDetectionError::Inference(e.to_string()))?;
            let outputs = session
                .run(ort::inputs![input_tensor])
                .map_err(|e| ObjectDetectionError::Inference(e.to_string()))?;

            let (shape, data) = outputs[0].try_extract_tensor::<f32>().map_err(|e| {
                ObjectDetectionError::Inference(format!("Failed to extract tensor: {e}"))
            })?;
            let dims: Vec<usize> = shape.as_ref().iter().map(|&d| d.max(0) as usize).collect();
            debug!("ONNX output shape: {:?}", dims);

            decode_predictions(&dims, data, image.width(), image.height(), &self.config)?
        };

        let detections: Vec<Detection> = predictions
            .into_iter()
            .filter_map(|p| {
                let label = Label::parse(self.config.class_name(p.class_id));
                Detection::new(label, p.bbox, "", p.confidence).ok()
            })
            .collect();

        info!("Detected {} receipt regions", detections.len());

        Ok(detections)
    }

    /// Resize to the model input and lay out as (1, 3, H, W) in [0, 1]
    fn preprocess_image(
        image: &RgbImage,
        config: &ObjectDetectionConfig,
    ) -> Array<f32, ndarray::Dim<[usize; 4]>> {
        let input_size = config.input_size;

        let resized = image::imageops::resize(
            image,
            input_size,
            input_size,
            image::imageops::FilterType::Triangle,
        );

        let mut input_array = Array::zeros((1, 3, input_size as usize, input_size as usize));

        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            input_array[[0, 0, y, x]] = f32::from(pixel[0]) / 255.0;
            input_array[[0, 1, y, x]] = f32::from(pixel[1]) / 255.0;
            input_array[[0, 2, y, x]] = f32::from(pixel[2]) / 255.0;
        }

        input_array
    }
}

/// Decode a raw `YOLOv8` output tensor into predictions
///
/// `dims` is `[batch, 4 + classes, anchors]`; each anchor carries a center
/// box in model input pixels followed by one score per class. Boxes are
/// scaled to `image_width` x `image_height` and clipped to the image.
pub fn decode_predictions(
    dims: &[usize],
    data: &[f32],
    image_width: u32,
    image_height: u32,
    config: &ObjectDetectionConfig,
) -> Result<Vec<Prediction>, ObjectDetectionError> {
    if dims.len() != 3 {
        return Err(ObjectDetectionError::Inference(format!(
            "Expected 3D output tensor, got {}D",
            dims.len()
        )));
    }

    let num_features = dims[1];
    let num_anchors = dims[2];
    if num_features <= 4 {
        return Err(ObjectDetectionError::Inference(format!(
            "Output has {num_features} features, expected box coordinates plus class scores"
        )));
    }
    if data.len() < num_features * num_anchors {
        return Err(ObjectDetectionError::Inference(format!(
            "Output tensor holds {} values, shape needs {}",
            data.len(),
            num_features * num_anchors
        )));
    }
    let num_classes = num_features - 4;

    let scale_x = image_width as f32 / config.input_size as f32;
    let scale_y = image_height as f32 / config.input_size as f32;
    let max_x = image_width as f32;
    let max_y = image_height as f32;

    let mut raw = Vec::with_capacity(num_anchors / 10);

    // Layout [batch, features, anchors]: feature f of anchor a is data[f * anchors + a]
    for anchor_idx in 0..num_anchors {
        let feature = |feature_idx: usize| data[feature_idx * num_anchors + anchor_idx];

        let (class_id, confidence) = (0..num_classes)
            .map(|class_id| (class_id, feature(4 + class_id)))
            .fold((0usize, f32::MIN), |best, candidate| {
                if candidate.1 > best.1 {
                    candidate
                } else {
                    best
                }
            });

        if confidence < config.confidence_threshold || !(0.0..=1.0).contains(&confidence) {
            continue;
        }

        let (x_center, y_center, width, height) = (feature(0), feature(1), feature(2), feature(3));

        let left = ((x_center - width / 2.0) * scale_x).clamp(0.0, max_x);
        let top = ((y_center - height / 2.0) * scale_y).clamp(0.0, max_y);
        let right = ((x_center + width / 2.0) * scale_x).clamp(0.0, max_x);
        let bottom = ((y_center + height / 2.0) * scale_y).clamp(0.0, max_y);

        match BoundingBox::from_edges(left, top, right, bottom) {
            Ok(bbox) => raw.push(Prediction {
                class_id,
                confidence,
                bbox,
            }),
            Err(e) => debug!("Dropping malformed prediction at anchor {}: {}", anchor_idx, e),
        }
    }

    debug!("Raw predictions before NMS: {}", raw.len());

    let mut kept = apply_nms(raw, config.iou_threshold);
    kept.truncate(config.max_detections);

    Ok(kept)
}

/// Per-class non-maximum suppression, highest confidence first
pub fn apply_nms(mut predictions: Vec<Prediction>, iou_threshold: f32) -> Vec<Prediction> {
    predictions.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Prediction> = Vec::with_capacity(predictions.len());
    for candidate in predictions {
        let suppressed = keep.iter().any(|kept| {
            kept.class_id == candidate.class_id && kept.bbox.iou(&candidate.bbox) >= iou_threshold
        });
        if !suppressed {
            keep.push(candidate);
        }
    }

    debug!("Predictions after NMS: {}", keep.len());
    keep
}

/// Error types for receipt detection
#[derive(Debug, Error)]
pub enum ObjectDetectionError {
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Could not decode image: {0}")]
    ImageDecode(String),
}

impl From<ObjectDetectionError> for SourceError {
    fn from(err: ObjectDetectionError) -> Self {
        match err {
            ObjectDetectionError::ModelNotFound(_) | ObjectDetectionError::ModelLoad(_) => {
                SourceError::Unavailable(err.to_string())
            }
            ObjectDetectionError::Inference(_) | ObjectDetectionError::ImageDecode(_) => {
                SourceError::Parse(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a [1, 4 + classes, anchors] tensor from per-anchor rows
    fn tensor(rows: &[Vec<f32>]) -> (Vec<usize>, Vec<f32>) {
        let features = rows[0].len();
        let anchors = rows.len();
        let mut data = vec![0.0; features * anchors];
        for (anchor, row) in rows.iter().enumerate() {
            for (feature, value) in row.iter().enumerate() {
                data[feature * anchors + anchor] = *value;
            }
        }
        (vec![1, features, anchors], data)
    }

    #[test]
    fn test_config_defaults() {
        let config = ObjectDetectionConfig::default();
        assert_eq!(config.confidence_threshold, 0.25);
        assert_eq!(config.iou_threshold, 0.7);
        assert_eq!(config.max_detections, 300);
        assert_eq!(config.input_size, 640);
        assert_eq!(config.class_names, DEFAULT_CLASS_NAMES);
    }

    #[test]
    fn test_class_name_lookup() {
        let config = ObjectDetectionConfig::default().with_class_names(["item", "total"]);
        assert_eq!(config.class_name(0), "item");
        assert_eq!(config.class_name(1), "total");
        assert_eq!(config.class_name(7), "unknown");
    }

    #[test]
    fn test_decode_scales_to_original_image() {
        let config = ObjectDetectionConfig::default();
        // Box centered at (320, 320), 64x32 in model space, class 3 (TOTAL)
        let (dims, data) = tensor(&[vec![320.0, 320.0, 64.0, 32.0, 0.1, 0.0, 0.0, 0.9]]);

        let predictions = decode_predictions(&dims, &data, 1280, 640, &config).unwrap();
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].class_id, 3);
        assert_eq!(predictions[0].confidence, 0.9);
        assert_eq!(predictions[0].bbox.to_array(), [576.0, 304.0, 704.0, 336.0]);
    }

    #[test]
    fn test_decode_drops_low_scores_and_clips() {
        let config = ObjectDetectionConfig::default();
        let (dims, data) = tensor(&[
            vec![10.0, 10.0, 40.0, 40.0, 0.8, 0.0, 0.0, 0.0],
            vec![300.0, 300.0, 10.0, 10.0, 0.1, 0.2, 0.0, 0.0],
        ]);

        let predictions = decode_predictions(&dims, &data, 640, 640, &config).unwrap();
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].bbox.to_array(), [0.0, 0.0, 30.0, 30.0]);
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        let config = ObjectDetectionConfig::default();
        assert!(decode_predictions(&[1, 8], &[0.0; 8], 640, 640, &config).is_err());
        assert!(decode_predictions(&[1, 4, 2], &[0.0; 8], 640, 640, &config).is_err());
        assert!(decode_predictions(&[1, 8, 4], &[0.0; 8], 640, 640, &config).is_err());
    }

    #[test]
    fn test_nms_is_per_class() {
        let bbox = BoundingBox::from_edges(0.0, 0.0, 100.0, 100.0).unwrap();
        let shifted = BoundingBox::from_edges(5.0, 5.0, 105.0, 105.0).unwrap();
        let predictions = vec![
            Prediction {
                class_id: 2,
                confidence: 0.6,
                bbox: shifted,
            },
            Prediction {
                class_id: 2,
                confidence: 0.9,
                bbox,
            },
            Prediction {
                class_id: 3,
                confidence: 0.5,
                bbox,
            },
        ];

        let kept = apply_nms(predictions, 0.7);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].class_id, 3);
    }

    #[test]
    fn test_max_detections_limit() {
        let config = ObjectDetectionConfig {
            max_detections: 2,
            ..Default::default()
        };
        let rows: Vec<Vec<f32>> = (0..5)
            .map(|i| {
                let x = 50.0 + 100.0 * i as f32;
                vec![x, 50.0, 20.0, 20.0, 0.5, 0.0, 0.0, 0.0]
            })
            .collect();
        let (dims, data) = tensor(&rows);

        let predictions = decode_predictions(&dims, &data, 640, 640, &config).unwrap();
        assert_eq!(predictions.len(), 2);
    }

    #[test]
    fn test_missing_model() {
        let result = ReceiptDetector::new("nonexistent_model.onnx", ObjectDetectionConfig::default());
        assert!(matches!(result, Err(ObjectDetectionError::ModelNotFound(_))));
    }

    #[test]
    fn test_error_maps_to_source_error() {
        let err: SourceError = ObjectDetectionError::ModelNotFound("x.onnx".into()).into();
        assert!(matches!(err, SourceError::Unavailable(_)));

        let err: SourceError = ObjectDetectionError::ModelLoad("bad graph".into()).into();
        assert!(matches!(err, SourceError::Unavailable(_)));

        let err: SourceError = ObjectDetectionError::ImageDecode("bad".into()).into();
        assert!(matches!(err, SourceError::Parse(_)));
    }
}
