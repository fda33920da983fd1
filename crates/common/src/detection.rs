//! Labeled, boxed regions of a receipt image

use crate::Label;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected box geometry
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("Box coordinate is not a finite number")]
    NonFinite,

    #[error("Degenerate box: left={left}, top={top}, right={right}, bottom={bottom}")]
    Degenerate {
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
    },
}

/// Rejected detection
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectionError {
    #[error("Detection label is empty")]
    EmptyLabel,

    #[error("Confidence {0} is outside [0, 1]")]
    Confidence(f32),

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Axis-aligned box in original image pixel coordinates
///
/// Always satisfies `left <= right` and `top <= bottom`. Serialized as
/// `[left, top, right, bottom]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "[f32; 4]", try_from = "[f32; 4]")]
pub struct BoundingBox {
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

impl BoundingBox {
    /// Build a box from its four edges, rejecting degenerate geometry
    pub fn from_edges(left: f32, top: f32, right: f32, bottom: f32) -> Result<Self, GeometryError> {
        if ![left, top, right, bottom].iter().all(|v| v.is_finite()) {
            return Err(GeometryError::NonFinite);
        }
        if left > right || top > bottom {
            return Err(GeometryError::Degenerate {
                left,
                top,
                right,
                bottom,
            });
        }
        Ok(Self {
            left,
            top,
            right,
            bottom,
        })
    }

    #[must_use]
    pub fn left(&self) -> f32 {
        self.left
    }

    #[must_use]
    pub fn top(&self) -> f32 {
        self.top
    }

    #[must_use]
    pub fn right(&self) -> f32 {
        self.right
    }

    #[must_use]
    pub fn bottom(&self) -> f32 {
        self.bottom
    }

    #[must_use]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    #[must_use]
    #[inline]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Get center coordinates
    #[must_use]
    pub fn center(&self) -> (f32, f32) {
        (
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    /// Calculate Intersection over Union (`IoU`) with another box
    #[must_use]
    #[inline]
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.left.max(other.left);
        let y1 = self.top.max(other.top);
        let x2 = self.right.min(other.right);
        let y2 = self.bottom.min(other.bottom);

        let intersection_area = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union_area = self.area() + other.area() - intersection_area;

        if union_area > 0.0 {
            intersection_area / union_area
        } else {
            0.0
        }
    }

    #[must_use]
    pub fn to_array(&self) -> [f32; 4] {
        [self.left, self.top, self.right, self.bottom]
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(bbox: BoundingBox) -> Self {
        bbox.to_array()
    }
}

impl TryFrom<[f32; 4]> for BoundingBox {
    type Error = GeometryError;

    fn try_from([left, top, right, bottom]: [f32; 4]) -> Result<Self, Self::Error> {
        Self::from_edges(left, top, right, bottom)
    }
}

/// One labeled region of interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Region category
    pub label: Label,
    /// Region geometry
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    /// Recognized text, empty when the source does no recognition
    pub text: String,
    /// Score in [0, 1]
    pub confidence: f32,
}

impl Detection {
    /// Create a detection, rejecting an empty label or an out-of-range score
    pub fn new(
        label: Label,
        bbox: BoundingBox,
        text: impl Into<String>,
        confidence: f32,
    ) -> Result<Self, DetectionError> {
        if label.is_empty() {
            return Err(DetectionError::EmptyLabel);
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(DetectionError::Confidence(confidence));
        }
        Ok(Self {
            label,
            bbox,
            text: text.into(),
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_boxes_rejected() {
        assert!(BoundingBox::from_edges(10.0, 0.0, 5.0, 20.0).is_err());
        assert!(BoundingBox::from_edges(0.0, 30.0, 5.0, 20.0).is_err());
        assert_eq!(
            BoundingBox::from_edges(f32::NAN, 0.0, 5.0, 5.0),
            Err(GeometryError::NonFinite)
        );

        // Zero-area boxes are still well-formed
        assert!(BoundingBox::from_edges(5.0, 5.0, 5.0, 5.0).is_ok());
    }

    #[test]
    fn test_bbox_iou() {
        let box1 = BoundingBox::from_edges(0.0, 0.0, 50.0, 50.0).unwrap();
        let box2 = BoundingBox::from_edges(25.0, 25.0, 75.0, 75.0).unwrap();

        let iou = box1.iou(&box2);
        assert!(iou > 0.0 && iou < 1.0);

        assert!((box1.iou(&box1) - 1.0).abs() < 0.001);

        let box3 = BoundingBox::from_edges(60.0, 60.0, 90.0, 90.0).unwrap();
        assert_eq!(box1.iou(&box3), 0.0);
    }

    #[test]
    fn test_bbox_dimensions() {
        let bbox = BoundingBox::from_edges(10.0, 20.0, 50.0, 60.0).unwrap();
        assert_eq!(bbox.width(), 40.0);
        assert_eq!(bbox.height(), 40.0);
        assert_eq!(bbox.area(), 1600.0);
        assert_eq!(bbox.center(), (30.0, 40.0));
    }

    #[test]
    fn test_detection_validation() {
        let bbox = BoundingBox::from_edges(0.0, 0.0, 1.0, 1.0).unwrap();

        assert_eq!(
            Detection::new(Label::Other(String::new()), bbox, "", 0.5),
            Err(DetectionError::EmptyLabel)
        );
        assert_eq!(
            Detection::new(Label::Total, bbox, "", 1.5),
            Err(DetectionError::Confidence(1.5))
        );
        assert!(Detection::new(Label::Total, bbox, "$4.20", 0.95).is_ok());
    }

    #[test]
    fn test_detection_wire_shape() {
        let bbox = BoundingBox::from_edges(1.0, 2.0, 3.0, 4.0).unwrap();
        let detection = Detection::new(Label::Store, bbox, "Acme", 0.5).unwrap();

        let json = serde_json::to_value(&detection).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "label": "STORE",
                "box": [1.0, 2.0, 3.0, 4.0],
                "text": "Acme",
                "confidence": 0.5
            })
        );

        let back: Detection = serde_json::from_value(json).unwrap();
        assert_eq!(back, detection);
    }

    #[test]
    fn test_degenerate_box_fails_deserialization() {
        let json = serde_json::json!({
            "label": "ITEM",
            "box": [10.0, 0.0, 5.0, 5.0],
            "text": "",
            "confidence": 0.5
        });
        assert!(serde_json::from_value::<Detection>(json).is_err());
    }
}
