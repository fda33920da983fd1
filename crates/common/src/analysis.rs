//! Per-request analysis output

use crate::Detection;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cloud field name -> string value
pub type ExtractedFields = BTreeMap<String, String>;

/// One line item: sub-field name -> string value, in the order the service sent them
pub type ExtractedItem = IndexMap<String, String>;

/// Line-item rows in source order
pub type ExtractedItems = Vec<ExtractedItem>;

/// Text fields and line items recognized by the cloud service (no geometry)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub fields: ExtractedFields,
    pub items: ExtractedItems,
}

impl Extraction {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.items.is_empty()
    }
}

/// Outcome marker carried in the response body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Success,
}

/// Response for one analyzed image, built fresh per request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub status: AnalysisStatus,
    pub detections: Vec<Detection>,
    pub fields: ExtractedFields,
    pub items: ExtractedItems,
}

impl AnalysisResult {
    #[must_use]
    pub fn success(detections: Vec<Detection>, extraction: Extraction) -> Self {
        Self {
            status: AnalysisStatus::Success,
            detections,
            fields: extraction.fields,
            items: extraction.items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoundingBox, Label};

    #[test]
    fn test_success_shape() {
        let bbox = BoundingBox::from_edges(0.0, 0.0, 10.0, 10.0).unwrap();
        let detection = Detection::new(Label::Total, bbox, "12.00", 0.95).unwrap();

        let mut extraction = Extraction::default();
        extraction
            .fields
            .insert("Total".to_string(), "12.00".to_string());
        extraction.items.push(ExtractedItem::from([
            ("TotalPrice".to_string(), "2.50".to_string()),
            ("Description".to_string(), "Milk".to_string()),
        ]));

        let result = AnalysisResult::success(vec![detection], extraction);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["status"], "success");
        assert_eq!(json["detections"].as_array().unwrap().len(), 1);
        assert_eq!(json["fields"]["Total"], "12.00");
        assert_eq!(json["items"][0]["Description"], "Milk");

        let body = serde_json::to_string(&result).unwrap();
        let price = body.find("\"TotalPrice\"").unwrap();
        let description = body.find("\"Description\"").unwrap();
        assert!(price < description, "item keys must keep insertion order");
    }

    #[test]
    fn test_empty_extraction() {
        assert!(Extraction::default().is_empty());
    }
}
