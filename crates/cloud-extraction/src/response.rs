//! Reading `analyzeResult` documents

use crate::ExtractionError;
use receipt_common::Extraction;
use serde_json::{Map, Value};

/// Field holding the line-item table
const ITEMS_FIELD: &str = "Items";

/// Pull string fields and line items out of an `analyzeResult` object
///
/// Only the first document is read. A field counts when its `valueString` is
/// a non-empty string; dates, currencies and numbers without a string value
/// are skipped. Each `Items` row keeps its string sub-fields in the order
/// the service listed them.
///
/// # Errors
///
/// Returns `ExtractionError::Malformed` if `analyzeResult` is not an object.
pub fn parse_analyze_result(result: &Value) -> Result<Extraction, ExtractionError> {
    let result = result
        .as_object()
        .ok_or_else(|| ExtractionError::Malformed("analyzeResult is not an object".to_string()))?;

    let Some(document) = result
        .get("documents")
        .and_then(Value::as_array)
        .and_then(|docs| docs.first())
    else {
        return Ok(Extraction::default());
    };

    let Some(fields) = document.get("fields").and_then(Value::as_object) else {
        return Ok(Extraction::default());
    };

    let mut extraction = Extraction {
        fields: string_fields(fields),
        items: Vec::new(),
    };

    if let Some(rows) = fields
        .get(ITEMS_FIELD)
        .and_then(|items| items.get("valueArray"))
        .and_then(Value::as_array)
    {
        extraction.items = rows
            .iter()
            .map(|row| {
                row.get("valueObject")
                    .and_then(Value::as_object)
                    .map(string_fields)
                    .unwrap_or_default()
            })
            .collect();
    }

    Ok(extraction)
}

fn string_fields<M>(fields: &Map<String, Value>) -> M
where
    M: FromIterator<(String, String)>,
{
    fields
        .iter()
        .filter_map(|(name, field)| {
            field
                .get("valueString")
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
                .map(|v| (name.clone(), v.to_string()))
        })
        .collect()
}
