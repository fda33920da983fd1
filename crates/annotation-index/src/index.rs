//! Filename -> ground-truth detections

use crate::error::{AnnotationError, Result};
use crate::parser::{parse_annotations, AnnotatedImage, RawBox};
use receipt_common::{BoundingBox, Detection, Label, GROUND_TRUTH_CONFIDENCE};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Counters gathered while building the index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Images that ended up in the index
    pub images: usize,
    /// Valid boxes across indexed images
    pub boxes: usize,
    /// Boxes dropped for bad label or geometry
    pub dropped_boxes: usize,
    /// Image entries left out because no box survived
    pub empty_images: usize,
}

/// Immutable map from image basename to its ground-truth detections
///
/// An image entry with zero valid boxes is not stored, so it is
/// indistinguishable from an image that was never annotated.
#[derive(Debug, Clone, Default)]
pub struct AnnotationIndex {
    entries: HashMap<String, Vec<Detection>>,
    stats: IndexStats,
}

impl AnnotationIndex {
    /// Index with no entries
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the index from an XML file, degrading to an empty index on failure
    ///
    /// A missing file or a malformed document is logged, never returned, so
    /// the remaining detection sources keep working.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                "Annotation file not found at {} - ground truth disabled",
                path.display()
            );
            return Self::empty();
        }

        match Self::try_load(path) {
            Ok(index) => index,
            Err(e) => {
                error!("Failed to load annotations from {}: {}", path.display(), e);
                Self::empty()
            }
        }
    }

    /// Load the index from an XML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not well-formed XML or
    /// is cut off before the root element closes.
    pub fn try_load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading annotations from {}", path.display());
        let xml = std::fs::read_to_string(path)?;
        Self::from_xml(&xml)
    }

    /// Build the index from an XML document
    ///
    /// # Errors
    ///
    /// Returns `AnnotationError::Xml` if the document is not well-formed and
    /// `AnnotationError::Truncated` if it ends early.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let images = parse_annotations(xml)?;
        Ok(Self::from_images(&images))
    }

    /// Build the index from already parsed image entries
    #[must_use]
    pub fn from_images(images: &[AnnotatedImage]) -> Self {
        let mut entries = HashMap::with_capacity(images.len());
        let mut stats = IndexStats::default();

        for image in images {
            let name = basename(&image.name);
            if name.is_empty() {
                debug!("Skipping image entry without a name");
                continue;
            }

            let mut detections = Vec::with_capacity(image.boxes.len());
            for raw in &image.boxes {
                match normalize_box(raw) {
                    Ok(detection) => detections.push(detection),
                    Err(e) => {
                        debug!("Dropping box in {}: {}", name, e);
                        stats.dropped_boxes += 1;
                    }
                }
            }

            if detections.is_empty() {
                debug!("Image {} has no valid boxes, leaving it out", name);
                stats.empty_images += 1;
                continue;
            }

            entries.insert(name.to_string(), detections);
        }

        stats.images = entries.len();
        stats.boxes = entries.values().map(Vec::len).sum();

        info!(
            "Loaded {} images ({} boxes, {} dropped boxes, {} images without boxes)",
            stats.images, stats.boxes, stats.dropped_boxes, stats.empty_images
        );

        Self { entries, stats }
    }

    /// Ground-truth detections for an exact image basename
    #[must_use]
    pub fn lookup(&self, identifier: &str) -> Option<&[Detection]> {
        self.entries.get(identifier).map(Vec::as_slice)
    }

    /// All indexed identifiers, sorted
    #[must_use]
    pub fn identifiers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> IndexStats {
        self.stats
    }
}

/// Final path component, split on `/` only
pub(crate) fn basename(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Parse one edge coordinate; an absent attribute counts as zero
pub(crate) fn parse_edge(raw: Option<&str>) -> Option<f64> {
    match raw {
        None => Some(0.0),
        Some(value) => value.trim().parse::<f64>().ok(),
    }
}

fn normalize_box(raw: &RawBox) -> Result<Detection> {
    let label = Label::normalize(raw.label.as_deref().unwrap_or_default());

    let edges = [&raw.xtl, &raw.ytl, &raw.xbr, &raw.ybr].map(|edge| parse_edge(edge.as_deref()));
    let [Some(left), Some(top), Some(right), Some(bottom)] = edges else {
        return Err(AnnotationError::InvalidBox(format!(
            "unparsable geometry xtl={:?} ytl={:?} xbr={:?} ybr={:?}",
            raw.xtl, raw.ytl, raw.xbr, raw.ybr
        )));
    };

    let bbox = BoundingBox::from_edges(left as f32, top as f32, right as f32, bottom as f32)
        .map_err(|e| AnnotationError::InvalidBox(e.to_string()))?;

    let text = raw.text.as_deref().map(str::trim).unwrap_or_default();

    Ok(Detection::new(label, bbox, text, GROUND_TRUTH_CONFIDENCE)?)
}
