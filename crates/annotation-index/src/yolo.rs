//! Export ground truth as YOLO training labels
//!
//! Writes one `<stem>.txt` per image with lines of
//! `class center_x center_y width height`, all normalized by the image size.

use crate::error::{AnnotationError, Result};
use crate::index::{basename, parse_edge};
use crate::parser::AnnotatedImage;
use receipt_common::Label;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Normalized label -> YOLO class id
pub const YOLO_CLASS_IDS: &[(&str, usize)] = &[("STORE", 0), ("DATE", 1), ("ITEM", 2), ("TOTAL", 3)];

/// Class names in id order, as the trained detector reports them
pub const YOLO_CLASS_NAMES: &[&str] = &["STORE", "DATE_TIME", "ITEM", "TOTAL"];

/// Label file contents for one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YoloLabelFile {
    /// `<stem>.txt`
    pub file_name: String,
    pub lines: Vec<String>,
}

/// Totals for one export run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub files_written: usize,
    pub boxes_written: usize,
    pub images_skipped: usize,
}

/// YOLO class id for a raw label, after alias normalization
#[must_use]
pub fn class_id(raw_label: &str) -> Option<usize> {
    let label = Label::normalize(raw_label);
    YOLO_CLASS_IDS
        .iter()
        .find(|(name, _)| *name == label.as_str())
        .map(|&(_, id)| id)
}

/// Build the label file for one image
///
/// Boxes with labels outside the class map or with unparsable geometry are
/// skipped.
///
/// # Errors
///
/// Returns `AnnotationError::MissingDimensions` if the image has no positive
/// width and height.
pub fn yolo_labels(image: &AnnotatedImage) -> Result<YoloLabelFile> {
    let dimension = |raw: &Option<String>| {
        raw.as_deref()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| *v > 0.0)
    };
    let (Some(width), Some(height)) = (dimension(&image.width), dimension(&image.height)) else {
        return Err(AnnotationError::MissingDimensions(image.name.clone()));
    };

    let name = basename(&image.name);
    let stem = Path::new(name)
        .file_stem()
        .map_or_else(|| name.to_string(), |s| s.to_string_lossy().into_owned());

    let mut lines = Vec::with_capacity(image.boxes.len());
    for raw in &image.boxes {
        let Some(class) = class_id(raw.label.as_deref().unwrap_or_default()) else {
            continue;
        };

        let edges = [&raw.xtl, &raw.ytl, &raw.xbr, &raw.ybr].map(|e| parse_edge(e.as_deref()));
        let [Some(xtl), Some(ytl), Some(xbr), Some(ybr)] = edges else {
            warn!("Skipping box with unparsable geometry in {}", name);
            continue;
        };

        let center_x = (xtl + xbr) / 2.0 / width;
        let center_y = (ytl + ybr) / 2.0 / height;
        let w = (xbr - xtl) / width;
        let h = (ybr - ytl) / height;

        lines.push(format!("{class} {center_x:.6} {center_y:.6} {w:.6} {h:.6}"));
    }

    Ok(YoloLabelFile {
        file_name: format!("{stem}.txt"),
        lines,
    })
}

/// Write label files for every image into `output_dir`
///
/// Images without dimensions are skipped with a warning. An image with no
/// exportable boxes still gets an empty label file (a negative example).
///
/// # Errors
///
/// Returns `AnnotationError::Io` if the directory or a file cannot be written.
pub fn export_yolo_labels(images: &[AnnotatedImage], output_dir: &Path) -> Result<ExportSummary> {
    std::fs::create_dir_all(output_dir)?;

    let mut summary = ExportSummary::default();
    for image in images {
        let labels = match yolo_labels(image) {
            Ok(labels) => labels,
            Err(e) => {
                warn!("Skipping {}: {}", image.name, e);
                summary.images_skipped += 1;
                continue;
            }
        };

        let path: PathBuf = output_dir.join(&labels.file_name);
        let mut contents = labels.lines.join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }
        std::fs::write(&path, contents)?;

        summary.files_written += 1;
        summary.boxes_written += labels.lines.len();
    }

    info!(
        "YOLO labels created in {} ({} files, {} boxes)",
        output_dir.display(),
        summary.files_written,
        summary.boxes_written
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_annotations;

    const SAMPLE: &str = r#"<annotations>
  <image name="images/receipt1.JPG" width="100" height="200">
    <box label="shop" xtl="10" ytl="20" xbr="30" ybr="60"/>
    <box label="DATE_TIME" xtl="0" ytl="0" xbr="100" ybr="200"/>
    <box label="SIGNATURE" xtl="0" ytl="0" xbr="1" ybr="1"/>
  </image>
  <image name="no_size.jpg">
    <box label="TOTAL" xtl="0" ytl="0" xbr="1" ybr="1"/>
  </image>
</annotations>"#;

    #[test]
    fn test_class_ids() {
        assert_eq!(class_id("STORE"), Some(0));
        assert_eq!(class_id("shop"), Some(0));
        assert_eq!(class_id("DATE_TIME"), Some(1));
        assert_eq!(class_id("item"), Some(2));
        assert_eq!(class_id("TOTAL"), Some(3));
        assert_eq!(class_id("SIGNATURE"), None);
    }

    #[test]
    fn test_class_names_line_up_with_ids() {
        for (name, id) in YOLO_CLASS_IDS {
            assert_eq!(Label::normalize(YOLO_CLASS_NAMES[*id]).as_str(), *name);
        }
    }

    #[test]
    fn test_yolo_labels_normalized() {
        let images = parse_annotations(SAMPLE).unwrap();
        let labels = yolo_labels(&images[0]).unwrap();

        assert_eq!(labels.file_name, "receipt1.txt");
        assert_eq!(
            labels.lines,
            vec![
                "0 0.200000 0.200000 0.200000 0.200000".to_string(),
                "1 0.500000 0.500000 1.000000 1.000000".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_dimensions() {
        let images = parse_annotations(SAMPLE).unwrap();
        assert!(matches!(
            yolo_labels(&images[1]),
            Err(AnnotationError::MissingDimensions(_))
        ));
    }

    #[test]
    fn test_export_writes_files() {
        let images = parse_annotations(SAMPLE).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let summary = export_yolo_labels(&images, dir.path()).unwrap();
        assert_eq!(summary.files_written, 1);
        assert_eq!(summary.boxes_written, 2);
        assert_eq!(summary.images_skipped, 1);

        let contents = std::fs::read_to_string(dir.path().join("receipt1.txt")).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.ends_with('\n'));
    }
}
