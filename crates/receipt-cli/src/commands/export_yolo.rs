//! Ground truth to YOLO label files

use anyhow::{Context as _, Result};
use clap::Args;
use receipt_annotation_index::{parse_annotations, yolo::export_yolo_labels};
use std::path::PathBuf;

#[derive(Args)]
pub struct ExportYoloCommand {
    /// Ground-truth XML file
    #[arg(long, default_value = "data/annotations.xml")]
    annotations: PathBuf,

    /// Directory for the `<image>.txt` label files
    #[arg(long, default_value = "data/labels")]
    output_dir: PathBuf,
}

impl ExportYoloCommand {
    pub fn execute(self) -> Result<()> {
        let xml = std::fs::read_to_string(&self.annotations)
            .with_context(|| format!("Failed to read {}", self.annotations.display()))?;
        let images = parse_annotations(&xml)
            .with_context(|| format!("Failed to parse {}", self.annotations.display()))?;

        let summary = export_yolo_labels(&images, &self.output_dir)
            .with_context(|| format!("Failed to write labels to {}", self.output_dir.display()))?;

        println!(
            "Wrote {} label files ({} boxes) to {}; skipped {} images without dimensions",
            summary.files_written,
            summary.boxes_written,
            self.output_dir.display(),
            summary.images_skipped
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let annotations = dir.path().join("annotations.xml");
        std::fs::write(
            &annotations,
            r#"<annotations>
  <image name="images/r1.jpg" width="200" height="100">
    <box label="TOTAL" xtl="0" ytl="0" xbr="100" ybr="50"/>
  </image>
</annotations>"#,
        )
        .unwrap();

        let output_dir = dir.path().join("labels");
        ExportYoloCommand {
            annotations,
            output_dir: output_dir.clone(),
        }
        .execute()
        .unwrap();

        let labels = std::fs::read_to_string(output_dir.join("r1.txt")).unwrap();
        assert_eq!(labels, "3 0.250000 0.250000 0.500000 0.500000\n");
    }

    #[test]
    fn test_missing_annotations_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ExportYoloCommand {
            annotations: dir.path().join("missing.xml"),
            output_dir: dir.path().join("labels"),
        }
        .execute();
        assert!(result.is_err());
    }
}
