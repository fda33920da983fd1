pub mod analyze;
pub mod export_yolo;
pub mod overlay;
