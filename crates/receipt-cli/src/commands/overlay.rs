//! Draw detections on the source image

use ab_glyph::FontVec;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use receipt_common::Detection;
use std::path::Path;
use tracing::{debug, warn};

/// Outline thickness in pixels
const OUTLINE_WIDTH: u32 = 5;
/// Fill opacity out of 255
const FILL_ALPHA: u32 = 60;

const CAPTION_SCALE: f32 = 24.0;
/// Caption baseline offset above the box
const CAPTION_OFFSET: i32 = 38;
const TEXT_SCALE: f32 = 16.0;
const TEXT_INSET: i32 = 8;
/// Characters of recognized text shown inside a box
const TEXT_MAX_CHARS: usize = 35;

const OTHER_COLOR: Rgb<u8> = Rgb([128, 0, 128]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Box color for a detection label
#[must_use]
pub fn label_color(label: &str) -> Rgb<u8> {
    match label {
        "STORE" => Rgb([0, 0, 255]),
        "DATE" | "DATE_TIME" => Rgb([0, 255, 0]),
        "ITEM" => Rgb([255, 165, 0]),
        "TOTAL" => Rgb([255, 0, 0]),
        _ => OTHER_COLOR,
    }
}

/// Load the caption font from `path`, or from the first system font found
///
/// Returns `None` when nothing usable exists; boxes are then drawn without text.
pub fn load_font(path: Option<&Path>) -> Option<FontVec> {
    let candidates: Vec<&Path> = match path {
        Some(path) => vec![path],
        None => SYSTEM_FONTS.iter().map(Path::new).collect(),
    };

    for candidate in candidates {
        let Ok(bytes) = std::fs::read(candidate) else {
            continue;
        };
        match FontVec::try_from_vec(bytes) {
            Ok(font) => {
                debug!("Overlay font: {}", candidate.display());
                return Some(font);
            }
            Err(e) => warn!("Ignoring font {}: {}", candidate.display(), e),
        }
    }

    warn!("No overlay font found, labels will not be drawn");
    None
}

/// `LABEL 87%` shown above a box
#[must_use]
pub fn caption(detection: &Detection) -> String {
    format!(
        "{} {:.0}%",
        detection.label,
        f64::from(detection.confidence) * 100.0
    )
}

/// First 35 characters of `text`, with `...` when anything was cut
#[must_use]
pub fn truncate_text(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(TEXT_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Tint and outline every detection box, clipped to the image
///
/// With a font, each box also gets its caption above it and its recognized
/// text inside it.
pub fn draw_detections(image: &mut RgbImage, detections: &[Detection], font: Option<&FontVec>) {
    let (width, height) = image.dimensions();

    for detection in detections {
        let color = label_color(detection.label.as_str());

        let [left, top, right, bottom] = detection.bbox.to_array();
        let x0 = (left.max(0.0) as u32).min(width);
        let y0 = (top.max(0.0) as u32).min(height);
        let x1 = (right.max(0.0).ceil() as u32).min(width);
        let y1 = (bottom.max(0.0).ceil() as u32).min(height);
        if x1 <= x0 || y1 <= y0 {
            continue;
        }

        tint(image, (x0, y0, x1, y1), color);

        for inset in 0..OUTLINE_WIDTH {
            let w = (x1 - x0).saturating_sub(2 * inset);
            let h = (y1 - y0).saturating_sub(2 * inset);
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at((x0 + inset) as i32, (y0 + inset) as i32).of_size(w, h);
            draw_hollow_rect_mut(image, rect, color);
        }

        let Some(font) = font else {
            continue;
        };

        let (x, y) = (x0 as i32, y0 as i32);
        let caption_y = (y - CAPTION_OFFSET).max(0);
        draw_text_mut(image, color, x, caption_y, CAPTION_SCALE, font, &caption(detection));

        if !detection.text.is_empty() {
            draw_text_mut(
                image,
                TEXT_COLOR,
                x + TEXT_INSET,
                y + TEXT_INSET,
                TEXT_SCALE,
                font,
                &truncate_text(&detection.text),
            );
        }
    }
}

fn tint(image: &mut RgbImage, (x0, y0, x1, y1): (u32, u32, u32, u32), color: Rgb<u8>) {
    for y in y0..y1 {
        for x in x0..x1 {
            let pixel = image.get_pixel_mut(x, y);
            for (channel, target) in pixel.0.iter_mut().zip(color.0) {
                let blended =
                    (u32::from(*channel) * (255 - FILL_ALPHA) + u32::from(target) * FILL_ALPHA) / 255;
                *channel = blended as u8;
            }
        }
    }
}
