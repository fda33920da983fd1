//! Streaming parser for the annotation XML export
//!
//! Expected shape:
//!
//! ```xml
//! <annotations>
//!   <image id="0" name="images/receipt1.jpg" width="800" height="1200">
//!     <box label="SHOP" xtl="10" ytl="20" xbr="300" ybr="80">
//!       <attribute name="text">Acme Market</attribute>
//!     </box>
//!   </image>
//! </annotations>
//! ```
//!
//! Values are kept as raw strings here; normalization happens when the index
//! or an export is built, so one bad box never poisons its image.

use crate::error::{AnnotationError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

const IMAGE_DEPTH: usize = 2;
const BOX_DEPTH: usize = 3;

/// One `<image>` entry as written in the export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotatedImage {
    /// `name` attribute, possibly with a directory prefix
    pub name: String,
    pub width: Option<String>,
    pub height: Option<String>,
    pub boxes: Vec<RawBox>,
}

/// One `<box>` entry as written in the export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBox {
    pub label: Option<String>,
    pub xtl: Option<String>,
    pub ytl: Option<String>,
    pub xbr: Option<String>,
    pub ybr: Option<String>,
    /// Content of the first nested `<attribute name="text">`
    pub text: Option<String>,
}

/// Parse the annotation document into raw image entries
///
/// Only `<image>` elements directly under the root and `<box>` elements
/// directly under an image are read; everything else (`<meta>`, polygons,
/// other attributes) is ignored.
///
/// # Errors
///
/// Returns `AnnotationError::Xml` if the document is not well-formed and
/// `AnnotationError::Truncated` if it ends with elements still open. No
/// partial result is returned in either case.
pub fn parse_annotations(xml: &str) -> Result<Vec<AnnotatedImage>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut state = ParseState::default();
    let mut buf = Vec::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                depth += 1;
                state.open(&e, depth);
            }
            Event::Empty(e) => {
                state.open(&e, depth + 1);
                state.close(depth + 1);
            }
            Event::End(_) => {
                state.close(depth);
                depth = depth.saturating_sub(1);
            }
            Event::Text(e) => {
                if state.in_text() {
                    let text = e.unescape()?;
                    state.append_text(&text);
                }
            }
            Event::CData(e) => {
                if state.in_text() {
                    state.append_text(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::Eof if depth > 0 => {
                return Err(AnnotationError::Truncated {
                    open_elements: depth,
                })
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(state.images)
}

#[derive(Default)]
struct ParseState {
    images: Vec<AnnotatedImage>,
    image: Option<AnnotatedImage>,
    bbox: Option<RawBox>,
    /// Depth of the open `<attribute name="text">`, if any
    text_depth: Option<usize>,
}

impl ParseState {
    fn open(&mut self, e: &BytesStart<'_>, depth: usize) {
        match (e.name().as_ref(), depth) {
            (b"image", IMAGE_DEPTH) => {
                self.image = Some(AnnotatedImage {
                    name: attribute(e, b"name").unwrap_or_default(),
                    width: attribute(e, b"width"),
                    height: attribute(e, b"height"),
                    boxes: Vec::new(),
                });
            }
            (b"box", BOX_DEPTH) if self.image.is_some() => {
                self.bbox = Some(RawBox {
                    label: attribute(e, b"label"),
                    xtl: attribute(e, b"xtl"),
                    ytl: attribute(e, b"ytl"),
                    xbr: attribute(e, b"xbr"),
                    ybr: attribute(e, b"ybr"),
                    text: None,
                });
            }
            (b"attribute", d) if d > BOX_DEPTH && self.text_depth.is_none() => {
                let Some(bbox) = self.bbox.as_mut() else {
                    return;
                };
                if bbox.text.is_none() && attribute(e, b"name").as_deref() == Some("text") {
                    bbox.text = Some(String::new());
                    self.text_depth = Some(d);
                }
            }
            _ => {}
        }
    }

    fn close(&mut self, depth: usize) {
        if self.text_depth == Some(depth) {
            self.text_depth = None;
        }
        if depth == BOX_DEPTH {
            if let (Some(bbox), Some(image)) = (self.bbox.take(), self.image.as_mut()) {
                image.boxes.push(bbox);
            }
        }
        if depth == IMAGE_DEPTH {
            if let Some(image) = self.image.take() {
                self.images.push(image);
            }
        }
    }

    fn in_text(&self) -> bool {
        self.text_depth.is_some()
    }

    fn append_text(&mut self, text: &str) {
        if let Some(existing) = self.bbox.as_mut().and_then(|b| b.text.as_mut()) {
            existing.push_str(text);
        }
    }
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| match attr.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        })
}
