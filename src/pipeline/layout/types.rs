use std::fmt;

use serde::{Deserialize, Serialize};

use super::LayoutError;

/// Axis-aligned bounding box in page units (x0, y0) - (x1, y1).
///
/// Strategies without geometry (text layer, word-processor, plaintext) emit
/// the zero box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Smallest box containing every point of a polygon.
    /// Returns `None` for an empty polygon.
    pub fn from_polygon(points: &[(f32, f32)]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bbox = Self::new(first.0, first.1, first.0, first.1);
        for &(x, y) in rest {
            bbox.x0 = bbox.x0.min(x);
            bbox.y0 = bbox.y0.min(y);
            bbox.x1 = bbox.x1.max(x);
            bbox.y1 = bbox.y1.max(y);
        }
        Some(bbox)
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).abs()
    }

    pub fn center_y(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }
}

/// One positioned line of document text.
///
/// `page` and `line_no` are 1-based; lines are produced in reading order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub text: String,
    pub page: usize,
    pub bbox: BoundingBox,
    pub line_no: usize,
}

impl Line {
    pub fn new(text: impl Into<String>, page: usize, bbox: BoundingBox, line_no: usize) -> Self {
        Self {
            text: text.into(),
            page,
            bbox,
            line_no,
        }
    }
}

/// Document family, derived from the declared filename's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    WordProcessor,
    Other,
}

impl DocumentKind {
    pub fn from_filename(filename: &str) -> Self {
        let lower = filename.trim().to_lowercase();
        if lower.ends_with(".pdf") {
            Self::Pdf
        } else if lower.ends_with(".docx") || lower.ends_with(".doc") {
            Self::WordProcessor
        } else {
            Self::Other
        }
    }
}

/// Which extraction strategy produced the lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    StructuredLayout,
    PdfTextLayer,
    Docx,
    Ocr,
    /// Forced OCR was requested but produced nothing (backend missing or empty pages).
    OcrUnavailable,
    #[serde(rename = "plaintext")]
    PlainText,
    /// Every applicable strategy produced zero lines.
    Exhausted,
}

impl ParseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StructuredLayout => "structured_layout",
            Self::PdfTextLayer => "pdf_text_layer",
            Self::Docx => "docx",
            Self::Ocr => "ocr",
            Self::OcrUnavailable => "ocr_unavailable",
            Self::PlainText => "plaintext",
            Self::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for ParseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a parse: the lines plus which mode won and which were tried.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseOutcome {
    pub lines: Vec<Line>,
    pub mode: ParseMode,
    pub attempted: Vec<ParseMode>,
}

/// Runtime availability of an optional capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CapabilityStatus {
    Available,
    Unavailable { reason: String },
}

impl CapabilityStatus {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

/// One detected text region from an OCR engine, in image pixel space.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrRegion {
    pub polygon: Vec<(f32, f32)>,
    pub text: String,
    pub confidence: f32,
}

/// A single extraction strategy in the layout cascade.
///
/// Implementations return every line they found or an error; the cascade
/// treats errors and empty results alike and moves on.
pub trait LayoutStrategy: Send + Sync {
    fn mode(&self) -> ParseMode;

    fn applies_to(&self, kind: DocumentKind) -> bool;

    fn extract(&self, bytes: &[u8]) -> Result<Vec<Line>, LayoutError>;
}

/// Text detection + recognition on a rendered page image (PNG bytes).
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image_bytes: &[u8]) -> Result<Vec<OcrRegion>, LayoutError>;

    /// Whether inference runs on an accelerator.
    fn accelerated(&self) -> bool {
        false
    }
}

/// Renders PDF pages to PNG for OCR.
pub trait PdfPageRenderer: Send + Sync {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, LayoutError>;

    /// Render a zero-based page at `scale` times its natural size.
    fn render_page(&self, pdf_bytes: &[u8], page_index: usize, scale: f32)
        -> Result<Vec<u8>, LayoutError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polygon_to_axis_aligned_box() {
        let quad = [(10.0, 22.0), (90.0, 18.0), (92.0, 40.0), (8.0, 44.0)];
        let bbox = BoundingBox::from_polygon(&quad).unwrap();
        assert_eq!(bbox, BoundingBox::new(8.0, 18.0, 92.0, 44.0));
    }

    #[test]
    fn empty_polygon_has_no_box() {
        assert!(BoundingBox::from_polygon(&[]).is_none());
    }

    #[test]
    fn union_covers_both() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, -2.0, 20.0, 8.0);
        assert_eq!(a.union(&b), BoundingBox::new(0.0, -2.0, 20.0, 10.0));
    }

    #[test]
    fn document_kind_from_extension() {
        assert_eq!(DocumentKind::from_filename("SOF_Koh_Sichang.PDF"), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_filename("sof.docx"), DocumentKind::WordProcessor);
        assert_eq!(DocumentKind::from_filename("sof.doc"), DocumentKind::WordProcessor);
        assert_eq!(DocumentKind::from_filename("notes.txt"), DocumentKind::Other);
        assert_eq!(DocumentKind::from_filename(""), DocumentKind::Other);
    }

    #[test]
    fn parse_mode_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&ParseMode::PlainText).unwrap(), "\"plaintext\"");
        assert_eq!(
            serde_json::to_string(&ParseMode::StructuredLayout).unwrap(),
            "\"structured_layout\""
        );
        assert_eq!(ParseMode::OcrUnavailable.to_string(), "ocr_unavailable");
    }

    #[test]
    fn capability_status_serializes_reason() {
        let json = serde_json::to_string(&CapabilityStatus::unavailable("no tessdata")).unwrap();
        assert!(json.contains("\"status\":\"unavailable\""));
        assert!(json.contains("no tessdata"));
        assert!(CapabilityStatus::Available.is_available());
    }
}
