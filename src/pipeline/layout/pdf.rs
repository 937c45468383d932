use pdf_extract::{Document, MediaBox, OutputDev, OutputError, Transform};

use super::types::{BoundingBox, DocumentKind, LayoutStrategy, Line, ParseMode};
use super::LayoutError;

/// PDF text-layer extractor using the pdf-extract crate.
/// Handles born-digital PDFs when PDFium is not available. Glyphs are
/// collected through an [`OutputDev`] so each line keeps its geometry in PDF
/// user space (origin bottom-left, `y0` on the baseline).
pub struct PdfTextLayerStrategy;

impl LayoutStrategy for PdfTextLayerStrategy {
    fn mode(&self) -> ParseMode {
        ParseMode::PdfTextLayer
    }

    fn applies_to(&self, kind: DocumentKind) -> bool {
        kind == DocumentKind::Pdf
    }

    fn extract(&self, bytes: &[u8]) -> Result<Vec<Line>, LayoutError> {
        let mut doc =
            Document::load_mem(bytes).map_err(|e| LayoutError::PdfParsing(e.to_string()))?;
        if doc.is_encrypted() && doc.decrypt("").is_err() {
            return Err(LayoutError::PdfEncrypted);
        }

        let mut collector = PositionedLines::default();
        pdf_extract::output_doc(&doc, &mut collector)
            .map_err(|e| LayoutError::PdfParsing(e.to_string()))?;
        Ok(collector.finish())
    }
}

// ═══════════════════════════════════════════════════════════
// Glyph collection
// ═══════════════════════════════════════════════════════════

/// Line under construction.
#[derive(Debug, Default)]
struct PendingLine {
    text: String,
    bbox: Option<BoundingBox>,
    last_end: f64,
    last_y: f64,
}

/// Groups glyphs into positioned lines.
///
/// Line and space breaks use the same thresholds as pdf-extract's plain-text
/// output: a vertical jump of more than 1.5 glyph heights, or a move back to
/// the left with more than half a glyph height of drop, starts a new line; a
/// horizontal gap of more than a tenth of a glyph height at a word start
/// inserts a space.
#[derive(Debug, Default)]
struct PositionedLines {
    page: usize,
    line_no: usize,
    word_start: bool,
    current: Option<PendingLine>,
    lines: Vec<Line>,
}

impl PositionedLines {
    fn glyph(&mut self, x: f64, y: f64, size: f64, advance: f64, text: &str) {
        let breaks_line = self.current.as_ref().is_some_and(|cur| {
            let dy = (y - cur.last_y).abs();
            dy > size * 1.5 || (x < cur.last_end && dy > size * 0.5)
        });
        if breaks_line {
            self.flush();
        }

        let word_start = std::mem::take(&mut self.word_start);
        let cur = self.current.get_or_insert_with(PendingLine::default);
        if word_start && !cur.text.is_empty() && x > cur.last_end + size * 0.1 {
            cur.text.push(' ');
        }
        cur.text.push_str(text);

        if !text.trim().is_empty() {
            let glyph = BoundingBox::new(x as f32, y as f32, (x + advance) as f32, (y + size) as f32);
            cur.bbox = Some(cur.bbox.map_or(glyph, |b| b.union(&glyph)));
        }
        cur.last_end = x + advance;
        cur.last_y = y;
    }

    fn flush(&mut self) {
        let Some(pending) = self.current.take() else {
            return;
        };
        let text = pending.text.trim();
        if text.is_empty() {
            return;
        }
        self.line_no += 1;
        self.lines.push(Line::new(
            text,
            self.page,
            pending.bbox.unwrap_or_default(),
            self.line_no,
        ));
    }

    fn finish(mut self) -> Vec<Line> {
        self.flush();
        self.lines
    }
}

impl OutputDev for PositionedLines {
    fn begin_page(
        &mut self,
        page_num: u32,
        _media_box: &MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> Result<(), OutputError> {
        self.flush();
        self.page = page_num as usize;
        self.line_no = 0;
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), OutputError> {
        self.flush();
        Ok(())
    }

    fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        _spacing: f64,
        font_size: f64,
        char: &str,
    ) -> Result<(), OutputError> {
        // Glyph scale of the text rendering matrix; unrotated text only.
        let scale = (trm.m11 * trm.m22).abs().sqrt();
        let size = font_size * scale;
        self.glyph(trm.m31, trm.m32, size, width * size, char);
        Ok(())
    }

    fn begin_word(&mut self) -> Result<(), OutputError> {
        self.word_start = true;
        Ok(())
    }

    fn end_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_line(&mut self) -> Result<(), OutputError> {
        Ok(())
    }
}
