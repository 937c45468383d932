//! PDFium-backed strategies: structured text layout and page rendering.
//!
//! `PdfiumLayoutStrategy` reads the embedded text layer with per-segment
//! bounds and regroups segments into visual lines. `PdfiumRenderer` rasterizes
//! pages for the OCR fallback.
//!
//! Both are stateless (`Send + Sync`). Each operation creates a fresh `Pdfium`
//! instance because the upstream type is `!Send`. The OS caches
//! `dlopen`/`LoadLibrary` calls, so repeat loads are near-free.

use std::io::Cursor;

use image::ImageOutputFormat;
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::types::{
    BoundingBox, CapabilityStatus, DocumentKind, LayoutStrategy, Line, ParseMode, PdfPageRenderer,
};
use super::LayoutError;

/// Maximum dimension (width or height) for rendered page images.
/// Prevents OOM on extremely large pages or absurd scale factors.
const MAX_DIMENSION_PX: u32 = 4096;

/// Load the PDFium dynamic library.
///
/// Discovery order:
/// 1. `PDFIUM_DYNAMIC_LIB_PATH` env var (explicit path)
/// 2. Alongside the running executable, then `<exe_dir>/pdfium/{bin,lib}/`
/// 3. System library search paths
pub fn load_pdfium() -> Result<Pdfium, LayoutError> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        debug!(path = %path, "Loading PDFium from env var");
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
            LayoutError::PdfiumUnavailable(format!("Failed to load PDFium from {path}: {e}"))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            let candidates = [
                exe_dir.to_path_buf(),
                exe_dir.join("pdfium").join("bin"),
                exe_dir.join("pdfium").join("lib"),
                exe_dir.join("..").join("lib"),
            ];

            for dir in &candidates {
                let lib_path = Pdfium::pdfium_platform_library_name_at_path(
                    dir.to_string_lossy().as_ref(),
                );
                if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                    debug!(dir = %dir.display(), "Loaded PDFium from candidate directory");
                    return Ok(Pdfium::new(bindings));
                }
            }
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        LayoutError::PdfiumUnavailable(format!(
            "PDFium library not found. Set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}"
        ))
    })?;
    Ok(Pdfium::new(bindings))
}

/// Whether PDFium can be loaded in this runtime. Never fails.
pub fn pdfium_capability() -> CapabilityStatus {
    match load_pdfium() {
        Ok(_) => CapabilityStatus::Available,
        Err(e) => CapabilityStatus::unavailable(e.to_string()),
    }
}

/// Map PDF load errors, detecting encrypted PDFs.
pub fn map_load_error(e: PdfiumError) -> LayoutError {
    let msg = format!("{e}");
    let lower = msg.to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        LayoutError::PdfEncrypted
    } else {
        LayoutError::PdfParsing(format!("Failed to load PDF: {e}"))
    }
}

/// Compute pixel dimensions for rendering at `scale` x natural size.
///
/// Returns (width_px, height_px), both clamped to [1, MAX_DIMENSION_PX].
/// Preserves aspect ratio when capping.
fn compute_render_dimensions(width_points: f32, height_points: f32, scale: f32) -> (u32, u32) {
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

// ═══════════════════════════════════════════════════════════
// Structured layout
// ═══════════════════════════════════════════════════════════

/// A positioned run of text as reported by the PDF text layer.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSegment {
    pub text: String,
    pub bbox: BoundingBox,
}

/// Merge consecutive segments that sit on the same baseline into lines.
///
/// Two segments share a line when their vertical centers differ by less than
/// half of the taller one's height. Segment order is kept (it is the text
/// layer's reading order).
pub fn group_segments_into_lines(segments: &[TextSegment]) -> Vec<TextSegment> {
    let mut lines: Vec<TextSegment> = Vec::new();

    for seg in segments {
        if seg.text.trim().is_empty() {
            continue;
        }
        if let Some(current) = lines.last_mut() {
            let tolerance = current.bbox.height().max(seg.bbox.height()) / 2.0;
            if (current.bbox.center_y() - seg.bbox.center_y()).abs() < tolerance.max(0.5) {
                let needs_space = !current.text.ends_with(char::is_whitespace)
                    && !seg.text.starts_with(char::is_whitespace);
                if needs_space {
                    current.text.push(' ');
                }
                current.text.push_str(&seg.text);
                current.bbox = current.bbox.union(&seg.bbox);
                continue;
            }
        }
        lines.push(seg.clone());
    }

    for line in &mut lines {
        line.text = line.text.trim().to_string();
    }
    lines
}

/// Rich layout extraction through PDFium's text segments.
///
/// Only registered when the PDFium library is loadable.
pub struct PdfiumLayoutStrategy;

impl PdfiumLayoutStrategy {
    /// Create the strategy if PDFium is available in this runtime.
    pub fn probe() -> Option<Self> {
        match load_pdfium() {
            Ok(_) => Some(Self),
            Err(e) => {
                debug!(error = %e, "Structured layout strategy disabled");
                None
            }
        }
    }
}

impl LayoutStrategy for PdfiumLayoutStrategy {
    fn mode(&self) -> ParseMode {
        ParseMode::StructuredLayout
    }

    fn applies_to(&self, kind: DocumentKind) -> bool {
        kind == DocumentKind::Pdf
    }

    fn extract(&self, bytes: &[u8]) -> Result<Vec<Line>, LayoutError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(map_load_error)?;

        let mut lines = Vec::new();
        for (page_idx, page) in document.pages().iter().enumerate() {
            let page_no = page_idx + 1;
            let text = page.text().map_err(|e| {
                LayoutError::PdfParsing(format!("Text layer unreadable on page {page_no}: {e}"))
            })?;

            let segments: Vec<TextSegment> = text
                .segments()
                .iter()
                .map(|segment| {
                    let b = segment.bounds();
                    TextSegment {
                        text: segment.text(),
                        bbox: BoundingBox::new(
                            b.left.value,
                            b.bottom.value,
                            b.right.value,
                            b.top.value,
                        ),
                    }
                })
                .collect();

            let grouped = group_segments_into_lines(&segments);
            debug!(
                page = page_no,
                segments = segments.len(),
                lines = grouped.len(),
                "Grouped text segments"
            );
            lines.extend(
                grouped
                    .into_iter()
                    .enumerate()
                    .map(|(i, seg)| Line::new(seg.text, page_no, seg.bbox, i + 1)),
            );
        }

        Ok(lines)
    }
}

// ═══════════════════════════════════════════════════════════
// Page rendering
// ═══════════════════════════════════════════════════════════

/// Renders PDF pages to PNG images using Google PDFium.
pub struct PdfiumRenderer;

impl PdfiumRenderer {
    /// Create a new renderer, verifying the PDFium library is loadable.
    pub fn new() -> Result<Self, LayoutError> {
        let _ = load_pdfium()?;
        Ok(Self)
    }
}

impl PdfPageRenderer for PdfiumRenderer {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, LayoutError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;
        Ok(document.pages().len() as usize)
    }

    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        scale: f32,
    ) -> Result<Vec<u8>, LayoutError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;

        let pages = document.pages();

        let index = u16::try_from(page_index).map_err(|_| LayoutError::PdfRendering {
            page: page_index,
            reason: format!("Page index {page_index} exceeds u16 maximum"),
        })?;

        let page = pages.get(index).map_err(|_| LayoutError::PdfRendering {
            page: page_index,
            reason: format!(
                "Page {page_index} out of range (document has {} pages)",
                pages.len()
            ),
        })?;

        let width_points = page.width().value;
        let height_points = page.height().value;
        let (target_w, target_h) = compute_render_dimensions(width_points, height_points, scale);

        let uncapped_w = (width_points * scale) as u32;
        let uncapped_h = (height_points * scale) as u32;
        if target_w != uncapped_w || target_h != uncapped_h {
            warn!(
                page = page_index,
                raw_width = uncapped_w,
                raw_height = uncapped_h,
                capped_width = target_w,
                capped_height = target_h,
                "Page dimensions capped to {MAX_DIMENSION_PX}px",
            );
        }

        let config = PdfRenderConfig::new()
            .set_target_width(target_w as i32)
            .set_maximum_height(target_h as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| LayoutError::PdfRendering {
                page: page_index,
                reason: format!("Rendering failed: {e}"),
            })?;

        let dynamic_image = bitmap.as_image();
        let mut cursor = Cursor::new(Vec::new());
        dynamic_image
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .map_err(|e| LayoutError::ImageProcessing(format!("PNG encoding failed: {e}")))?;

        let png_bytes = cursor.into_inner();

        debug!(
            page = page_index,
            width = target_w,
            height = target_h,
            png_size = png_bytes.len(),
            "Rendered PDF page to PNG"
        );

        Ok(png_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str, x0: f32, y0: f32, x1: f32, y1: f32) -> TextSegment {
        TextSegment {
            text: text.to_string(),
            bbox: BoundingBox::new(x0, y0, x1, y1),
        }
    }

    // ── Pure dimension logic tests (no PDFium needed) ──

    #[test]
    fn a4_at_3x() {
        let (w, h) = compute_render_dimensions(595.0, 842.0, 3.0);
        assert_eq!((w, h), (1785, 2526));
    }

    #[test]
    fn letter_at_3x() {
        let (w, h) = compute_render_dimensions(612.0, 792.0, 3.0);
        assert_eq!((w, h), (1836, 2376));
    }

    #[test]
    fn dimension_guard_caps_oversized() {
        let (w, h) = compute_render_dimensions(5000.0, 7000.0, 3.0);
        assert!(w <= MAX_DIMENSION_PX, "Width {w} exceeds {MAX_DIMENSION_PX}");
        assert!(h <= MAX_DIMENSION_PX, "Height {h} exceeds {MAX_DIMENSION_PX}");
        assert!(w >= 1 && h >= 1);
    }

    #[test]
    fn dimension_guard_preserves_aspect_ratio() {
        let (w, h) = compute_render_dimensions(5000.0, 10000.0, 3.0);
        let ratio = h as f32 / w as f32;
        assert!((ratio - 2.0).abs() < 0.15, "Aspect ratio should be ~2:1, got {ratio}");
    }

    #[test]
    fn zero_points_clamped_to_1() {
        let (w, h) = compute_render_dimensions(0.0, 0.0, 3.0);
        assert!(w >= 1 && h >= 1);
    }

    // ── Segment grouping ──

    #[test]
    fn same_baseline_segments_merge() {
        let segments = vec![
            seg("Commenced", 50.0, 700.0, 120.0, 712.0),
            seg("loading", 125.0, 700.5, 170.0, 712.5),
            seg("0730", 300.0, 700.0, 330.0, 712.0),
        ];
        let lines = group_segments_into_lines(&segments);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Commenced loading 0730");
        assert_eq!(lines[0].bbox, BoundingBox::new(50.0, 700.0, 330.0, 712.5));
    }

    #[test]
    fn new_baseline_starts_new_line() {
        let segments = vec![
            seg("Vessel: ORION TRADER", 50.0, 740.0, 200.0, 752.0),
            seg("Port: KOH SICHANG", 50.0, 720.0, 180.0, 732.0),
        ];
        let lines = group_segments_into_lines(&segments);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "Vessel: ORION TRADER");
        assert_eq!(lines[1].text, "Port: KOH SICHANG");
    }

    #[test]
    fn whitespace_segments_are_skipped() {
        let segments = vec![
            seg("   ", 0.0, 0.0, 5.0, 10.0),
            seg("NOR tendered 0600 ", 50.0, 700.0, 150.0, 712.0),
        ];
        let lines = group_segments_into_lines(&segments);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "NOR tendered 0600");
    }

    #[test]
    fn no_double_space_when_segment_has_trailing_space() {
        let segments = vec![
            seg("Hoses ", 50.0, 700.0, 90.0, 712.0),
            seg("connected", 92.0, 700.0, 150.0, 712.0),
        ];
        let lines = group_segments_into_lines(&segments);
        assert_eq!(lines[0].text, "Hoses connected");
    }

    #[test]
    fn capability_probe_never_panics() {
        let _ = pdfium_capability();
    }
}
