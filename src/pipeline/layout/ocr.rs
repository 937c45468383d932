//! OCR fallback for image-only PDFs.
//!
//! Each page is rendered to PNG, run through an `OcrEngine`, and every detected
//! region becomes one line whose box is the axis-aligned hull of its polygon.

use std::path::{Path, PathBuf};

use super::pdfium::pdfium_capability;
use super::types::{
    BoundingBox, CapabilityStatus, DocumentKind, LayoutStrategy, Line, OcrEngine, OcrRegion,
    ParseMode, PdfPageRenderer,
};
use super::LayoutError;

/// Render-then-recognize strategy, built from a page renderer and an OCR engine.
pub struct OcrLayoutStrategy {
    renderer: Box<dyn PdfPageRenderer>,
    engine: Box<dyn OcrEngine>,
    scale: f32,
}

impl OcrLayoutStrategy {
    pub fn new(renderer: Box<dyn PdfPageRenderer>, engine: Box<dyn OcrEngine>, scale: f32) -> Self {
        Self {
            renderer,
            engine,
            scale,
        }
    }

    /// Wire up PDFium rendering with the bundled Tesseract engine.
    #[cfg(feature = "ocr")]
    pub fn discover(tessdata_dir: &Path, scale: f32) -> Result<Self, LayoutError> {
        let renderer = super::pdfium::PdfiumRenderer::new()?;
        let engine = TesseractOcr::new(tessdata_dir)?;
        Ok(Self::new(Box::new(renderer), Box::new(engine), scale))
    }

    #[cfg(not(feature = "ocr"))]
    pub fn discover(_tessdata_dir: &Path, _scale: f32) -> Result<Self, LayoutError> {
        Err(LayoutError::OcrInit("built without the `ocr` feature".to_string()))
    }

    pub fn accelerated(&self) -> bool {
        self.engine.accelerated()
    }
}

impl LayoutStrategy for OcrLayoutStrategy {
    fn mode(&self) -> ParseMode {
        ParseMode::Ocr
    }

    fn applies_to(&self, kind: DocumentKind) -> bool {
        kind == DocumentKind::Pdf
    }

    fn extract(&self, bytes: &[u8]) -> Result<Vec<Line>, LayoutError> {
        let page_count = self.renderer.page_count(bytes)?;
        let mut lines = Vec::new();

        for page_index in 0..page_count {
            let png = self.renderer.render_page(bytes, page_index, self.scale)?;
            let regions = self.engine.recognize(&png)?;
            let page_no = page_index + 1;

            let before = lines.len();
            lines.extend(regions_to_lines(regions, page_no));
            tracing::debug!(
                page = page_no,
                regions = lines.len() - before,
                "OCR page recognized"
            );
        }

        Ok(lines)
    }
}

/// One line per non-empty region, numbered sequentially within the page.
fn regions_to_lines(regions: Vec<OcrRegion>, page: usize) -> Vec<Line> {
    regions
        .into_iter()
        .filter(|r| !r.text.trim().is_empty())
        .enumerate()
        .map(|(i, region)| {
            let bbox = BoundingBox::from_polygon(&region.polygon).unwrap_or_default();
            Line::new(region.text.trim(), page, bbox, i + 1)
        })
        .collect()
}

/// Whether the OCR fallback can run here: backend compiled in, English
/// traineddata present, and a page renderer loadable. Never fails.
pub fn ocr_capability(tessdata_dir: &Path) -> CapabilityStatus {
    if !cfg!(feature = "ocr") {
        return CapabilityStatus::unavailable("built without the `ocr` feature");
    }
    if !tessdata_dir.join("eng.traineddata").exists() {
        return CapabilityStatus::unavailable(format!(
            "eng.traineddata not found in {}",
            tessdata_dir.display()
        ));
    }
    match pdfium_capability() {
        CapabilityStatus::Available => CapabilityStatus::Available,
        CapabilityStatus::Unavailable { reason } => {
            CapabilityStatus::unavailable(format!("page renderer unavailable: {reason}"))
        }
    }
}

/// Locate a `tessdata` directory holding English traineddata.
///
/// Order: `TESSDATA_PREFIX`, common system install paths, then
/// `~/.laytime-sof/tessdata` (returned even if absent so the capability
/// probe can report it).
pub fn default_tessdata_dir() -> PathBuf {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let prefix = PathBuf::from(prefix);
        candidates.push(prefix.join("tessdata"));
        candidates.push(prefix);
    }
    candidates.extend(
        [
            "/usr/share/tesseract-ocr/5/tessdata",
            "/usr/share/tesseract-ocr/4.00/tessdata",
            "/usr/share/tessdata",
            "/usr/local/share/tessdata",
            "/opt/homebrew/share/tessdata",
        ]
        .iter()
        .map(PathBuf::from),
    );

    candidates
        .into_iter()
        .find(|dir| dir.join("eng.traineddata").exists())
        .unwrap_or_else(|| crate::config::app_data_dir().join("tessdata"))
}

// ═══════════════════════════════════════════════════════════
// Tesseract backend
// ═══════════════════════════════════════════════════════════

/// Bundled Tesseract OCR engine.
/// Only available when compiled with the `ocr` feature flag.
#[cfg(feature = "ocr")]
pub struct TesseractOcr {
    tessdata_dir: PathBuf,
    lang: String,
}

#[cfg(feature = "ocr")]
impl TesseractOcr {
    pub fn new(tessdata_dir: &Path) -> Result<Self, LayoutError> {
        if !tessdata_dir.join("eng.traineddata").exists() {
            return Err(LayoutError::TessdataNotFound(tessdata_dir.to_path_buf()));
        }
        Ok(Self {
            tessdata_dir: tessdata_dir.to_path_buf(),
            lang: "eng".to_string(),
        })
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for TesseractOcr {
    fn recognize(&self, image_bytes: &[u8]) -> Result<Vec<OcrRegion>, LayoutError> {
        let tessdata_str = self
            .tessdata_dir
            .to_str()
            .ok_or_else(|| LayoutError::OcrInit("Invalid tessdata path".into()))?;

        let mut tess = tesseract::Tesseract::new(Some(tessdata_str), Some(self.lang.as_str()))
            .map_err(|e| LayoutError::OcrInit(format!("{e:?}")))?
            .set_image_from_mem(image_bytes)
            .map_err(|e| LayoutError::OcrProcessing(format!("{e:?}")))?;

        let tsv = tess
            .get_tsv_text(0)
            .map_err(|e| LayoutError::OcrProcessing(format!("{e:?}")))?;

        Ok(parse_tsv_lines(&tsv))
    }
}

/// Group Tesseract TSV word rows into text-line regions.
///
/// TSV columns: level page_num block_num par_num line_num word_num left top
/// width height conf text. Level 5 rows are words; words sharing
/// (block, par, line) form one region. Region confidence is the mean of the
/// words' non-negative confidences, scaled to 0.0-1.0.
pub fn parse_tsv_lines(tsv: &str) -> Vec<OcrRegion> {
    struct Acc {
        key: (u32, u32, u32),
        words: Vec<String>,
        bbox: BoundingBox,
        conf_sum: f32,
        conf_n: u32,
    }

    let mut groups: Vec<Acc> = Vec::new();

    for row in tsv.lines() {
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 12 || fields[0].trim() != "5" {
            continue;
        }
        let word = fields[11].trim();
        if word.is_empty() {
            continue;
        }
        let (Ok(block), Ok(par), Ok(line)) = (
            fields[2].parse::<u32>(),
            fields[3].parse::<u32>(),
            fields[4].parse::<u32>(),
        ) else {
            continue;
        };
        let (Ok(left), Ok(top), Ok(width), Ok(height)) = (
            fields[6].parse::<f32>(),
            fields[7].parse::<f32>(),
            fields[8].parse::<f32>(),
            fields[9].parse::<f32>(),
        ) else {
            continue;
        };
        let conf: f32 = fields[10].parse().unwrap_or(-1.0);
        let word_box = BoundingBox::new(left, top, left + width, top + height);
        let key = (block, par, line);

        match groups.iter_mut().find(|g| g.key == key) {
            Some(acc) => {
                acc.words.push(word.to_string());
                acc.bbox = acc.bbox.union(&word_box);
                if conf >= 0.0 {
                    acc.conf_sum += conf;
                    acc.conf_n += 1;
                }
            }
            None => groups.push(Acc {
                key,
                words: vec![word.to_string()],
                bbox: word_box,
                conf_sum: conf.max(0.0),
                conf_n: u32::from(conf >= 0.0),
            }),
        }
    }

    groups
        .into_iter()
        .map(|g| {
            let b = g.bbox;
            OcrRegion {
                polygon: vec![(b.x0, b.y0), (b.x1, b.y0), (b.x1, b.y1), (b.x0, b.y1)],
                text: g.words.join(" "),
                confidence: if g.conf_n == 0 {
                    0.0
                } else {
                    g.conf_sum / g.conf_n as f32 / 100.0
                },
            }
        })
        .collect()
}

// ── Mock ──

/// Mock OCR engine for unit testing without Tesseract.
/// Returns the same regions for every image.
pub struct MockOcrEngine {
    pub regions: Vec<OcrRegion>,
}

impl MockOcrEngine {
    pub fn new(texts: &[&str]) -> Self {
        let regions = texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let y = 20.0 + 30.0 * i as f32;
                OcrRegion {
                    polygon: vec![(10.0, y), (400.0, y), (400.0, y + 24.0), (10.0, y + 24.0)],
                    text: t.to_string(),
                    confidence: 0.9,
                }
            })
            .collect();
        Self { regions }
    }
}

impl OcrEngine for MockOcrEngine {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<Vec<OcrRegion>, LayoutError> {
        Ok(self.regions.clone())
    }
}

/// Mock renderer reporting a fixed page count and returning placeholder bytes.
pub struct MockPageRenderer {
    pub pages: usize,
}

impl PdfPageRenderer for MockPageRenderer {
    fn page_count(&self, _pdf_bytes: &[u8]) -> Result<usize, LayoutError> {
        Ok(self.pages)
    }

    fn render_page(&self, _pdf_bytes: &[u8], page_index: usize, _scale: f32) -> Result<Vec<u8>, LayoutError> {
        if page_index >= self.pages {
            return Err(LayoutError::PdfRendering {
                page: page_index,
                reason: "out of range".to_string(),
            });
        }
        Ok(vec![0x89, b'P', b'N', b'G'])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingEngine;

    impl OcrEngine for FailingEngine {
        fn recognize(&self, _image_bytes: &[u8]) -> Result<Vec<OcrRegion>, LayoutError> {
            Err(LayoutError::OcrProcessing("engine crashed".into()))
        }
    }

    fn strategy(pages: usize, texts: &[&str]) -> OcrLayoutStrategy {
        OcrLayoutStrategy::new(
            Box::new(MockPageRenderer { pages }),
            Box::new(MockOcrEngine::new(texts)),
            3.0,
        )
    }

    #[test]
    fn one_line_per_region_numbered_per_page() {
        let ocr = strategy(2, &["NOR tendered 0600", "Berthed 1015"]);
        let lines = ocr.extract(b"%PDF-fake").unwrap();

        assert_eq!(lines.len(), 4);
        assert_eq!((lines[0].page, lines[0].line_no), (1, 1));
        assert_eq!((lines[1].page, lines[1].line_no), (1, 2));
        assert_eq!((lines[2].page, lines[2].line_no), (2, 1));
        assert_eq!(lines[3].text, "Berthed 1015");
    }

    #[test]
    fn polygon_becomes_axis_aligned_box() {
        let ocr = strategy(1, &["Commenced loading 0730"]);
        let lines = ocr.extract(b"x").unwrap();
        assert_eq!(lines[0].bbox, BoundingBox::new(10.0, 20.0, 400.0, 44.0));
    }

    #[test]
    fn blank_regions_are_skipped() {
        let ocr = strategy(1, &["  ", "Hoses connected"]);
        let lines = ocr.extract(b"x").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].line_no, 1);
    }

    #[test]
    fn zero_pages_yield_no_lines() {
        assert!(strategy(0, &["ignored"]).extract(b"x").unwrap().is_empty());
    }

    #[test]
    fn engine_error_propagates() {
        let ocr = OcrLayoutStrategy::new(
            Box::new(MockPageRenderer { pages: 1 }),
            Box::new(FailingEngine),
            3.0,
        );
        assert!(matches!(ocr.extract(b"x"), Err(LayoutError::OcrProcessing(_))));
        assert!(!ocr.accelerated());
    }

    #[test]
    fn tsv_words_group_into_lines() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
                   1\t1\t0\t0\t0\t0\t0\t0\t1000\t1000\t-1\t\n\
                   5\t1\t1\t1\t1\t1\t100\t50\t80\t20\t90\tCommenced\n\
                   5\t1\t1\t1\t1\t2\t190\t52\t60\t20\t80\tloading\n\
                   5\t1\t1\t1\t2\t1\t100\t90\t50\t20\t70\tBerthed\n\
                   5\t1\t1\t1\t2\t2\t160\t90\t40\t20\t-1\t \n";
        let regions = parse_tsv_lines(tsv);

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].text, "Commenced loading");
        assert!((regions[0].confidence - 0.85).abs() < 1e-6);
        assert_eq!(
            BoundingBox::from_polygon(&regions[0].polygon).unwrap(),
            BoundingBox::new(100.0, 50.0, 250.0, 72.0)
        );
        assert_eq!(regions[1].text, "Berthed");
        assert!((regions[1].confidence - 0.70).abs() < 1e-6);
    }

    #[test]
    fn tsv_garbage_rows_are_ignored() {
        assert!(parse_tsv_lines("not\ta\ttsv\n5\tonly\tfew").is_empty());
    }

    #[test]
    fn capability_reports_missing_tessdata() {
        let dir = tempfile::tempdir().unwrap();
        let status = ocr_capability(dir.path());
        assert!(!status.is_available());
    }
}
