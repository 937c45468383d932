//! Layout parser: an ordered cascade of extraction strategies.
//!
//! Strategies are tried in registration order; the first one producing at
//! least one non-blank line wins. A strategy that errors or panics counts as
//! "zero lines" and the cascade moves on. Output from a failed strategy is
//! discarded whole, never merged with another strategy's lines.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, info, warn};

use super::docx::DocxStrategy;
use super::ocr::{default_tessdata_dir, ocr_capability, OcrLayoutStrategy};
use super::pdf::PdfTextLayerStrategy;
use super::pdfium::PdfiumLayoutStrategy;
use super::plaintext::PlainTextStrategy;
use super::sanitize::sanitize_line;
use super::types::{CapabilityStatus, DocumentKind, LayoutStrategy, Line, ParseMode, ParseOutcome};
use super::LayoutError;
use crate::config::PipelineSettings;

pub struct LayoutParser {
    strategies: Vec<Box<dyn LayoutStrategy>>,
    ocr: CapabilityStatus,
    ocr_accelerated: bool,
}

impl LayoutParser {
    /// Build a parser from an explicit strategy list (highest priority first).
    pub fn new(strategies: Vec<Box<dyn LayoutStrategy>>, ocr: CapabilityStatus) -> Self {
        Self {
            strategies,
            ocr,
            ocr_accelerated: false,
        }
    }

    /// Probe the runtime and register every strategy that can run here.
    ///
    /// Order: structured layout (PDFium), PDF text layer, word-processor,
    /// OCR, strict plaintext, lenient plaintext.
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        let mut strategies: Vec<Box<dyn LayoutStrategy>> = Vec::new();

        if let Some(structured) = PdfiumLayoutStrategy::probe() {
            strategies.push(Box::new(structured));
        }
        strategies.push(Box::new(PdfTextLayerStrategy));
        strategies.push(Box::new(DocxStrategy));

        let tessdata = settings
            .tessdata_dir
            .clone()
            .unwrap_or_else(default_tessdata_dir);
        let mut ocr = ocr_capability(&tessdata);
        let mut ocr_accelerated = false;
        if ocr.is_available() {
            match OcrLayoutStrategy::discover(&tessdata, settings.ocr_render_scale) {
                Ok(strategy) => {
                    ocr_accelerated = strategy.accelerated();
                    strategies.push(Box::new(strategy));
                }
                Err(e) => {
                    warn!(error = %e, "OCR backend failed to initialize");
                    ocr = CapabilityStatus::unavailable(e.to_string());
                }
            }
        }

        strategies.push(Box::new(PlainTextStrategy::strict()));
        strategies.push(Box::new(PlainTextStrategy::lenient()));

        match &ocr {
            CapabilityStatus::Available => info!(
                strategies = strategies.len(),
                tessdata = %tessdata.display(),
                "Layout parser ready, OCR available"
            ),
            CapabilityStatus::Unavailable { reason } => info!(
                strategies = strategies.len(),
                reason = %reason,
                "Layout parser ready, OCR unavailable"
            ),
        }

        Self {
            strategies,
            ocr,
            ocr_accelerated,
        }
    }

    pub fn ocr_capability(&self) -> &CapabilityStatus {
        &self.ocr
    }

    pub fn ocr_accelerated(&self) -> bool {
        self.ocr.is_available() && self.ocr_accelerated
    }

    /// Extract ordered lines from a document.
    ///
    /// Never fails: exhaustion is reported through `ParseOutcome::mode`.
    /// With `force_ocr` on a PDF only OCR strategies run.
    pub fn parse(&self, filename: &str, bytes: &[u8], force_ocr: bool) -> ParseOutcome {
        let kind = DocumentKind::from_filename(filename);
        let forced = force_ocr && kind == DocumentKind::Pdf;
        let mut attempted = Vec::new();

        let candidates = self
            .strategies
            .iter()
            .filter(|s| s.applies_to(kind))
            .filter(|s| !forced || s.mode() == ParseMode::Ocr);

        for strategy in candidates {
            let mode = strategy.mode();
            attempted.push(mode);
            let lines = run_strategy(strategy.as_ref(), bytes);
            if !lines.is_empty() {
                info!(mode = %mode, lines = lines.len(), ?kind, "Layout parsed");
                return ParseOutcome {
                    lines,
                    mode,
                    attempted,
                };
            }
            debug!(mode = %mode, "Strategy produced no lines, falling through");
        }

        let mode = if forced {
            ParseMode::OcrUnavailable
        } else {
            ParseMode::Exhausted
        };
        warn!(mode = %mode, attempted = attempted.len(), ?kind, "No strategy produced lines");
        ParseOutcome {
            lines: Vec::new(),
            mode,
            attempted,
        }
    }
}

/// Run one strategy, converting errors and panics into "no lines".
fn run_strategy(strategy: &dyn LayoutStrategy, bytes: &[u8]) -> Vec<Line> {
    let mode = strategy.mode();
    let result = catch_unwind(AssertUnwindSafe(|| strategy.extract(bytes)))
        .unwrap_or_else(|payload| Err(LayoutError::Panicked(panic_message(payload.as_ref()))));

    match result {
        Ok(lines) => clean_lines(lines),
        Err(e) => {
            warn!(mode = %mode, error = %e, "Layout strategy failed");
            Vec::new()
        }
    }
}

fn clean_lines(lines: Vec<Line>) -> Vec<Line> {
    lines
        .into_iter()
        .filter_map(|mut line| {
            line.text = sanitize_line(&line.text);
            (!line.text.is_empty()).then_some(line)
        })
        .collect()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
