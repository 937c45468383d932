//! Extraction pipeline: the single entry point for a document.
//!
//! layout parse → business fields → classify + timestamps → interval pairing.
//!
//! Every engine sits behind a trait or is built from configuration, so the
//! pipeline is testable with mock strategies and embedders. Only genuinely
//! unexpected faults (stage timeout, worker panic, inference failure) escape
//! `run`; recoverable conditions produce a well-shaped, possibly empty, output.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::config::{ConfigError, PipelineSettings};
use crate::hardware::{detect_accelerator, AcceleratorProfile};
use crate::pipeline::business::{BusinessFieldExtractor, BusinessLabels, BusinessRecord};
use crate::pipeline::events::intervals::round4;
use crate::pipeline::events::{
    load_embedder, pair_intervals, ClassifiedEvent, ClassifierError, EventOntology, Interval,
    SemanticClassifier, SourceLocator, TimeExtractor,
};
use crate::pipeline::layout::{LayoutParser, Line, ParseMode};

/// Lines echoed in metadata when the caller asks for debug output.
const SAMPLE_LINE_COUNT: usize = 20;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Classifier setup failed: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Extraction failed during {stage}: {source}")]
    ExtractionFailed {
        stage: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl PipelineError {
    fn failed(
        stage: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ExtractionFailed {
            stage,
            source: source.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Request / result types
// ---------------------------------------------------------------------------

/// One document to process, with request-scoped overrides.
#[derive(Debug, Clone, Default)]
pub struct ExtractionRequest {
    /// Declared filename; its extension picks the initial strategies.
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Skip non-OCR strategies for PDFs.
    pub force_ocr: bool,
    /// Minimum confidence for this request only.
    pub threshold_override: Option<f32>,
    /// Echo the first parsed lines in `meta.sample_lines`.
    pub debug: bool,
    /// Date that bare clock times are anchored on. `None` means today.
    pub base_date: Option<NaiveDate>,
}

impl ExtractionRequest {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutput {
    pub line_count: usize,
    pub events: Vec<ClassifiedEvent>,
    pub intervals: Vec<Interval>,
    pub business_data: BusinessRecord,
    pub meta: RunMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub run_id: Uuid,
    pub model: String,
    pub threshold: f32,
    pub ontology_size: usize,
    pub num_lines: usize,
    pub num_events: usize,
    pub num_intervals: usize,
    pub parser_mode: ParseMode,
    pub attempted_modes: Vec<ParseMode>,
    pub ocr_available: bool,
    pub ocr_accelerated: bool,
    pub accelerator: AcceleratorProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_lines: Option<Vec<SampleLine>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleLine {
    pub text: String,
    pub page: usize,
    pub line_no: usize,
}

impl From<&Line> for SampleLine {
    fn from(line: &Line) -> Self {
        Self {
            text: line.text.clone(),
            page: line.page,
            line_no: line.line_no,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Shared, read-only after construction. Cheap to call concurrently.
pub struct ExtractionPipeline {
    parser: Arc<LayoutParser>,
    classifier: Arc<SemanticClassifier>,
    business: Arc<BusinessFieldExtractor>,
    settings: PipelineSettings,
    accelerator: AcceleratorProfile,
}

impl ExtractionPipeline {
    /// Build every engine from settings: vocabularies, embedder (ONNX or the
    /// hashing fallback), the layout cascade and the accelerator probe.
    pub fn new(settings: PipelineSettings) -> Result<Self, PipelineError> {
        let ontology = EventOntology::from_yaml(&settings.ontology_yaml()?)?;
        let labels = BusinessLabels::from_yaml(&settings.business_labels_yaml()?)?;

        let classifier = SemanticClassifier::new(&ontology, load_embedder(&settings))?;
        let business = BusinessFieldExtractor::new(&labels)?;
        let parser = LayoutParser::from_settings(&settings);
        let accelerator = detect_accelerator();

        tracing::info!(
            model = classifier.model_name(),
            ontology_size = classifier.ontology_size(),
            ocr_available = parser.ocr_capability().is_available(),
            accelerator = %accelerator.kind,
            "Extraction pipeline ready"
        );

        Ok(Self::from_parts(parser, classifier, business, settings, accelerator))
    }

    /// Assemble a pipeline from pre-built engines.
    pub fn from_parts(
        parser: LayoutParser,
        classifier: SemanticClassifier,
        business: BusinessFieldExtractor,
        settings: PipelineSettings,
        accelerator: AcceleratorProfile,
    ) -> Self {
        Self {
            parser: Arc::new(parser),
            classifier: Arc::new(classifier),
            business: Arc::new(business),
            settings,
            accelerator,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub async fn run(&self, request: ExtractionRequest) -> Result<ExtractionOutput, PipelineError> {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        let threshold = request
            .threshold_override
            .unwrap_or(self.settings.confidence_threshold);
        let ExtractionRequest {
            filename,
            bytes,
            force_ocr,
            debug,
            base_date,
            ..
        } = request;

        tracing::info!(
            run_id = %run_id,
            filename = %filename,
            bytes = bytes.len(),
            force_ocr,
            threshold,
            "Extraction started"
        );

        // 1. Layout
        let parser = Arc::clone(&self.parser);
        let outcome = run_blocking("parse", self.settings.parse_timeout(), move || {
            parser.parse(&filename, &bytes, force_ocr)
        })
        .await?;
        let lines = outcome.lines;

        // 2. Business fields
        let business_data = self.business.extract(&lines);

        // 3. Classification
        let classifier = Arc::clone(&self.classifier);
        let (lines, classifications) =
            run_blocking("classify", self.settings.classify_timeout(), move || {
                let results = lines
                    .iter()
                    .map(|line| classifier.classify(&line.text))
                    .collect::<Result<Vec<_>, _>>();
                (lines, results)
            })
            .await?;
        let classifications = classifications.map_err(|e| PipelineError::failed("classify", e))?;

        let times = TimeExtractor::new(base_date);
        let events: Vec<ClassifiedEvent> = lines
            .iter()
            .zip(classifications)
            .filter_map(|(line, c)| {
                let label = c.label?;
                if c.confidence < threshold {
                    return None;
                }
                Some(ClassifiedEvent {
                    event: label,
                    confidence: round4(f64::from(c.confidence)) as f32,
                    raw_text: line.text.clone(),
                    timestamps: times.extract(&line.text),
                    source: SourceLocator::from(line),
                    matched_synonym: c.matched_synonym,
                })
            })
            .collect();

        // 4. Intervals
        let intervals = pair_intervals(&events);

        let meta = RunMeta {
            run_id,
            model: self.classifier.model_name().to_string(),
            threshold,
            ontology_size: self.classifier.ontology_size(),
            num_lines: lines.len(),
            num_events: events.len(),
            num_intervals: intervals.len(),
            parser_mode: outcome.mode,
            attempted_modes: outcome.attempted,
            ocr_available: self.parser.ocr_capability().is_available(),
            ocr_accelerated: self.parser.ocr_accelerated(),
            accelerator: self.accelerator.clone(),
            sample_lines: debug
                .then(|| lines.iter().take(SAMPLE_LINE_COUNT).map(SampleLine::from).collect()),
        };

        tracing::info!(
            run_id = %run_id,
            mode = %meta.parser_mode.as_str(),
            lines = meta.num_lines,
            events = meta.num_events,
            intervals = meta.num_intervals,
            business_fields = business_data.found_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Extraction complete"
        );

        Ok(ExtractionOutput {
            line_count: lines.len(),
            events,
            intervals,
            business_data,
            meta,
        })
    }
}

/// Run a CPU-bound stage on the blocking pool, bounded by `limit`.
async fn run_blocking<T, F>(stage: &'static str, limit: Duration, job: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(job)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_err)) => {
            tracing::error!(stage, error = %join_err, "Pipeline worker failed");
            Err(PipelineError::failed(stage, join_err))
        }
        Err(elapsed) => {
            tracing::error!(stage, timeout_secs = limit.as_secs(), "Pipeline stage timed out");
            Err(PipelineError::failed(stage, elapsed))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
