use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::ClassifierError;
use crate::pipeline::layout::{BoundingBox, Line};

/// Text embedding model. Implementations return L2-normalized vectors.
pub trait EmbeddingModel: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ClassifierError>;
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ClassifierError>;
    fn dimension(&self) -> usize;
    /// Identifier reported in output metadata.
    fn name(&self) -> &str;
}

/// Best ontology match for one piece of text.
///
/// `label` and `matched_synonym` are `None` only for blank input.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: Option<String>,
    pub confidence: f32,
    pub matched_synonym: Option<String>,
}

impl Classification {
    pub fn none() -> Self {
        Self {
            label: None,
            confidence: 0.0,
            matched_synonym: None,
        }
    }
}

/// Where a classified event came from in the source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceLocator {
    pub page: usize,
    pub bbox: BoundingBox,
    pub line_no: usize,
}

impl From<&Line> for SourceLocator {
    fn from(line: &Line) -> Self {
        Self {
            page: line.page,
            bbox: line.bbox,
            line_no: line.line_no,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    pub event: String,
    pub confidence: f32,
    pub raw_text: String,
    /// In text order; ranges contribute start then end.
    pub timestamps: Vec<NaiveDateTime>,
    pub source: SourceLocator,
    pub matched_synonym: Option<String>,
}

/// A start-class event closed by a later end-class event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start_event: ClassifiedEvent,
    pub end_event: ClassifiedEvent,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration_hours: f64,
}

/// Role of an event label in interval pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    Start,
    End,
    Neither,
}

impl EventClass {
    /// Case-insensitive lookup in the start / end label families.
    pub fn of(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "COMMENCE" | "COMMENCED" | "RESUME" | "RESUMED" | "START" | "STARTED" => Self::Start,
            "STOP" | "STOPPED" | "COMPLETE" | "COMPLETED" | "FINISH" | "FINISHED" => Self::End,
            _ => Self::Neither,
        }
    }
}
