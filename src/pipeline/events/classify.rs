//! Embedding-similarity event classifier.
//!
//! Every ontology phrase is embedded once at construction; `classify` embeds
//! the query and returns the label owning the most similar phrase. No
//! threshold is applied here; cutoffs belong to the caller.

use std::sync::Arc;

use super::ontology::EventOntology;
use super::types::{Classification, EmbeddingModel};
use super::ClassifierError;

pub struct SemanticClassifier {
    model: Arc<dyn EmbeddingModel>,
    /// Parallel vectors: phrase text, owning label, phrase embedding.
    phrases: Vec<String>,
    owners: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    ontology_size: usize,
}

impl SemanticClassifier {
    pub fn new(ontology: &EventOntology, model: Arc<dyn EmbeddingModel>) -> Result<Self, ClassifierError> {
        let (phrases, owners): (Vec<String>, Vec<String>) = ontology.vocabulary().into_iter().unzip();
        if phrases.is_empty() {
            return Err(ClassifierError::EmptyOntology);
        }

        let refs: Vec<&str> = phrases.iter().map(String::as_str).collect();
        let embeddings = model.embed_batch(&refs)?;
        if embeddings.len() != phrases.len() {
            return Err(ClassifierError::Embedding(format!(
                "model returned {} vectors for {} phrases",
                embeddings.len(),
                phrases.len()
            )));
        }
        let expected = model.dimension();
        if let Some(bad) = embeddings.iter().find(|v| v.len() != expected) {
            return Err(ClassifierError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        tracing::info!(
            labels = ontology.len(),
            phrases = phrases.len(),
            model = model.name(),
            "Event classifier ready"
        );

        Ok(Self {
            model,
            phrases,
            owners,
            embeddings,
            ontology_size: ontology.len(),
        })
    }

    /// Best-matching label for `text`, with cosine score clamped to [0, 1].
    ///
    /// Blank text yields `Classification::none()`. Ties go to the phrase
    /// that comes first in ontology order.
    pub fn classify(&self, text: &str) -> Result<Classification, ClassifierError> {
        let query = text.trim();
        if query.is_empty() {
            return Ok(Classification::none());
        }

        let q = self.model.embed(query)?;
        let mut best: Option<(usize, f32)> = None;
        for (i, emb) in self.embeddings.iter().enumerate() {
            let score = cosine(&q, emb);
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((i, score));
            }
        }

        Ok(match best {
            Some((i, score)) => Classification {
                label: Some(self.owners[i].clone()),
                confidence: score.clamp(0.0, 1.0),
                matched_synonym: Some(self.phrases[i].clone()),
            },
            None => Classification::none(),
        })
    }

    /// Number of labels in the ontology (not phrases).
    pub fn ontology_size(&self) -> usize {
        self.ontology_size
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    let score = dot / (na * nb);
    if score.is_nan() {
        0.0
    } else {
        score
    }
}
