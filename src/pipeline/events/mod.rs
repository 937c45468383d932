pub mod types;
pub mod ontology;
pub mod embedder;
pub mod classify;
pub mod timeparse;
pub mod intervals;

pub use types::*;
pub use ontology::EventOntology;
pub use embedder::{load_embedder, HashingEmbedder, EMBEDDING_DIM};
pub use classify::SemanticClassifier;
pub use timeparse::TimeExtractor;
pub use intervals::pair_intervals;

#[cfg(feature = "onnx-embeddings")]
pub use embedder::OnnxEmbedder;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Embedding model not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("Embedding model initialization: {0}")]
    ModelInit(String),

    #[error("Tokenization error: {0}")]
    Tokenization(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Ontology has no synonyms to embed")]
    EmptyOntology,
}
