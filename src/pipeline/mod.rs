pub mod layout;
pub mod events;
pub mod business;
pub mod processor;

pub use processor::{ExtractionOutput, ExtractionPipeline, ExtractionRequest, PipelineError};
