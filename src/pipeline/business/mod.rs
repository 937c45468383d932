pub mod types;
pub mod labels;
pub mod extractor;

pub use types::*;
pub use labels::BusinessLabels;
pub use extractor::BusinessFieldExtractor;
