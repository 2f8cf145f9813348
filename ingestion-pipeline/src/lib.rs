#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod classifier;
pub mod error;
pub mod extractors;
pub mod pipeline;
pub mod types;
pub mod utils;
pub mod validation;

pub use classifier::MetadataClassifier;
pub use error::{ExtractionError, IngestionError, IngestionErrorKind, SourceFault};
pub use extractors::Extractor;
pub use pipeline::{
    DefaultPipelineServices, IngestionConfig, IngestionPipeline, IngestionTuning,
    PipelineServices,
};
pub use types::{BookFormat, ExtractionResult, InferredMetadata, PreparedBook, UploadedDocument};
pub use utils::completion::{CompletionProvider, OpenAiCompletionProvider};
pub use validation::ContentValidator;
