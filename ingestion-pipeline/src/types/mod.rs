pub mod document;
pub mod metadata;

pub use document::{sanitize_file_name, BookFormat, ExtractionResult, PreparedBook, UploadedDocument};
pub use metadata::InferredMetadata;
