use common::error::AppError;
use thiserror::Error;
use tokio::task::JoinError;

/// Failure while turning a stored book into text and a cover.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("document could not be parsed: {0}")]
    Corrupt(String),
    #[error("storage error: {0}")]
    Storage(#[from] object_store::Error),
    #[error("extraction worker failed: {0}")]
    Worker(#[from] JoinError),
}

/// Why a source could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFault {
    UnsupportedFormat,
    Corrupt,
    Io,
}

impl From<&ExtractionError> for SourceFault {
    fn from(err: &ExtractionError) -> Self {
        match err {
            ExtractionError::Corrupt(_) => Self::Corrupt,
            ExtractionError::Storage(_) | ExtractionError::Worker(_) => Self::Io,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionErrorKind {
    DuplicatePath,
    UnreadableSource,
    InsufficientContent,
    ClassificationFailed,
    InvalidUpload,
    Internal,
}

/// Every way an ingestion run can be rejected.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("a book is already stored at {path}")]
    DuplicatePath { path: String },
    #[error("cannot read {file_name}: {reason}")]
    UnreadableSource {
        file_name: String,
        fault: SourceFault,
        reason: String,
    },
    #[error("not enough text to classify: found {found} characters, need at least {required}")]
    InsufficientContent { found: usize, required: usize },
    #[error("metadata could not be inferred from the document")]
    ClassificationFailed,
    #[error("invalid upload: {0}")]
    InvalidUpload(String),
    #[error(transparent)]
    Internal(#[from] AppError),
}

impl IngestionError {
    pub fn unsupported_format(file_name: &str) -> Self {
        Self::UnreadableSource {
            file_name: file_name.to_string(),
            fault: SourceFault::UnsupportedFormat,
            reason: "only .pdf and .epub files are supported".to_string(),
        }
    }

    pub fn from_extraction(file_name: &str, err: &ExtractionError) -> Self {
        Self::UnreadableSource {
            file_name: file_name.to_string(),
            fault: SourceFault::from(err),
            reason: err.to_string(),
        }
    }

    pub const fn kind(&self) -> IngestionErrorKind {
        match self {
            Self::DuplicatePath { .. } => IngestionErrorKind::DuplicatePath,
            Self::UnreadableSource { .. } => IngestionErrorKind::UnreadableSource,
            Self::InsufficientContent { .. } => IngestionErrorKind::InsufficientContent,
            Self::ClassificationFailed => IngestionErrorKind::ClassificationFailed,
            Self::InvalidUpload(_) => IngestionErrorKind::InvalidUpload,
            Self::Internal(_) => IngestionErrorKind::Internal,
        }
    }

    /// HTTP status a route layer should answer with.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::DuplicatePath { .. } => 409,
            Self::UnreadableSource { fault, .. } => match fault {
                SourceFault::UnsupportedFormat => 400,
                SourceFault::Corrupt => 422,
                SourceFault::Io => 500,
            },
            Self::InsufficientContent { .. } | Self::ClassificationFailed => 422,
            Self::InvalidUpload(_) => 400,
            Self::Internal(_) => 500,
        }
    }

    /// Whether resubmitting a different file could succeed.
    pub const fn is_client_error(&self) -> bool {
        let status = self.status_code();
        status >= 400 && status < 500
    }
}
