use common::{error::AppError, storage::types::book::BookDraft};
use tracing::{error, warn};

use crate::{
    error::IngestionError,
    types::{ExtractionResult, InferredMetadata, UploadedDocument},
};

use super::{config::IngestionConfig, services::PipelineServices};

pub struct PipelineContext<'a> {
    pub original_filename: &'a str,
    pub pipeline_config: &'a IngestionConfig,
    pub services: &'a dyn PipelineServices,
    pub document: Option<UploadedDocument>,
    /// Set once the upload has been written to storage.
    pub upload_stored: bool,
    pub extraction: Option<ExtractionResult>,
    pub metadata: Option<InferredMetadata>,
    pub draft: Option<BookDraft>,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        original_filename: &'a str,
        pipeline_config: &'a IngestionConfig,
        services: &'a dyn PipelineServices,
    ) -> Self {
        Self {
            original_filename,
            pipeline_config,
            services,
            document: None,
            upload_stored: false,
            extraction: None,
            metadata: None,
            draft: None,
        }
    }

    pub fn document(&self) -> Result<&UploadedDocument, IngestionError> {
        self.document.as_ref().ok_or_else(|| {
            AppError::InternalError("uploaded document expected to be available".into()).into()
        })
    }

    pub fn extraction(&self) -> Result<&ExtractionResult, IngestionError> {
        self.extraction.as_ref().ok_or_else(|| {
            AppError::InternalError("extraction result expected to be available".into()).into()
        })
    }

    pub fn take_metadata(&mut self) -> Result<InferredMetadata, IngestionError> {
        self.metadata.take().ok_or_else(|| {
            AppError::InternalError("metadata expected to be available for assembly".into()).into()
        })
    }

    pub fn take_draft(&mut self) -> Result<BookDraft, IngestionError> {
        self.draft.take().ok_or_else(|| {
            AppError::InternalError("draft expected to be available for persistence".into()).into()
        })
    }

    pub fn abort(&mut self, err: IngestionError) -> IngestionError {
        error!(
            original_filename = %self.original_filename,
            storage_path = self.document.as_ref().map_or("", |d| d.storage_path.as_str()),
            kind = ?err.kind(),
            error = %err,
            "ingestion pipeline aborted"
        );
        err
    }

    /// Remove whatever this run wrote to storage.
    ///
    /// Storage is left untouched when the objects at these locations belong to a
    /// committed book: on a duplicate rejection, or when another upload of the same
    /// file name was persisted while this run was in flight.
    pub async fn discard_stored_objects(&mut self, err: &IngestionError) {
        if matches!(err, IngestionError::DuplicatePath { .. }) {
            return;
        }

        let mut locations = Vec::new();
        if self.upload_stored {
            if let Some(document) = &self.document {
                locations.push(document.storage_path.clone());
            }
        }
        if let Some(cover) = self
            .extraction
            .as_ref()
            .and_then(|e| e.cover_image_path.clone())
        {
            locations.push(cover);
        }
        if locations.is_empty() {
            return;
        }

        // A concurrent run with the same file name may have committed in the meantime;
        // its record now owns these locations.
        if let Some(document) = &self.document {
            match self.services.find_existing(&document.storage_path).await {
                Ok(None) => {}
                Ok(Some(existing)) => {
                    warn!(
                        original_filename = %self.original_filename,
                        book_id = %existing.id,
                        storage_path = %document.storage_path,
                        "Stored objects now belong to another book, leaving them in place"
                    );
                    self.upload_stored = false;
                    return;
                }
                Err(lookup_err) => {
                    warn!(
                        original_filename = %self.original_filename,
                        error = %lookup_err,
                        "Could not check ownership of stored objects, leaving them in place"
                    );
                    self.upload_stored = false;
                    return;
                }
            }
        }

        if let Err(discard_err) = self.services.discard(&locations).await {
            warn!(
                original_filename = %self.original_filename,
                error = %discard_err,
                "Failed to remove stored objects of rejected upload"
            );
        }
        self.upload_stored = false;
    }
}
