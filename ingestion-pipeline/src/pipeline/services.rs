use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        store::StorageManager,
        types::book::{BookDraft, BookRecord},
    },
};

use super::config::IngestionConfig;
use crate::{
    classifier::MetadataClassifier,
    error::ExtractionError,
    extractors::Extractor,
    types::{ExtractionResult, InferredMetadata, UploadedDocument},
    utils::completion::CompletionProvider,
};

/// Collaborators the pipeline stages call out to.
#[async_trait]
pub trait PipelineServices: Send + Sync {
    async fn find_existing(&self, storage_path: &str) -> Result<Option<BookRecord>, AppError>;

    async fn store_upload(&self, storage_path: &str, data: Bytes) -> Result<(), AppError>;

    async fn extract(
        &self,
        document: &UploadedDocument,
    ) -> Result<ExtractionResult, ExtractionError>;

    async fn classify(&self, text: &str) -> InferredMetadata;

    async fn create_book(&self, draft: BookDraft) -> Result<BookRecord, AppError>;

    /// Best-effort removal of stored objects; missing objects are not an error.
    async fn discard(&self, locations: &[String]) -> Result<(), AppError>;
}

pub struct DefaultPipelineServices {
    db: Arc<SurrealDbClient>,
    storage: StorageManager,
    classifier: MetadataClassifier,
    pipeline_config: IngestionConfig,
}

impl DefaultPipelineServices {
    pub fn new(
        db: Arc<SurrealDbClient>,
        storage: StorageManager,
        provider: Arc<dyn CompletionProvider>,
        pipeline_config: IngestionConfig,
    ) -> Self {
        let classifier = MetadataClassifier::new(
            provider,
            pipeline_config.tuning.classifier_input_chars,
            Duration::from_secs(pipeline_config.tuning.classifier_timeout_secs),
        );

        Self {
            db,
            storage,
            classifier,
            pipeline_config,
        }
    }
}

#[async_trait]
impl PipelineServices for DefaultPipelineServices {
    async fn find_existing(&self, storage_path: &str) -> Result<Option<BookRecord>, AppError> {
        BookRecord::find_by_path(storage_path, &self.db).await
    }

    async fn store_upload(&self, storage_path: &str, data: Bytes) -> Result<(), AppError> {
        self.storage.put(storage_path, data).await?;
        Ok(())
    }

    async fn extract(
        &self,
        document: &UploadedDocument,
    ) -> Result<ExtractionResult, ExtractionError> {
        Extractor::for_format(
            document.format,
            self.pipeline_config.tuning.cover_min_dimension,
        )
        .extract(
            &self.storage,
            &document.storage_path,
            &self.pipeline_config.covers_dir,
        )
        .await
    }

    async fn classify(&self, text: &str) -> InferredMetadata {
        self.classifier.classify(text).await
    }

    async fn create_book(&self, draft: BookDraft) -> Result<BookRecord, AppError> {
        BookRecord::create(draft, &self.db).await
    }

    async fn discard(&self, locations: &[String]) -> Result<(), AppError> {
        for location in locations {
            self.storage.delete(location).await?;
        }
        Ok(())
    }
}
