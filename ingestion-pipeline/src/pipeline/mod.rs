mod config;
mod context;
mod services;
mod stages;
mod state;

pub use config::{IngestionConfig, IngestionTuning};
#[allow(clippy::module_name_repetitions)]
pub use services::{DefaultPipelineServices, PipelineServices};

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use common::storage::{db::SurrealDbClient, store::StorageManager, types::book::BookRecord};
use tokio::io::AsyncRead;
use tracing::info;

use self::{
    context::PipelineContext,
    stages::{
        assemble_draft, assign_path, classify_metadata, extract_content, guard_duplicate,
        persist_book, validate_content,
    },
    state::{received, Assembled, IngestionMachine},
};
use crate::{error::IngestionError, types::PreparedBook, utils::completion::CompletionProvider};

/// Turns an uploaded PDF or EPUB into a stored book record.
///
/// Holds no per-run state, so one instance can be shared behind an `Arc`.
#[allow(clippy::module_name_repetitions)]
pub struct IngestionPipeline {
    pipeline_config: IngestionConfig,
    services: Arc<dyn PipelineServices>,
}

/// Stage timings of a run, logged when it finishes.
#[derive(Default)]
struct StageDurations {
    path: Duration,
    duplicate: Duration,
    extract: Duration,
    validate: Duration,
    classify: Duration,
    assemble: Duration,
}

impl IngestionPipeline {
    pub fn new(
        db: Arc<SurrealDbClient>,
        storage: StorageManager,
        provider: Arc<dyn CompletionProvider>,
        pipeline_config: IngestionConfig,
    ) -> Self {
        let services =
            DefaultPipelineServices::new(db, storage, provider, pipeline_config.clone());

        Self::with_services(pipeline_config, Arc::new(services))
    }

    pub fn with_services(
        pipeline_config: IngestionConfig,
        services: Arc<dyn PipelineServices>,
    ) -> Self {
        Self {
            pipeline_config,
            services,
        }
    }

    /// Run every stage and persist the resulting book.
    ///
    /// The upload is read from `reader` only after the duplicate check passed. On
    /// rejection the objects this run stored are removed again.
    #[tracing::instrument(skip_all, fields(original_filename = %original_filename))]
    pub async fn ingest<R>(
        &self,
        mut reader: R,
        original_filename: &str,
    ) -> Result<BookRecord, IngestionError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut ctx =
            PipelineContext::new(original_filename, &self.pipeline_config, self.services.as_ref());
        let pipeline_started = Instant::now();

        let result = match Self::drive_to_assembled(&mut ctx, &mut reader).await {
            Ok((machine, durations)) => {
                let stage_start = Instant::now();
                match persist_book(machine, &mut ctx).await {
                    Ok((_machine, record)) => Ok((record, durations, stage_start.elapsed())),
                    Err(err) => Err(ctx.abort(err)),
                }
            }
            Err(err) => Err(err),
        };

        match result {
            Ok((record, durations, persist_duration)) => {
                info!(
                    book_id = %record.id,
                    file_path = %record.file_path,
                    total_ms = Self::duration_millis(pipeline_started.elapsed()),
                    path_ms = Self::duration_millis(durations.path),
                    duplicate_ms = Self::duration_millis(durations.duplicate),
                    extract_ms = Self::duration_millis(durations.extract),
                    validate_ms = Self::duration_millis(durations.validate),
                    classify_ms = Self::duration_millis(durations.classify),
                    assemble_ms = Self::duration_millis(durations.assemble),
                    persist_ms = Self::duration_millis(persist_duration),
                    "ingestion pipeline finished"
                );
                Ok(record)
            }
            Err(err) => {
                ctx.discard_stored_objects(&err).await;
                Err(err)
            }
        }
    }

    /// Runs the pipeline up to (but excluding) persistence and returns the assembled book.
    ///
    /// The upload and cover stay in storage for the caller to persist or discard.
    #[tracing::instrument(skip_all, fields(original_filename = %original_filename))]
    pub async fn assemble<R>(
        &self,
        mut reader: R,
        original_filename: &str,
    ) -> Result<PreparedBook, IngestionError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut ctx =
            PipelineContext::new(original_filename, &self.pipeline_config, self.services.as_ref());

        let prepared = match Self::drive_to_assembled(&mut ctx, &mut reader).await {
            Ok(_machine) => Self::take_prepared(&mut ctx),
            Err(err) => Err(err),
        };

        match prepared {
            Ok(prepared) => Ok(prepared),
            Err(err) => {
                ctx.discard_stored_objects(&err).await;
                Err(err)
            }
        }
    }

    fn take_prepared(ctx: &mut PipelineContext<'_>) -> Result<PreparedBook, IngestionError> {
        let draft = ctx.take_draft()?;
        let document = ctx.document()?.clone();
        Ok(PreparedBook { document, draft })
    }

    fn duration_millis(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }

    async fn drive_to_assembled<R>(
        ctx: &mut PipelineContext<'_>,
        reader: &mut R,
    ) -> Result<(IngestionMachine<(), Assembled>, StageDurations), IngestionError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut durations = StageDurations::default();
        let machine = received();

        let stage_start = Instant::now();
        let machine = assign_path(machine, ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        durations.path = stage_start.elapsed();

        let stage_start = Instant::now();
        let machine = guard_duplicate(machine, ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        durations.duplicate = stage_start.elapsed();

        let stage_start = Instant::now();
        let machine = extract_content(machine, ctx, reader)
            .await
            .map_err(|err| ctx.abort(err))?;
        durations.extract = stage_start.elapsed();

        let stage_start = Instant::now();
        let machine = validate_content(machine, ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        durations.validate = stage_start.elapsed();

        let stage_start = Instant::now();
        let machine = classify_metadata(machine, ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        durations.classify = stage_start.elapsed();

        let stage_start = Instant::now();
        let machine = assemble_draft(machine, ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        durations.assemble = stage_start.elapsed();

        Ok((machine, durations))
    }
}
