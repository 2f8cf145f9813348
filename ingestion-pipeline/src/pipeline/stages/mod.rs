use bytes::Bytes;
use common::{error::AppError, storage::types::book::{BookDraft, BookRecord}};
use state_machines::core::GuardError;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, instrument};

use super::{
    context::PipelineContext,
    state::{
        Assembled, Classified, Extracted, IngestionMachine, PathAssigned, Persisted, Received,
        Unique, Validated,
    },
};
use crate::{
    error::IngestionError,
    types::{sanitize_file_name, BookFormat, UploadedDocument},
    validation::ContentValidator,
};

#[instrument(
    level = "trace",
    skip_all,
    fields(original_filename = %ctx.original_filename)
)]
pub async fn assign_path(
    machine: IngestionMachine<(), Received>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), PathAssigned>, IngestionError> {
    let original_filename = ctx.original_filename;
    if original_filename.trim().is_empty() {
        return Err(IngestionError::InvalidUpload(
            "file name must not be empty".into(),
        ));
    }

    let format = BookFormat::from_file_name(original_filename)
        .ok_or_else(|| IngestionError::unsupported_format(original_filename))?;
    let file_name = sanitize_file_name(original_filename);
    let storage_path = ctx.pipeline_config.storage_path(&file_name);

    debug!(
        original_filename = %original_filename,
        storage_path = %storage_path,
        format = %format,
        "ingestion path assigned"
    );

    ctx.document = Some(UploadedDocument {
        original_filename: original_filename.to_string(),
        file_name,
        format,
        storage_path,
    });

    machine
        .assign_path()
        .map_err(|(_, guard)| map_guard_error("assign_path", &guard))
}

#[instrument(
    level = "trace",
    skip_all,
    fields(original_filename = %ctx.original_filename)
)]
pub async fn guard_duplicate(
    machine: IngestionMachine<(), PathAssigned>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Unique>, IngestionError> {
    let storage_path = ctx.document()?.storage_path.clone();

    if let Some(existing) = ctx.services.find_existing(&storage_path).await? {
        debug!(book_id = %existing.id, storage_path = %storage_path, "book already stored");
        return Err(IngestionError::DuplicatePath { path: storage_path });
    }

    machine
        .confirm_unique()
        .map_err(|(_, guard)| map_guard_error("confirm_unique", &guard))
}

#[instrument(
    level = "trace",
    skip_all,
    fields(original_filename = %ctx.original_filename)
)]
pub async fn extract_content<R>(
    machine: IngestionMachine<(), Unique>,
    ctx: &mut PipelineContext<'_>,
    reader: &mut R,
) -> Result<IngestionMachine<(), Extracted>, IngestionError>
where
    R: AsyncRead + Unpin + Send,
{
    let max_bytes = ctx.pipeline_config.tuning.max_upload_bytes;
    let data = read_upload(reader, max_bytes).await?;

    let document = ctx.document()?.clone();
    ctx.services
        .store_upload(&document.storage_path, data)
        .await?;
    ctx.upload_stored = true;

    let extraction = ctx
        .services
        .extract(&document)
        .await
        .map_err(|err| IngestionError::from_extraction(&document.file_name, &err))?;

    info!(
        storage_path = %document.storage_path,
        format = %document.format,
        text_chars = extraction.text.chars().count(),
        cover = extraction.cover_image_path.as_deref().unwrap_or("none"),
        "ingestion content extracted"
    );

    ctx.extraction = Some(extraction);

    machine
        .extract()
        .map_err(|(_, guard)| map_guard_error("extract", &guard))
}

#[instrument(
    level = "trace",
    skip_all,
    fields(original_filename = %ctx.original_filename)
)]
pub async fn validate_content(
    machine: IngestionMachine<(), Extracted>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Validated>, IngestionError> {
    let validator = ContentValidator::new(ctx.pipeline_config.tuning.min_content_chars);
    validator.validate(&ctx.extraction()?.text)?;

    machine
        .validate()
        .map_err(|(_, guard)| map_guard_error("validate", &guard))
}

#[instrument(
    level = "trace",
    skip_all,
    fields(original_filename = %ctx.original_filename)
)]
pub async fn classify_metadata(
    machine: IngestionMachine<(), Validated>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Classified>, IngestionError> {
    let metadata = ctx.services.classify(&ctx.extraction()?.text).await;
    if metadata.is_fallback() || metadata.has_blank_field() {
        return Err(IngestionError::ClassificationFailed);
    }

    debug!(
        title = %metadata.title,
        author = %metadata.author,
        category = %metadata.category,
        "ingestion metadata inferred"
    );

    ctx.metadata = Some(metadata);

    machine
        .classify()
        .map_err(|(_, guard)| map_guard_error("classify", &guard))
}

#[instrument(
    level = "trace",
    skip_all,
    fields(original_filename = %ctx.original_filename)
)]
pub async fn assemble_draft(
    machine: IngestionMachine<(), Classified>,
    ctx: &mut PipelineContext<'_>,
) -> Result<IngestionMachine<(), Assembled>, IngestionError> {
    let metadata = ctx.take_metadata()?;
    let file_path = ctx.document()?.storage_path.clone();
    let cover_image_url = ctx.extraction()?.cover_image_path.clone();

    ctx.draft = Some(BookDraft {
        title: metadata.title,
        author: metadata.author,
        category: metadata.category,
        cover_image_url,
        file_path,
    });

    machine
        .assemble()
        .map_err(|(_, guard)| map_guard_error("assemble", &guard))
}

#[instrument(
    level = "trace",
    skip_all,
    fields(original_filename = %ctx.original_filename)
)]
pub async fn persist_book(
    machine: IngestionMachine<(), Assembled>,
    ctx: &mut PipelineContext<'_>,
) -> Result<(IngestionMachine<(), Persisted>, BookRecord), IngestionError> {
    let draft = ctx.take_draft()?;
    let file_path = draft.file_path.clone();

    let record = match ctx.services.create_book(draft).await {
        Ok(record) => record,
        Err(AppError::Conflict(_)) => {
            return Err(IngestionError::DuplicatePath { path: file_path });
        }
        Err(err) => return Err(err.into()),
    };

    let machine = machine
        .persist()
        .map_err(|(_, guard)| map_guard_error("persist", &guard))?;

    Ok((machine, record))
}

/// Buffer the upload, rejecting anything larger than `max_bytes`.
async fn read_upload<R>(reader: &mut R, max_bytes: usize) -> Result<Bytes, IngestionError>
where
    R: AsyncRead + Unpin + Send,
{
    let limit = u64::try_from(max_bytes)
        .unwrap_or(u64::MAX)
        .saturating_add(1);
    let mut data = Vec::new();
    reader
        .take(limit)
        .read_to_end(&mut data)
        .await
        .map_err(AppError::from)?;

    if data.len() > max_bytes {
        return Err(IngestionError::InvalidUpload(format!(
            "upload exceeds the maximum size of {max_bytes} bytes"
        )));
    }

    Ok(Bytes::from(data))
}

fn map_guard_error(event: &str, guard: &GuardError) -> IngestionError {
    AppError::InternalError(format!(
        "invalid ingestion pipeline transition during {event}: {guard:?}"
    ))
    .into()
}
