use std::{path::Path, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use common::{
    storage::{db::SurrealDbClient, store::StorageManager},
    utils::config::get_config,
};
use ingestion_pipeline::{IngestionConfig, IngestionPipeline, OpenAiCompletionProvider};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        bail!("usage: ingest <book.pdf|book.epub>...");
    }

    let config = get_config()?;

    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );
    db.ensure_initialized().await?;

    let storage = StorageManager::new(&config).await?;
    let provider = Arc::new(OpenAiCompletionProvider::from_config(&config));
    let pipeline = IngestionPipeline::new(
        db,
        storage,
        provider,
        IngestionConfig::from_app_config(&config),
    );
    let ingest_timeout = Duration::from_secs(config.ingest_timeout_secs);

    let mut failures = 0_usize;
    for path in &paths {
        if let Err(err) = ingest_file(&pipeline, Path::new(path), ingest_timeout).await {
            error!(path = %path, error = %format!("{err:#}"), "Failed to ingest book");
            failures = failures.saturating_add(1);
        }
    }

    if failures > 0 {
        bail!("{failures} of {} books failed to ingest", paths.len());
    }

    Ok(())
}

async fn ingest_file(
    pipeline: &IngestionPipeline,
    path: &Path,
    ingest_timeout: Duration,
) -> anyhow::Result<()> {
    let original_filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))?;
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;

    match tokio::time::timeout(ingest_timeout, pipeline.ingest(file, original_filename)).await {
        Ok(Ok(book)) => {
            info!(
                book_id = %book.id,
                title = %book.title,
                author = %book.author,
                category = %book.category,
                file_path = %book.file_path,
                "Book ingested"
            );
            Ok(())
        }
        Ok(Err(err)) => {
            warn!(
                path = %path.display(),
                kind = ?err.kind(),
                status = err.status_code(),
                "Book rejected"
            );
            Err(err.into())
        }
        Err(_) => bail!(
            "ingestion did not finish within {} seconds",
            ingest_timeout.as_secs()
        ),
    }
}
