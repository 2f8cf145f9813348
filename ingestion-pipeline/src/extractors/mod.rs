mod epub;
mod pdf;

pub use self::epub::EpubExtractor;
pub use self::pdf::PdfExtractor;

use std::path::Path;

use common::storage::store::StorageManager;

use crate::{
    error::ExtractionError,
    types::{BookFormat, ExtractionResult},
};

/// Format-specific text and cover extraction over objects in storage.
#[derive(Debug, Clone)]
pub enum Extractor {
    Pdf(PdfExtractor),
    Epub(EpubExtractor),
}

impl Extractor {
    pub fn for_format(format: BookFormat, cover_min_dimension: u32) -> Self {
        match format {
            BookFormat::Pdf => Self::Pdf(PdfExtractor::new(cover_min_dimension)),
            BookFormat::Epub => Self::Epub(EpubExtractor),
        }
    }

    /// Read `source_path` from storage, returning its text and, when one is found,
    /// the location of a cover image written below `cover_dir`.
    pub async fn extract(
        &self,
        storage: &StorageManager,
        source_path: &str,
        cover_dir: &str,
    ) -> Result<ExtractionResult, ExtractionError> {
        match self {
            Self::Pdf(extractor) => extractor.extract(storage, source_path, cover_dir).await,
            Self::Epub(extractor) => extractor.extract(storage, source_path, cover_dir).await,
        }
    }
}

/// A cover image ready to be written, with the file extension matching its encoding.
struct CoverImage {
    data: Vec<u8>,
    extension: &'static str,
}

/// `{cover_dir}/cover_{file name}.{ext}`.
fn cover_location(cover_dir: &str, source_path: &str, extension: &str) -> String {
    let file_name = Path::new(source_path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(source_path);
    let cover_dir = cover_dir.trim_end_matches('/');

    format!("{cover_dir}/cover_{file_name}.{extension}")
}

async fn store_cover(
    storage: &StorageManager,
    source_path: &str,
    cover_dir: &str,
    cover: CoverImage,
) -> Result<String, ExtractionError> {
    let location = cover_location(cover_dir, source_path, cover.extension);
    storage.put(&location, cover.data.into()).await?;
    tracing::debug!(source_path = %source_path, cover = %location, "Cover image stored");

    Ok(location)
}
