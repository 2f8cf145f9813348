use std::io::Cursor;

use common::storage::store::StorageManager;
use epub::doc::EpubDoc;
use scraper::{Html, Selector};
use tracing::{debug, instrument};

use super::{store_cover, CoverImage};
use crate::{error::ExtractionError, types::ExtractionResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct EpubExtractor;

struct ParsedEpub {
    text: String,
    cover: Option<CoverImage>,
}

impl EpubExtractor {
    #[instrument(level = "trace", skip_all, fields(source_path = %source_path))]
    pub async fn extract(
        &self,
        storage: &StorageManager,
        source_path: &str,
        cover_dir: &str,
    ) -> Result<ExtractionResult, ExtractionError> {
        let bytes = storage.get(source_path).await?;
        let parsed = tokio::task::spawn_blocking(move || parse_epub(bytes.to_vec())).await??;

        let cover_image_path = match parsed.cover {
            Some(cover) => Some(store_cover(storage, source_path, cover_dir, cover).await?),
            None => None,
        };

        debug!(
            source_path = %source_path,
            text_chars = parsed.text.chars().count(),
            has_cover = cover_image_path.is_some(),
            "EPUB extracted"
        );

        Ok(ExtractionResult {
            text: parsed.text,
            cover_image_path,
        })
    }
}

fn parse_epub(bytes: Vec<u8>) -> Result<ParsedEpub, ExtractionError> {
    let mut doc = EpubDoc::from_reader(Cursor::new(bytes))
        .map_err(|err| ExtractionError::Corrupt(format!("failed to parse EPUB: {err}")))?;

    let mut sections = Vec::new();
    for chapter in 0..doc.get_num_chapters() {
        doc.set_current_chapter(chapter);
        let Some((markup, mime)) = doc.get_current_str() else {
            continue;
        };
        if !is_html(&mime) {
            continue;
        }

        let text = html_to_text(&markup);
        if !text.is_empty() {
            sections.push(text);
        }
    }

    let cover = doc.get_cover().map(|(data, mime)| CoverImage {
        data,
        extension: extension_for_mime(&mime),
    });

    Ok(ParsedEpub {
        text: sections.join("\n\n"),
        cover,
    })
}

fn is_html(mime: &str) -> bool {
    matches!(mime, "application/xhtml+xml" | "text/html")
}

/// Visible text of the document body with whitespace collapsed.
fn html_to_text(markup: &str) -> String {
    let html = Html::parse_document(markup);
    let body = Selector::parse("body")
        .ok()
        .and_then(|selector| html.select(&selector).next());

    let fragments: Vec<&str> = match body {
        Some(body) => body.text().collect(),
        None => html.root_element().text().collect(),
    };

    fragments
        .iter()
        .flat_map(|fragment| fragment.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        _ => "img",
    }
}
