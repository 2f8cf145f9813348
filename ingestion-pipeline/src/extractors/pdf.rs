use std::{collections::HashSet, io::Cursor};

use bytes::Bytes;
use common::storage::store::StorageManager;
use image::{GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, instrument, warn};

use super::{store_cover, CoverImage};
use crate::{error::ExtractionError, types::ExtractionResult};

/// Guards against malformed page trees with `Parent` cycles.
const MAX_PAGE_TREE_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub struct PdfExtractor {
    /// Images must be strictly larger than this in both dimensions to become the cover.
    cover_min_dimension: u32,
}

struct ParsedPdf {
    text: String,
    cover: Option<CoverImage>,
}

impl PdfExtractor {
    pub const fn new(cover_min_dimension: u32) -> Self {
        Self {
            cover_min_dimension,
        }
    }

    #[instrument(level = "trace", skip_all, fields(source_path = %source_path))]
    pub async fn extract(
        &self,
        storage: &StorageManager,
        source_path: &str,
        cover_dir: &str,
    ) -> Result<ExtractionResult, ExtractionError> {
        let bytes = storage.get(source_path).await?;

        let min_dimension = self.cover_min_dimension;
        let parse_input = bytes.clone();
        let parsed =
            tokio::task::spawn_blocking(move || parse_pdf(&parse_input, min_dimension)).await??;

        let text = if parsed.text.trim().is_empty() {
            debug!(source_path = %source_path, "PDF text layer empty, trying pdf-extract");
            fallback_text(bytes).await.unwrap_or_default()
        } else {
            parsed.text
        };

        let cover_image_path = match parsed.cover {
            Some(cover) => Some(store_cover(storage, source_path, cover_dir, cover).await?),
            None => None,
        };

        debug!(
            source_path = %source_path,
            text_chars = text.chars().count(),
            has_cover = cover_image_path.is_some(),
            "PDF extracted"
        );

        Ok(ExtractionResult {
            text,
            cover_image_path,
        })
    }
}

fn parse_pdf(bytes: &[u8], cover_min_dimension: u32) -> Result<ParsedPdf, ExtractionError> {
    let document = Document::load_mem(bytes)
        .map_err(|err| ExtractionError::Corrupt(format!("failed to parse PDF: {err}")))?;
    let pages = document.get_pages();

    let page_texts: Vec<String> = pages
        .keys()
        .map(|page_number| {
            document
                .extract_text(&[*page_number])
                .unwrap_or_else(|err| {
                    debug!(page = page_number, error = %err, "No text extracted from page");
                    String::new()
                })
        })
        .collect();

    let cover = find_cover(&document, pages.values().copied(), cover_min_dimension);

    Ok(ParsedPdf {
        text: page_texts.join("\n"),
        cover,
    })
}

/// Whole-document extraction with `pdf-extract`. Errors and panics both yield `None`.
async fn fallback_text(bytes: Bytes) -> Option<String> {
    match tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes)).await {
        Ok(Ok(text)) => Some(text),
        Ok(Err(err)) => {
            debug!(error = %err, "pdf-extract could not read the document");
            None
        }
        Err(err) => {
            warn!(error = %err, "pdf-extract worker failed");
            None
        }
    }
}

/// First embedded image, in page order, that is large enough and can be written out.
fn find_cover(
    document: &Document,
    page_ids: impl Iterator<Item = ObjectId>,
    min_dimension: u32,
) -> Option<CoverImage> {
    let mut seen = HashSet::new();

    for page_id in page_ids {
        for resources in page_resources(document, page_id) {
            let Some(xobjects) = resources
                .get(b"XObject")
                .ok()
                .and_then(|xobjects| resolve_dict(document, xobjects))
            else {
                continue;
            };

            for (_, entry) in xobjects.iter() {
                if let Object::Reference(id) = entry {
                    if !seen.insert(*id) {
                        continue;
                    }
                }

                let Some(stream) = resolve(document, entry).and_then(|o| o.as_stream().ok())
                else {
                    continue;
                };
                if let Some(cover) = image_as_cover(stream, min_dimension) {
                    return Some(cover);
                }
            }
        }
    }

    None
}

/// Resource dictionaries visible from a page, its own first, then inherited ones.
fn page_resources(document: &Document, page_id: ObjectId) -> Vec<&Dictionary> {
    let mut resources = Vec::new();
    let mut node = document.get_dictionary(page_id).ok();
    let mut depth = 0usize;

    while let Some(current) = node {
        if let Some(dict) = current
            .get(b"Resources")
            .ok()
            .and_then(|r| resolve_dict(document, r))
        {
            resources.push(dict);
        }

        depth = depth.saturating_add(1);
        if depth >= MAX_PAGE_TREE_DEPTH {
            break;
        }
        node = current
            .get(b"Parent")
            .ok()
            .and_then(|p| resolve_dict(document, p));
    }

    resources
}

fn image_as_cover(stream: &Stream, min_dimension: u32) -> Option<CoverImage> {
    let dict = &stream.dict;
    if dict.get(b"Subtype").and_then(Object::as_name).ok()? != b"Image" {
        return None;
    }

    let width = dimension(dict, b"Width")?;
    let height = dimension(dict, b"Height")?;
    if width <= min_dimension || height <= min_dimension {
        debug!(width, height, "Skipping image below cover size");
        return None;
    }

    let filters = filter_names(dict);
    match filters.as_slice() {
        [filter] if *filter == b"DCTDecode" => Some(CoverImage {
            data: stream.content.clone(),
            extension: "jpg",
        }),
        [filter] if *filter == b"JPXDecode" => Some(CoverImage {
            data: stream.content.clone(),
            extension: "jp2",
        }),
        [] => encode_png(dict, &stream.content, width, height),
        [filter] if *filter == b"FlateDecode" => {
            let pixels = stream.decompressed_content().ok()?;
            encode_png(dict, &pixels, width, height)
        }
        _ => None,
    }
}

/// Re-encode raw 8-bit RGB or grayscale samples as PNG.
fn encode_png(dict: &Dictionary, pixels: &[u8], width: u32, height: u32) -> Option<CoverImage> {
    if dict.get(b"BitsPerComponent").and_then(Object::as_i64).ok()? != 8 {
        return None;
    }
    let color_space = dict.get(b"ColorSpace").and_then(Object::as_name).ok()?;

    let pixel_count = usize::try_from(width)
        .ok()?
        .checked_mul(usize::try_from(height).ok()?)?;
    let mut data = Vec::new();
    let written = match color_space {
        b"DeviceRGB" => {
            let samples = pixels.get(..pixel_count.checked_mul(3)?)?;
            RgbImage::from_raw(width, height, samples.to_vec())?
                .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
        }
        b"DeviceGray" => {
            let samples = pixels.get(..pixel_count)?;
            GrayImage::from_raw(width, height, samples.to_vec())?
                .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
        }
        _ => return None,
    };

    match written {
        Ok(()) => Some(CoverImage {
            data,
            extension: "png",
        }),
        Err(err) => {
            debug!(error = %err, "Failed to encode cover image as PNG");
            None
        }
    }
}

fn dimension(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    let value = dict.get(key).and_then(Object::as_i64).ok()?;
    u32::try_from(value).ok()
}

fn filter_names(dict: &Dictionary) -> Vec<&[u8]> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.as_slice()],
        Ok(Object::Array(filters)) => filters
            .iter()
            .filter_map(|f| f.as_name().ok())
            .collect(),
        _ => Vec::new(),
    }
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_dict<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    resolve(document, object).and_then(|o| o.as_dict().ok())
}
