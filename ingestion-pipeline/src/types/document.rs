use std::path::Path;

use common::storage::types::book::BookDraft;

/// Formats the pipeline knows how to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookFormat {
    Pdf,
    Epub,
}

impl BookFormat {
    /// Choose a format from the file extension, ignoring case.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let extension = Path::new(file_name).extension()?.to_str()?;
        if extension.eq_ignore_ascii_case("pdf") {
            Some(Self::Pdf)
        } else if extension.eq_ignore_ascii_case("epub") {
            Some(Self::Epub)
        } else {
            None
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Epub => "epub",
        }
    }
}

impl std::fmt::Display for BookFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An upload that has been accepted for processing and assigned a storage location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedDocument {
    pub original_filename: String,
    /// `original_filename` with unsafe characters replaced.
    pub file_name: String,
    pub format: BookFormat,
    pub storage_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub text: String,
    pub cover_image_path: Option<String>,
}

/// Replace every character of the stem that is not ASCII alphanumeric or `_` with `_`,
/// keeping the extension.
pub fn sanitize_file_name(file_name: &str) -> String {
    fn clean(part: &str) -> String {
        part.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    match file_name.rfind('.') {
        Some(idx) => {
            let (name, ext) = file_name.split_at(idx);
            format!("{}{}", clean(name), ext)
        }
        None => clean(file_name),
    }
}

/// Output of a run that stopped right before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedBook {
    pub document: UploadedDocument,
    pub draft: BookDraft,
}
