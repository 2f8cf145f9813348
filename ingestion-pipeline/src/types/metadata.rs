use serde::{Deserialize, Serialize};

/// Marker the classifier puts in every field when inference failed.
pub const FALLBACK_VALUE: &str = "Error de IA";

/// Title, author and category inferred from a book's text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InferredMetadata {
    pub title: String,
    pub author: String,
    pub category: String,
}

impl InferredMetadata {
    pub fn fallback() -> Self {
        Self {
            title: FALLBACK_VALUE.to_string(),
            author: FALLBACK_VALUE.to_string(),
            category: FALLBACK_VALUE.to_string(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.title == FALLBACK_VALUE
            && self.author == FALLBACK_VALUE
            && self.category == FALLBACK_VALUE
    }

    /// True when any field is empty or whitespace only.
    pub fn has_blank_field(&self) -> bool {
        [&self.title, &self.author, &self.category]
            .iter()
            .any(|value| value.trim().is_empty())
    }
}
