use crate::error::IngestionError;

/// Rejects extracted text too short to be worth classifying.
#[derive(Debug, Clone, Copy)]
pub struct ContentValidator {
    min_chars: usize,
}

impl ContentValidator {
    pub const fn new(min_chars: usize) -> Self {
        Self { min_chars }
    }

    /// Counts characters of the trimmed text.
    pub fn validate(&self, text: &str) -> Result<(), IngestionError> {
        let found = text.trim().chars().count();
        if found < self.min_chars {
            return Err(IngestionError::InsufficientContent {
                found,
                required: self.min_chars,
            });
        }

        Ok(())
    }
}
