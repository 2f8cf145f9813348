use std::{sync::Arc, time::Duration};

use common::error::AppError;
use tracing::{debug, instrument, warn};

use crate::{
    types::InferredMetadata,
    utils::{completion::CompletionProvider, llm_instructions::build_classification_prompt},
};

/// Infers title, author and category from extracted text.
///
/// Never fails: any provider error, timeout or unusable reply yields
/// [`InferredMetadata::fallback`].
pub struct MetadataClassifier {
    provider: Arc<dyn CompletionProvider>,
    input_chars: usize,
    timeout: Duration,
}

impl MetadataClassifier {
    pub fn new(provider: Arc<dyn CompletionProvider>, input_chars: usize, timeout: Duration) -> Self {
        Self {
            provider,
            input_chars,
            timeout,
        }
    }

    #[instrument(level = "trace", skip_all, fields(text_chars = text.chars().count()))]
    pub async fn classify(&self, text: &str) -> InferredMetadata {
        let prompt = build_classification_prompt(&truncate_chars(text, self.input_chars));

        let reply = match tokio::time::timeout(self.timeout, self.provider.complete(&prompt)).await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => {
                warn!(error = %err, "Metadata completion failed");
                return InferredMetadata::fallback();
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "Metadata completion timed out"
                );
                return InferredMetadata::fallback();
            }
        };

        parse_metadata(&reply).unwrap_or_else(|err| {
            warn!(error = %err, "Metadata reply could not be used");
            debug!(reply = %reply, "Unparseable metadata reply");
            InferredMetadata::fallback()
        })
    }
}

/// Parse a model reply, tolerating a surrounding markdown code fence.
///
/// Strict JSON is tried first; replies using single quotes or trailing commas are
/// accepted through the JSON5 grammar.
pub fn parse_metadata(reply: &str) -> Result<InferredMetadata, AppError> {
    let body = strip_code_fence(reply);
    serde_json::from_str::<InferredMetadata>(body)
        .or_else(|strict_err| json5::from_str::<InferredMetadata>(body).map_err(|_| strict_err))
        .map_err(|e| {
            AppError::LLMParsing(format!("Failed to parse LLM response into metadata: {e}"))
        })
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(fenced) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string (`json`) on the opening line.
    let body = fenced.split_once('\n').map_or("", |(_, rest)| rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
