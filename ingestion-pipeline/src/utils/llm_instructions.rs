use serde_json::json;

pub static BOOK_CLASSIFICATION_INSTRUCTIONS: &str = "You catalogue books for a personal library. \
Read the excerpt below and identify the book's title, its author and a short genre or subject \
category (for example \"Science Fiction\", \"History\", \"Programming\"). Answer with a single JSON \
object and nothing else, using exactly the keys \"title\", \"author\" and \"category\". \
Every value must be non-empty: when the excerpt does not state a value, give your best \
inference from the text.";

/// Schema the reply is expected to satisfy, embedded in the prompt.
pub fn get_book_metadata_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "title": { "type": "string", "minLength": 1 },
            "author": { "type": "string", "minLength": 1 },
            "category": { "type": "string", "minLength": 1 }
        },
        "required": ["title", "author", "category"],
        "additionalProperties": false
    })
}

pub fn build_classification_prompt(excerpt: &str) -> String {
    format!(
        "{BOOK_CLASSIFICATION_INSTRUCTIONS}\n\nJSON schema:\n{}\n\nExcerpt:\n{excerpt}",
        get_book_metadata_schema()
    )
}
