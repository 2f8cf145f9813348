use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Local,
    Memory,
}

fn default_storage_kind() -> StorageKind {
    StorageKind::Local
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_classification_model")]
    pub classification_model: String,
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,
    /// Object prefix that uploaded books are stored under.
    #[serde(default = "default_books_dir")]
    pub books_dir: String,
    /// Object prefix that extracted cover images are written to.
    #[serde(default = "default_covers_dir")]
    pub covers_dir: String,
    /// Extracted text shorter than this (in characters) is rejected before classification.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
    /// Embedded PDF images must exceed this width and height to be used as a cover.
    #[serde(default = "default_cover_min_dimension")]
    pub cover_min_dimension: u32,
    #[serde(default = "default_classifier_input_chars")]
    pub classifier_input_chars: usize,
    #[serde(default = "default_classifier_timeout_secs")]
    pub classifier_timeout_secs: u64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_ingest_timeout_secs")]
    pub ingest_timeout_secs: u64,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_classification_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_books_dir() -> String {
    "books".to_string()
}

fn default_covers_dir() -> String {
    "covers".to_string()
}

pub const fn default_min_content_chars() -> usize {
    50
}

pub const fn default_cover_min_dimension() -> u32 {
    100
}

pub const fn default_classifier_input_chars() -> usize {
    12_000
}

pub const fn default_classifier_timeout_secs() -> u64 {
    60
}

pub const fn default_max_upload_bytes() -> usize {
    200 * 1024 * 1024
}

pub const fn default_ingest_timeout_secs() -> u64 {
    300
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: default_base_url(),
            classification_model: default_classification_model(),
            surrealdb_address: String::new(),
            surrealdb_username: String::new(),
            surrealdb_password: String::new(),
            surrealdb_namespace: String::new(),
            surrealdb_database: String::new(),
            data_dir: default_data_dir(),
            storage: default_storage_kind(),
            books_dir: default_books_dir(),
            covers_dir: default_covers_dir(),
            min_content_chars: default_min_content_chars(),
            cover_min_dimension: default_cover_min_dimension(),
            classifier_input_chars: default_classifier_input_chars(),
            classifier_timeout_secs: default_classifier_timeout_secs(),
            max_upload_bytes: default_max_upload_bytes(),
            ingest_timeout_secs: default_ingest_timeout_secs(),
        }
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_defaults_for_optional_fields() {
        let config = Config::builder()
            .set_override("openai_api_key", "key")
            .and_then(|b| b.set_override("surrealdb_address", "mem://"))
            .and_then(|b| b.set_override("surrealdb_username", "root"))
            .and_then(|b| b.set_override("surrealdb_password", "root"))
            .and_then(|b| b.set_override("surrealdb_namespace", "ns"))
            .and_then(|b| b.set_override("surrealdb_database", "db"))
            .expect("overrides")
            .build()
            .expect("build config");

        let app: AppConfig = config.try_deserialize().expect("deserialize");

        assert_eq!(app.books_dir, "books");
        assert_eq!(app.covers_dir, "covers");
        assert_eq!(app.min_content_chars, 50);
        assert_eq!(app.cover_min_dimension, 100);
        assert_eq!(app.storage, StorageKind::Local);
        assert_eq!(app.openai_base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn storage_kind_parses_lowercase() {
        let config = Config::builder()
            .set_override("openai_api_key", "key")
            .and_then(|b| b.set_override("surrealdb_address", "mem://"))
            .and_then(|b| b.set_override("surrealdb_username", "root"))
            .and_then(|b| b.set_override("surrealdb_password", "root"))
            .and_then(|b| b.set_override("surrealdb_namespace", "ns"))
            .and_then(|b| b.set_override("surrealdb_database", "db"))
            .and_then(|b| b.set_override("storage", "memory"))
            .and_then(|b| b.set_override("min_content_chars", 10))
            .expect("overrides")
            .build()
            .expect("build config");

        let app: AppConfig = config.try_deserialize().expect("deserialize");

        assert_eq!(app.storage, StorageKind::Memory);
        assert_eq!(app.min_content_chars, 10);
    }
}
