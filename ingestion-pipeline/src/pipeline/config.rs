use common::utils::config::{
    default_classifier_input_chars, default_classifier_timeout_secs,
    default_cover_min_dimension, default_max_upload_bytes, default_min_content_chars, AppConfig,
};

#[derive(Debug, Clone)]
pub struct IngestionTuning {
    pub min_content_chars: usize,
    pub cover_min_dimension: u32,
    pub classifier_input_chars: usize,
    pub classifier_timeout_secs: u64,
    pub max_upload_bytes: usize,
}

impl Default for IngestionTuning {
    fn default() -> Self {
        Self {
            min_content_chars: default_min_content_chars(),
            cover_min_dimension: default_cover_min_dimension(),
            classifier_input_chars: default_classifier_input_chars(),
            classifier_timeout_secs: default_classifier_timeout_secs(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub tuning: IngestionTuning,
    pub books_dir: String,
    pub covers_dir: String,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            tuning: IngestionTuning::default(),
            books_dir: "books".to_string(),
            covers_dir: "covers".to_string(),
        }
    }
}

impl IngestionConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            tuning: IngestionTuning {
                min_content_chars: config.min_content_chars,
                cover_min_dimension: config.cover_min_dimension,
                classifier_input_chars: config.classifier_input_chars,
                classifier_timeout_secs: config.classifier_timeout_secs,
                max_upload_bytes: config.max_upload_bytes,
            },
            books_dir: config.books_dir.trim_end_matches('/').to_string(),
            covers_dir: config.covers_dir.trim_end_matches('/').to_string(),
        }
    }

    /// Object location an upload with this sanitized name is stored at.
    pub fn storage_path(&self, file_name: &str) -> String {
        format!("{}/{file_name}", self.books_dir)
    }
}
