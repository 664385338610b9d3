use crate::model::{ConfigError, StoreFilter};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

fn default_name_threshold() -> f64 {
    0.5
}

fn default_similar_word_threshold() -> f64 {
    0.75
}

fn default_promotion_name_threshold() -> f64 {
    0.8
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    /// Minimum name similarity for two same-size, same-brand listings.
    #[serde(default = "default_name_threshold")]
    pub name_threshold: f64,
    /// Normalized edit similarity at which two words count as variants.
    #[serde(default = "default_similar_word_threshold")]
    pub similar_word_threshold: f64,
    #[serde(default = "default_promotion_name_threshold")]
    pub promotion_name_threshold: f64,
    /// Store-name patterns, most preferred first.
    #[serde(default)]
    pub store_priority: Vec<String>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            name_threshold: default_name_threshold(),
            similar_word_threshold: default_similar_word_threshold(),
            promotion_name_threshold: default_promotion_name_threshold(),
            store_priority: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    Http {
        base_url: String,
        #[serde(default)]
        api_key: Option<String>,
    },
    Sqlite {
        path: PathBuf,
    },
    File {
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub matching: MatchingConfig,
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub stores: Vec<String>,
    /// Zero runs a single pass and exits.
    #[serde(default)]
    pub check_interval_seconds: u64,
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    /// SQLite file that keeps the latest fetched listings per store.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn store_filter(&self) -> StoreFilter {
        StoreFilter { stores: self.stores.clone() }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::Invalid("at least one listing source is required".into()));
        }

        let thresholds = [
            ("name_threshold", self.matching.name_threshold),
            ("similar_word_threshold", self.matching.similar_word_threshold),
            ("promotion_name_threshold", self.matching.promotion_name_threshold),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!("{name} must be within [0, 1], got {value}")));
            }
        }

        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = serde_json::from_str(content)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}
