
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub qdrant: QdrantConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub consistency: ConsistencyConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
    pub embedding_dimension: u32,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// Read from `QDRANT_API_KEY`, never persisted to disk.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            collection: "rag_embedding".to_string(),
            embedding_dimension: 1024,
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub api_url: String,
    pub model: String,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    /// Read from `COHERE_API_KEY`, never persisted to disk.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.cohere.com".to_string(),
            model: "embed-english-v3.0".to_string(),
            batch_size: 96,
            batch_delay_ms: 100,
            timeout_seconds: 30,
            retry_attempts: 3,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub similarity_threshold: f32,
    pub max_results: usize,
    pub min_content_chars: usize,
    pub max_query_chars: usize,
    pub payload_content_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            max_results: 5,
            min_content_chars: 10,
            max_query_chars: 1000,
            payload_content_limit: 10000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in tokens.
    pub chunk_size: usize,
    /// Overlap between adjacent chunks in tokens.
    pub overlap_size: usize,
    /// Approximate characters per token, used in place of a real tokenizer.
    pub chars_per_token: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            overlap_size: 51,
            chars_per_token: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsistencyConfig {
    pub num_runs: usize,
    /// Pooled score standard deviation above this value marks a query inconsistent.
    pub score_std_dev_tolerance: f64,
    /// Fraction of expected keywords that must appear for a content accuracy pass.
    pub keyword_match_ratio: f64,
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            num_runs: 3,
            score_std_dev_tolerance: 0.1,
            keyword_match_ratio: 0.5,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid collection name: {0} (cannot be empty)")]
    InvalidCollection(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid batch size: {0} (must be between 1 and 96)")]
    InvalidBatchSize(usize),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid similarity threshold: {0} (must be between 0.0 and 1.0)")]
    InvalidSimilarityThreshold(f32),
    #[error("Invalid max results: {0} (must be between 1 and 100)")]
    InvalidMaxResults(usize),
    #[error("Invalid chunk size: {0} (must be between 16 and 4096 tokens)")]
    InvalidChunkSize(usize),
    #[error("Overlap size ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid chars per token: {0} (must be between 1 and 16)")]
    InvalidCharsPerToken(usize),
    #[error("Invalid consistency runs: {0} (must be between 1 and 50)")]
    InvalidConsistencyRuns(usize),
    #[error("Invalid std dev tolerance: {0} (must be between 0.0 and 1.0)")]
    InvalidStdDevTolerance(f64),
    #[error("Invalid keyword match ratio: {0} (must be greater than 0.0 and at most 1.0)")]
    InvalidKeywordRatio(f64),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Default configuration directory (`~/.config/rag-check` on Linux).
#[inline]
pub fn get_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("rag-check"))
        .context("Could not determine user configuration directory")
}

impl Config {
    /// Load configuration from `config.toml` in the given directory, falling
    /// back to defaults when the file does not exist. Credentials and the
    /// Qdrant URL are always taken from the environment.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;

            toml::from_str::<Config>(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            Config::default()
        };

        config.base_dir = config_dir.as_ref().to_path_buf();
        config.apply_env_overrides();

        config
            .validate()
            .context("Configuration validation failed")?;

        Ok(config)
    }

    /// Apply environment overrides for endpoints and credentials.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("QDRANT_URL") {
            if !url.trim().is_empty() {
                self.qdrant.url = url;
            }
        }
        if let Ok(key) = std::env::var("QDRANT_API_KEY") {
            if !key.trim().is_empty() {
                self.qdrant.api_key = Some(key);
            }
        }
        if let Ok(key) = std::env::var("COHERE_API_KEY") {
            if !key.trim().is_empty() {
                self.embedding.api_key = Some(key);
            }
        }
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join("config.toml")
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.qdrant.validate()?;
        self.embedding.validate()?;
        self.retrieval.validate()?;
        self.chunking.validate()?;
        self.consistency.validate()?;
        Ok(())
    }
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            qdrant: QdrantConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            chunking: ChunkingConfig::default(),
            consistency: ConsistencyConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}

impl QdrantConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_url()?;

        if self.collection.trim().is_empty() {
            return Err(ConfigError::InvalidCollection(self.collection.clone()));
        }

        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        if self.retry_attempts == 0 || self.retry_attempts > 10 {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        Ok(())
    }

    pub fn parsed_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.url).map_err(|_| ConfigError::InvalidUrl(self.url.clone()))
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.api_url).map_err(|_| ConfigError::InvalidUrl(self.api_url.clone()))?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        // Cohere rejects batches larger than 96 texts.
        if self.batch_size == 0 || self.batch_size > 96 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if self.retry_attempts == 0 || self.retry_attempts > 10 {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        Ok(())
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::InvalidSimilarityThreshold(
                self.similarity_threshold,
            ));
        }

        if self.max_results == 0 || self.max_results > 100 {
            return Err(ConfigError::InvalidMaxResults(self.max_results));
        }

        Ok(())
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(16..=4096).contains(&self.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }

        if self.overlap_size >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.overlap_size,
                self.chunk_size,
            ));
        }

        if self.chars_per_token == 0 || self.chars_per_token > 16 {
            return Err(ConfigError::InvalidCharsPerToken(self.chars_per_token));
        }

        Ok(())
    }
}

impl ConsistencyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_runs == 0 || self.num_runs > 50 {
            return Err(ConfigError::InvalidConsistencyRuns(self.num_runs));
        }

        if !(0.0..=1.0).contains(&self.score_std_dev_tolerance) {
            return Err(ConfigError::InvalidStdDevTolerance(
                self.score_std_dev_tolerance,
            ));
        }

        if self.keyword_match_ratio <= 0.0 || self.keyword_match_ratio > 1.0 {
            return Err(ConfigError::InvalidKeywordRatio(self.keyword_match_ratio));
        }

        Ok(())
    }
}
