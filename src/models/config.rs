use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::search::{DistanceMetric, OutputFormat};
use crate::error::ConfigError;

pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 384;
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_INDEX_DIR: &str = "index";
pub const DEFAULT_TOP_K: u32 = 4;
pub const DEFAULT_METRICS_RETENTION_DAYS: u32 = 30;

const APP_DIR: &str = "docqa";
const PROJECT_DIR: &str = ".docqa";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Configuration after layering, with the files it was read from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: Config,
    pub global_path: Option<PathBuf>,
    pub project_path: Option<PathBuf>,
}

impl Config {
    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join(CONFIG_FILE))
    }

    pub fn project_path() -> Option<PathBuf> {
        std::env::current_dir()
            .ok()
            .map(|p| p.join(PROJECT_DIR).join(CONFIG_FILE))
    }

    pub fn models_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map(|p| p.join(APP_DIR).join("models"))
    }

    pub fn default_metrics_path() -> Option<PathBuf> {
        dirs::data_local_dir().map(|p| p.join(APP_DIR).join("metrics.db"))
    }

    /// Load defaults, then the global file, then the project file, then
    /// `DOCQA_*` environment overrides. The result is validated.
    pub fn load() -> Result<ResolvedConfig, ConfigError> {
        let global = Self::global_path().filter(|p| p.exists());
        let project = Self::project_path().filter(|p| p.exists());

        let mut merged = toml::Table::new();
        for path in global.iter().chain(project.iter()) {
            let content = std::fs::read_to_string(path)?;
            let table: toml::Table = toml::from_str(&content)?;
            merge_tables(&mut merged, table);
        }

        let mut config: Config = toml::Value::Table(merged).try_into()?;
        config.apply_env()?;
        config.validate()?;

        Ok(ResolvedConfig {
            config,
            global_path: global,
            project_path: project,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(dir) = std::env::var("DOCQA_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("DOCQA_INDEX_DIR") {
            self.storage.index_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("DOCQA_MODEL_PATH") {
            self.embedding.model_path = Some(PathBuf::from(path));
        }
        if let Ok(provider) = std::env::var("DOCQA_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider.parse().map_err(ConfigError::ValidationError)?;
        }
        if let Ok(top_k) = std::env::var("DOCQA_TOP_K") {
            self.search.top_k = top_k.parse().map_err(|_| {
                ConfigError::ValidationError(format!("DOCQA_TOP_K is not a number: {top_k}"))
            })?;
        }
        Ok(())
    }

    /// Reject parameter combinations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunking.validate()?;

        if self.search.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "search.top_k must be at least 1".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.batch_size must be at least 1".to_string(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimension must be at least 1".to_string(),
            ));
        }
        if self.embedding.model_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "embedding.model_id cannot be empty".to_string(),
            ));
        }
        if self.loader.extensions.is_empty() {
            return Err(ConfigError::ValidationError(
                "loader.extensions cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory holding `model.onnx` and `tokenizer.json`.
    pub fn model_dir(&self) -> Option<PathBuf> {
        self.embedding.model_path.clone().or_else(|| {
            Self::models_dir().map(|dir| dir.join(self.embedding.model_id.replace('/', "--")))
        })
    }

    pub fn metrics_path(&self) -> Option<PathBuf> {
        self.metrics
            .path
            .clone()
            .or_else(Self::default_metrics_path)
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_index_dir() -> PathBuf {
    PathBuf::from(DEFAULT_INDEX_DIR)
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            index_dir: default_index_dir(),
        }
    }
}

/// Which embedder implementation to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Sentence-transformer model run through ONNX Runtime
    #[default]
    Onnx,
    /// Deterministic feature hashing, no model files required
    Hash,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "onnx" => Ok(EmbeddingProvider::Onnx),
            "hash" => Ok(EmbeddingProvider::Hash),
            _ => Err(format!("unknown embedding provider: {}", s)),
        }
    }
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProvider::Onnx => write!(f, "onnx"),
            EmbeddingProvider::Hash => write!(f, "hash"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    #[serde(default = "default_embedding_model")]
    pub model_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,

    #[serde(default = "default_embedding_dimension")]
    pub dimension: u32,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_batch_size() -> u32 {
    32
}

fn default_max_tokens() -> u32 {
    512
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model_id: default_embedding_model(),
            model_path: None,
            dimension: default_embedding_dimension(),
            batch_size: default_batch_size(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,

    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
}

fn default_chunk_size() -> u32 {
    800
}

fn default_chunk_overlap() -> u32 {
    200
}

fn default_separators() -> Vec<String> {
    ["\n\n", "\n", ".", " ", ""]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "chunking.chunk_size must be at least 1".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.separators.is_empty() {
            return Err(ConfigError::ValidationError(
                "chunking.separators cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            separators: default_separators(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

fn default_extensions() -> Vec<String> {
    vec!["txt".to_string(), "md".to_string(), "pdf".to_string()]
}

fn default_exclude_patterns() -> Vec<String> {
    vec!["**/.git/**".to_string(), "**/.docqa/**".to_string()]
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_recursive() -> bool {
    true
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            exclude_patterns: default_exclude_patterns(),
            max_file_size: default_max_file_size(),
            recursive: default_recursive(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default)]
    pub metric: DistanceMetric,

    #[serde(default = "default_auto_build")]
    pub auto_build: bool,

    #[serde(default)]
    pub default_format: OutputFormat,
}

fn default_top_k() -> u32 {
    DEFAULT_TOP_K
}

fn default_auto_build() -> bool {
    true
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            metric: DistanceMetric::default(),
            auto_build: default_auto_build(),
            default_format: OutputFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,

    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_retention_days() -> u32 {
    DEFAULT_METRICS_RETENTION_DAYS
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            retention_days: default_retention_days(),
            path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.embedding.model_id, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(config.embedding.dimension, DEFAULT_EMBEDDING_DIMENSION);
        assert_eq!(config.storage.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(config.search.top_k, DEFAULT_TOP_K);
        assert_eq!(config.search.metric, DistanceMetric::Cosine);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_separators() {
        let config = ChunkingConfig::default();
        assert_eq!(config.separators, vec!["\n\n", "\n", ".", " ", ""]);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let config = ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_empty_separators_rejected() {
        let config = ChunkingConfig {
            separators: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(
            Config::from_toml_str(
                r#"
                [chunking]
                separators = []
                "#
            )
            .is_err()
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
            [chunking]
            chunk_size = 500
            chunk_overlap = 50

            [embedding]
            provider = "hash"
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 50);
        assert_eq!(config.embedding.provider, EmbeddingProvider::Hash);
        assert_eq!(config.embedding.batch_size, 32);
        assert_eq!(config.search.top_k, DEFAULT_TOP_K);
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let result = Config::from_toml_str(
            r#"
            [search]
            top_k = 0
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_tables_overrides_nested_keys() {
        let mut base: toml::Table = toml::from_str(
            r#"
            [search]
            top_k = 3
            auto_build = false
            "#,
        )
        .unwrap();
        let overlay: toml::Table = toml::from_str(
            r#"
            [search]
            top_k = 7
            "#,
        )
        .unwrap();
        merge_tables(&mut base, overlay);

        let config: Config = toml::Value::Table(base).try_into().unwrap();
        assert_eq!(config.search.top_k, 7);
        assert!(!config.search.auto_build);
    }

    #[test]
    fn test_model_dir_from_model_id() {
        let config = Config::default();
        if let Some(dir) = config.model_dir() {
            assert!(dir.ends_with("sentence-transformers--all-MiniLM-L6-v2"));
        }
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(
            "ONNX".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::Onnx
        );
        assert_eq!(
            "hash".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::Hash
        );
        assert!("openai".parse::<EmbeddingProvider>().is_err());
    }
}
