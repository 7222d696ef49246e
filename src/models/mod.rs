mod config;
mod document;
mod search;

pub use config::{
    ChunkingConfig, Config, DEFAULT_DATA_DIR, DEFAULT_EMBEDDING_DIMENSION,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_INDEX_DIR, DEFAULT_METRICS_RETENTION_DAYS, DEFAULT_TOP_K,
    EmbeddingConfig, EmbeddingProvider, LoaderConfig, MetricsConfig, ResolvedConfig,
    SearchConfig, StorageConfig,
};
pub use document::{Chunk, Document, IndexEntry, Metadata, SOURCE_KEY};
pub use search::{
    Answer, DistanceMetric, NoAnswerReason, OutputFormat, QueryResult, ScoredEntry,
};
