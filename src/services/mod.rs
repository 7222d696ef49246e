mod builder;
mod chunker;
pub mod embedding;
mod knowledge_base;
mod metrics;
mod resolver;
pub mod vector_index;

pub use builder::{BuildOptions, BuildReport, BuildStats, IndexBuilder};
pub use chunker::TextChunker;
pub use embedding::{Embedder, HashEmbedder, OnnxEmbedder, SharedEmbedder, create_embedder};
pub use knowledge_base::{IndexOrigin, KnowledgeBase};
pub use metrics::{MetricsStore, MetricsSummary, QueryOutcome};
pub use resolver::QueryResolver;
pub use vector_index::{IndexManifest, SharedIndex, VectorIndex};
