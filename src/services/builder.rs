//! Full index builds: load, chunk, embed, index, persist.

use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use super::chunker::TextChunker;
use super::embedding::{SharedEmbedder, embed_in_batches};
use super::vector_index::VectorIndex;
use crate::error::{BuildError, ConfigError};
use crate::models::{Config, DistanceMetric, IndexEntry};
use crate::sources::DocumentSource;
use crate::utils::text::is_blank;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Where the finished index is persisted
    pub index_dir: PathBuf,
    pub metric: DistanceMetric,
    /// Texts per embedder call
    pub batch_size: usize,
}

impl BuildOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            index_dir: config.storage.index_dir.clone(),
            metric: config.search.metric,
            batch_size: config.embedding.batch_size as usize,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildStats {
    pub documents: u64,
    /// Documents that produced no chunks at all
    pub empty_documents: u64,
    pub chunks: u64,
    /// Whitespace-only chunks left out of the index
    pub skipped_chunks: u64,
    pub duration_ms: u64,
}

#[derive(Debug)]
pub struct BuildReport {
    pub index: VectorIndex,
    pub stats: BuildStats,
}

pub struct IndexBuilder {
    chunker: TextChunker,
    embedder: SharedEmbedder,
    options: BuildOptions,
}

impl IndexBuilder {
    pub fn new(chunker: TextChunker, embedder: SharedEmbedder, options: BuildOptions) -> Self {
        Self {
            chunker,
            embedder,
            options,
        }
    }

    pub fn from_config(config: &Config, embedder: SharedEmbedder) -> Result<Self, ConfigError> {
        Ok(Self::new(
            TextChunker::from_config(&config.chunking)?,
            embedder,
            BuildOptions::from_config(config),
        ))
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Build a fresh index from everything `source` holds and persist it.
    ///
    /// A source with no documents still produces (and persists) an empty
    /// index. Nothing is written unless every stage succeeds.
    pub fn build(&self, source: &dyn DocumentSource) -> Result<BuildReport, BuildError> {
        let start_time = Instant::now();
        let mut stats = BuildStats::default();

        info!(source = %source.describe(), "loading documents");
        let documents = source.load()?;
        stats.documents = documents.len() as u64;

        let mut chunks = Vec::new();
        for document in &documents {
            let split = self.chunker.split(document);
            if split.is_empty() {
                stats.empty_documents += 1;
                continue;
            }
            for chunk in split {
                if is_blank(&chunk.content) {
                    stats.skipped_chunks += 1;
                    continue;
                }
                chunks.push(chunk);
            }
        }
        stats.chunks = chunks.len() as u64;
        info!(
            documents = stats.documents,
            chunks = stats.chunks,
            "documents chunked"
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = embed_in_batches(self.embedder.as_ref(), &texts, self.options.batch_size)?;
        if vectors.len() != chunks.len() {
            return Err(BuildError::VectorCount {
                expected: chunks.len(),
                actual: vectors.len(),
            });
        }
        debug!(vectors = vectors.len(), "chunks embedded");

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry::from_chunk(chunk, vector))
            .collect();

        let index = VectorIndex::from_entries(
            self.embedder.model_id(),
            self.embedder.dimension(),
            self.options.metric,
            entries,
        )?;
        index.persist(&self.options.index_dir)?;

        stats.duration_ms = start_time.elapsed().as_millis() as u64;
        info!(
            entries = index.len(),
            location = %self.options.index_dir.display(),
            duration_ms = stats.duration_ms,
            "index built"
        );

        Ok(BuildReport { index, stats })
    }
}
