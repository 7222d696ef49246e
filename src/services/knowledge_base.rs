//! Startup and rebuild glue around the index, the builder and the resolver.

use serde::Serialize;
use tracing::{error, info, warn};

use super::builder::{BuildStats, IndexBuilder};
use super::embedding::SharedEmbedder;
use super::resolver::QueryResolver;
use super::vector_index::{SharedIndex, VectorIndex};
use crate::error::{BuildError, IndexError, QueryError};
use crate::models::{Answer, Config};
use crate::sources::DirectoryLoader;

/// How the served index came to be when the knowledge base was opened.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum IndexOrigin {
    /// Read from disk
    Loaded,
    /// Built at startup because no usable index was on disk
    Built { stats: BuildStats },
    /// No usable index and automatic builds are off
    Missing,
}

pub struct KnowledgeBase {
    config: Config,
    embedder: SharedEmbedder,
    index: SharedIndex,
    resolver: QueryResolver,
    origin: IndexOrigin,
}

impl KnowledgeBase {
    /// Load the persisted index, building a fresh one when it is missing,
    /// stale or corrupt and `search.auto_build` is set.
    pub fn open(config: Config, embedder: SharedEmbedder) -> Result<Self, BuildError> {
        let index_dir = config.storage.index_dir.clone();
        let loaded = VectorIndex::load(&index_dir).and_then(|index| {
            index.check_compatible(
                embedder.model_id(),
                embedder.dimension(),
                config.search.metric,
            )?;
            Ok(index)
        });

        let index = match loaded {
            Ok(index) => {
                info!(
                    location = %index_dir.display(),
                    entries = index.len(),
                    "index loaded"
                );
                Some(index)
            }
            Err(e) if e.calls_for_rebuild() => {
                match &e {
                    IndexError::NotFound(_) => info!("{e}"),
                    IndexError::Corrupt { .. } => error!("{e}"),
                    _ => warn!("{e}"),
                }
                None
            }
            Err(e) => return Err(e.into()),
        };

        let shared = SharedIndex::new(index);
        let top_k = config.search.top_k as usize;
        let mut kb = Self {
            resolver: QueryResolver::new(embedder.clone(), shared.clone(), top_k),
            config,
            embedder,
            index: shared,
            origin: IndexOrigin::Loaded,
        };

        if !kb.index.is_loaded() {
            kb.origin = if kb.config.search.auto_build {
                info!("building index at startup");
                IndexOrigin::Built {
                    stats: kb.rebuild()?,
                }
            } else {
                warn!("no usable index and auto_build is off");
                IndexOrigin::Missing
            };
        }

        Ok(kb)
    }

    /// Build a new index from the data directory, persist it, then swap it
    /// in. Queries already running keep the index they started with.
    pub fn rebuild(&self) -> Result<BuildStats, BuildError> {
        let source = DirectoryLoader::new(&self.config.storage.data_dir, &self.config.loader)?;
        let builder = IndexBuilder::from_config(&self.config, self.embedder.clone())?;
        let report = builder.build(&source)?;
        self.index.replace(report.index);
        Ok(report.stats)
    }

    pub fn answer(&self, question: &str) -> Result<Answer, QueryError> {
        self.resolver.answer(question)
    }

    pub fn answer_with_k(&self, question: &str, k: usize) -> Result<Answer, QueryError> {
        self.resolver.answer_with_k(question, k)
    }

    pub fn index(&self) -> &SharedIndex {
        &self.index
    }

    pub fn origin(&self) -> &IndexOrigin {
        &self.origin
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DistanceMetric, EmbeddingProvider, NoAnswerReason};
    use crate::services::embedding::HashEmbedder;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    fn test_config(root: &Path) -> Config {
        let mut config = Config::default();
        config.storage.data_dir = root.join("data");
        config.storage.index_dir = root.join("index");
        config.embedding.provider = EmbeddingProvider::Hash;
        config.embedding.dimension = 64;
        config
    }

    fn embedder() -> SharedEmbedder {
        Arc::new(HashEmbedder::new(64))
    }

    #[test]
    fn test_open_builds_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        fs::create_dir_all(&config.storage.data_dir).unwrap();
        fs::write(
            config.storage.data_dir.join("leave.txt"),
            "Annual leave is 20 days per year.",
        )
        .unwrap();

        let kb = KnowledgeBase::open(config.clone(), embedder()).unwrap();
        assert!(matches!(kb.origin(), IndexOrigin::Built { .. }));
        assert!(config.storage.index_dir.join("manifest.json").exists());

        let answer = kb.answer("annual leave").unwrap();
        assert!(answer.is_found());

        let reopened = KnowledgeBase::open(config, embedder()).unwrap();
        assert!(matches!(reopened.origin(), IndexOrigin::Loaded));
    }

    #[test]
    fn test_empty_data_dir_gives_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let kb = KnowledgeBase::open(test_config(dir.path()), embedder()).unwrap();

        assert_eq!(kb.index().snapshot().unwrap().len(), 0);
        let answer = kb.answer("anything").unwrap();
        assert!(matches!(
            answer,
            Answer::NoAnswer {
                reason: NoAnswerReason::EmptyIndex,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_index_without_auto_build() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.search.auto_build = false;

        let kb = KnowledgeBase::open(config, embedder()).unwrap();
        assert!(matches!(kb.origin(), IndexOrigin::Missing));
        let answer = kb.answer("anything").unwrap();
        assert!(matches!(
            answer,
            Answer::NoAnswer {
                reason: NoAnswerReason::MissingIndex,
                ..
            }
        ));
    }

    #[test]
    fn test_metric_change_triggers_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        KnowledgeBase::open(config.clone(), embedder()).unwrap();

        let mut changed = config;
        changed.search.metric = DistanceMetric::Euclidean;
        let kb = KnowledgeBase::open(changed, embedder()).unwrap();
        assert!(matches!(kb.origin(), IndexOrigin::Built { .. }));
        assert_eq!(
            kb.index().snapshot().unwrap().metric(),
            DistanceMetric::Euclidean
        );
    }

    #[test]
    fn test_corrupt_index_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        KnowledgeBase::open(config.clone(), embedder()).unwrap();
        fs::write(config.storage.index_dir.join("vectors.bin"), b"garbage").unwrap();

        let kb = KnowledgeBase::open(config, embedder()).unwrap();
        assert!(matches!(kb.origin(), IndexOrigin::Built { .. }));
    }

    #[test]
    fn test_rebuild_swaps_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let kb = KnowledgeBase::open(config.clone(), embedder()).unwrap();
        let before = kb.index().snapshot().unwrap();
        assert!(before.is_empty());

        fs::create_dir_all(&config.storage.data_dir).unwrap();
        fs::write(
            config.storage.data_dir.join("sick.txt"),
            "Sick leave is ten days.",
        )
        .unwrap();
        let stats = kb.rebuild().unwrap();

        assert_eq!(stats.documents, 1);
        assert!(before.is_empty());
        assert_eq!(kb.index().snapshot().unwrap().len(), 1);
    }
}
