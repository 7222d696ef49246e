//! In-memory vector index with on-disk persistence.
//!
//! Entries are kept in insertion order and searched by linear scan. Callers
//! only see `query`, so the scan can be swapped for an approximate structure
//! without touching them.

mod shared;
mod storage;

pub use shared::SharedIndex;
pub use storage::{FORMAT_VERSION, IndexManifest};

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::IndexError;
use crate::models::{DistanceMetric, IndexEntry, QueryResult, ScoredEntry};

#[derive(Debug, Clone)]
pub struct VectorIndex {
    model_id: String,
    metric: DistanceMetric,
    dimension: usize,
    entries: Vec<IndexEntry>,
    built_at: DateTime<Utc>,
}

impl VectorIndex {
    /// An empty index. The dimension is taken from the embedder so that an
    /// index with no entries still records what it expects.
    pub fn new(model_id: impl Into<String>, dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            model_id: model_id.into(),
            metric,
            dimension,
            entries: Vec::new(),
            built_at: Utc::now(),
        }
    }

    pub fn from_entries(
        model_id: impl Into<String>,
        dimension: usize,
        metric: DistanceMetric,
        entries: Vec<IndexEntry>,
    ) -> Result<Self, IndexError> {
        let mut index = Self::new(model_id, dimension, metric);
        index.build(entries)?;
        Ok(index)
    }

    /// Replace all entries.
    pub fn build(&mut self, entries: Vec<IndexEntry>) -> Result<(), IndexError> {
        for (i, entry) in entries.iter().enumerate() {
            if entry.vector.is_empty() {
                return Err(IndexError::Build(format!("entry {i} has an empty vector")));
            }
            if entry.vector.len() != self.dimension {
                return Err(IndexError::Build(format!(
                    "entry {i} has dimension {}, index expects {}",
                    entry.vector.len(),
                    self.dimension
                )));
            }
            if entry.vector.iter().any(|x| !x.is_finite()) {
                return Err(IndexError::Build(format!(
                    "entry {i} contains non-finite values"
                )));
            }
        }

        self.entries = entries;
        self.built_at = Utc::now();
        Ok(())
    }

    /// The `k` entries nearest to `vector`, nearest first.
    ///
    /// Equal distances keep insertion order. `k` larger than the index is
    /// clamped; `k == 0` yields an empty result.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<QueryResult, IndexError> {
        if self.entries.is_empty() {
            return Err(IndexError::Empty);
        }
        if vector.len() != self.dimension {
            return Err(IndexError::QueryDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let k = k.min(self.entries.len());
        if k == 0 {
            return Ok(QueryResult::default());
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, self.metric.distance(vector, &entry.vector)))
            .collect();
        // sort_by is stable, so ties stay in insertion order
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));

        let entries = scored
            .into_iter()
            .take(k)
            .map(|(i, distance)| {
                let entry = &self.entries[i];
                ScoredEntry {
                    text: entry.text.clone(),
                    metadata: entry.metadata.clone(),
                    distance,
                }
            })
            .collect();

        Ok(QueryResult::new(entries))
    }

    /// Fail when this index was built with a different model or metric.
    pub fn check_compatible(
        &self,
        model_id: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<(), IndexError> {
        if self.model_id != model_id {
            return Err(IndexError::Incompatible(format!(
                "built with model '{}', configured model is '{}'",
                self.model_id, model_id
            )));
        }
        if self.dimension != dimension {
            return Err(IndexError::Incompatible(format!(
                "built with dimension {}, embedder produces {}",
                self.dimension, dimension
            )));
        }
        if self.metric != metric {
            return Err(IndexError::Incompatible(format!(
                "built with {} distance, configured metric is {}",
                self.metric, metric
            )));
        }
        Ok(())
    }

    pub fn persist(&self, location: &Path) -> Result<(), IndexError> {
        storage::persist(self, location)
    }

    pub fn load(location: &Path) -> Result<Self, IndexError> {
        storage::load(location)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}
