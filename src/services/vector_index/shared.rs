use std::sync::{Arc, RwLock};

use super::VectorIndex;

/// Handle to the currently served index.
///
/// Readers take a snapshot and query it without holding the lock, so a
/// rebuild that swaps in a new index never disturbs a query in flight.
#[derive(Debug, Clone, Default)]
pub struct SharedIndex {
    inner: Arc<RwLock<Option<Arc<VectorIndex>>>>,
}

impl SharedIndex {
    pub fn new(index: Option<VectorIndex>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(index.map(Arc::new))),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The current index, if any.
    pub fn snapshot(&self) -> Option<Arc<VectorIndex>> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Publish a new index, returning the one it replaced.
    pub fn replace(&self, index: VectorIndex) -> Option<Arc<VectorIndex>> {
        let next = Some(Arc::new(index));
        match self.inner.write() {
            Ok(mut guard) => std::mem::replace(&mut *guard, next),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), next),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DistanceMetric, IndexEntry, Metadata};

    fn index_with(text: &str) -> VectorIndex {
        VectorIndex::from_entries(
            "test-model",
            2,
            DistanceMetric::Cosine,
            vec![IndexEntry::new(vec![1.0, 0.0], text, Metadata::new())],
        )
        .unwrap()
    }

    #[test]
    fn test_empty_handle() {
        let shared = SharedIndex::empty();
        assert!(shared.snapshot().is_none());
        assert!(!shared.is_loaded());
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let shared = SharedIndex::new(Some(index_with("old")));
        let before = shared.snapshot().unwrap();

        let replaced = shared.replace(index_with("new"));
        assert_eq!(replaced.unwrap().entries()[0].text, "old");

        // the earlier snapshot still answers from the old index
        let old = before.query(&[1.0, 0.0], 1).unwrap();
        assert_eq!(old.best().unwrap().text, "old");

        let current = shared.snapshot().unwrap();
        assert_eq!(current.entries()[0].text, "new");
    }

    #[test]
    fn test_clones_share_state() {
        let shared = SharedIndex::empty();
        let other = shared.clone();
        shared.replace(index_with("x"));
        assert!(other.is_loaded());
    }
}
