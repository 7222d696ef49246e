use std::path::Path;

use anyhow::Result;

use super::load_config;
use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{EmbeddingProvider, OutputFormat};
use crate::services::{IndexManifest, MetricsStore, VectorIndex};

pub async fn handle_status(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = load_config(None, None)?;
    let formatter = get_formatter(format);

    let (index, index_error) = inspect_index(&config.storage.index_dir);

    let retention_days = config.metrics.retention_days;
    let metrics = if config.metrics.enabled {
        config
            .metrics_path()
            .filter(|p| p.exists())
            .and_then(|p| MetricsStore::open(&p).ok())
            .map(|store| {
                store.cleanup(retention_days);
                store.get_summary(retention_days)
            })
    } else {
        None
    };

    let stale = index.as_ref().is_some_and(|m| {
        m.metric != config.search.metric
            || m.dimension != config.embedding.dimension as usize
            || (config.embedding.provider == EmbeddingProvider::Onnx
                && m.model_id != config.embedding.model_id)
    });

    let status = StatusInfo {
        data_dir: config.storage.data_dir.display().to_string(),
        index_dir: config.storage.index_dir.display().to_string(),
        embedding_provider: config.embedding.provider.to_string(),
        embedding_model: config.embedding.model_id.clone(),
        index,
        index_error,
        metrics,
    };

    print!("{}", formatter.format_status(&status));

    if status.index.is_none() {
        eprintln!();
        eprintln!("Hint: no index yet. Build one with: docqa index");
    } else if stale {
        eprintln!();
        eprintln!(
            "Hint: index was built with other embedding settings; it will be rebuilt on the next query."
        );
    }

    Ok(())
}

/// Manifest of a usable index, or why there is none. The whole bundle is
/// loaded so a damaged vector or docstore file is not reported as ready.
fn inspect_index(index_dir: &Path) -> (Option<IndexManifest>, Option<String>) {
    match VectorIndex::load(index_dir).and_then(|_| IndexManifest::read(index_dir)) {
        Ok(manifest) => (Some(manifest), None),
        Err(e) => (None, Some(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DistanceMetric, IndexEntry, Metadata};
    use std::fs;

    fn persist_sample(location: &Path) {
        VectorIndex::from_entries(
            "hash-2",
            2,
            DistanceMetric::Cosine,
            vec![IndexEntry::new(vec![1.0, 0.0], "Annual leave", Metadata::new())],
        )
        .unwrap()
        .persist(location)
        .unwrap();
    }

    #[test]
    fn test_inspect_ready_index() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("index");
        persist_sample(&location);

        let (manifest, error) = inspect_index(&location);
        assert_eq!(manifest.unwrap().count, 1);
        assert!(error.is_none());
    }

    #[test]
    fn test_inspect_damaged_vectors_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("index");
        persist_sample(&location);
        fs::write(location.join("vectors.bin"), b"garbage").unwrap();

        let (manifest, error) = inspect_index(&location);
        assert!(manifest.is_none());
        assert!(error.unwrap().contains("corrupt"));
    }

    #[test]
    fn test_inspect_missing_index() {
        let dir = tempfile::tempdir().unwrap();
        let (manifest, error) = inspect_index(&dir.path().join("index"));
        assert!(manifest.is_none());
        assert!(error.unwrap().contains("no index found"));
    }
}
