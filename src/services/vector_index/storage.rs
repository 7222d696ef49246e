//! On-disk layout of a persisted index.
//!
//! ```text
//! <location>/
//!   manifest.json    model, metric, dimension, count, checksum
//!   vectors.bin      magic, u32 dimension, u64 count, little-endian f32 data
//!   docstore.jsonl   one {"text", "metadata"} record per entry, same order
//! ```
//!
//! A new index is written into a staging directory beside `location` and
//! renamed into place, so a failed persist leaves the previous index intact.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::VectorIndex;
use crate::error::IndexError;
use crate::models::{DistanceMetric, IndexEntry, Metadata};

pub const FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "manifest.json";
const VECTORS_FILE: &str = "vectors.bin";
const DOCSTORE_FILE: &str = "docstore.jsonl";
const VECTORS_MAGIC: &[u8; 8] = b"DOCQAVEC";
const HEADER_LEN: usize = 8 + 4 + 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub model_id: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub count: usize,
    pub built_at: DateTime<Utc>,
    pub vectors_sha256: String,
}

impl IndexManifest {
    /// Read only the manifest of a persisted index.
    pub fn read(location: &Path) -> Result<Self, IndexError> {
        let path = location.join(MANIFEST_FILE);
        if !path.exists() {
            return Err(IndexError::NotFound(location.to_path_buf()));
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| IndexError::corrupt(&path, format!("unreadable manifest: {e}")))?;
        serde_json::from_str(&content)
            .map_err(|e| IndexError::corrupt(&path, format!("invalid manifest: {e}")))
    }
}

#[derive(Serialize, Deserialize)]
struct DocRecord {
    text: String,
    #[serde(default)]
    metadata: Metadata,
}

pub(super) fn persist(index: &VectorIndex, location: &Path) -> Result<(), IndexError> {
    let parent = match location.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let staging = tempfile::Builder::new()
        .prefix(".docqa-index-")
        .tempdir_in(&parent)?;

    let vectors = encode_vectors(index);
    let checksum = hex::encode(Sha256::digest(&vectors));
    write_synced(&staging.path().join(VECTORS_FILE), &vectors)?;

    let docstore_path = staging.path().join(DOCSTORE_FILE);
    let mut writer = BufWriter::new(File::create(&docstore_path)?);
    for entry in &index.entries {
        let record = DocRecord {
            text: entry.text.clone(),
            metadata: entry.metadata.clone(),
        };
        serde_json::to_writer(&mut writer, &record)
            .map_err(|e| IndexError::Build(format!("failed to encode docstore: {e}")))?;
        writer.write_all(b"\n")?;
    }
    let file = writer
        .into_inner()
        .map_err(|e| IndexError::Io(e.into_error()))?;
    file.sync_all()?;

    let manifest = IndexManifest {
        format_version: FORMAT_VERSION,
        model_id: index.model_id.clone(),
        dimension: index.dimension,
        metric: index.metric,
        count: index.entries.len(),
        built_at: index.built_at,
        vectors_sha256: checksum,
    };
    let manifest_json = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| IndexError::Build(format!("failed to encode manifest: {e}")))?;
    // Manifest last: a directory without one is never mistaken for an index.
    write_synced(&staging.path().join(MANIFEST_FILE), &manifest_json)?;

    let staged = staging.keep();
    if let Err(e) = swap_into_place(&staged, location) {
        let _ = fs::remove_dir_all(&staged);
        return Err(e);
    }
    sync_dir(&parent);

    debug!(
        location = %location.display(),
        entries = manifest.count,
        "index persisted"
    );
    Ok(())
}

fn swap_into_place(staged: &Path, location: &Path) -> Result<(), IndexError> {
    if !location.exists() {
        fs::rename(staged, location)?;
        return Ok(());
    }

    let backup = backup_path(location);
    if backup.exists() {
        fs::remove_dir_all(&backup)?;
    }
    fs::rename(location, &backup)?;

    if let Err(e) = fs::rename(staged, location) {
        fs::rename(&backup, location)?;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_dir_all(&backup) {
        warn!(path = %backup.display(), error = %e, "failed to remove previous index");
    }
    Ok(())
}

fn backup_path(location: &Path) -> PathBuf {
    let name = location
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index".to_string());
    location.with_file_name(format!(".{name}.previous"))
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), IndexError> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

fn encode_vectors(index: &VectorIndex) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + index.entries.len() * index.dimension * 4);
    bytes.extend_from_slice(VECTORS_MAGIC);
    bytes.extend_from_slice(&(index.dimension as u32).to_le_bytes());
    bytes.extend_from_slice(&(index.entries.len() as u64).to_le_bytes());
    for entry in &index.entries {
        for value in &entry.vector {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    bytes
}

fn decode_vectors(
    path: &Path,
    bytes: &[u8],
    dimension: usize,
    count: usize,
) -> Result<Vec<Vec<f32>>, IndexError> {
    if bytes.len() < HEADER_LEN || &bytes[..8] != VECTORS_MAGIC {
        return Err(IndexError::corrupt(path, "missing vector file header"));
    }

    let mut dim_bytes = [0u8; 4];
    dim_bytes.copy_from_slice(&bytes[8..12]);
    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&bytes[12..20]);
    let header_dim = u32::from_le_bytes(dim_bytes) as usize;
    let header_count = u64::from_le_bytes(count_bytes) as usize;

    if header_dim != dimension || header_count != count {
        return Err(IndexError::corrupt(
            path,
            format!(
                "vector file holds {header_count}x{header_dim}, manifest says {count}x{dimension}"
            ),
        ));
    }

    let expected_len = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| {
            IndexError::corrupt(path, format!("vector size {count}x{dimension} overflows"))
        })?;
    let data = &bytes[HEADER_LEN..];
    if data.len() != expected_len {
        return Err(IndexError::corrupt(
            path,
            format!(
                "vector data is {} bytes, expected {expected_len}",
                data.len()
            ),
        ));
    }

    let values: Vec<f32> = data
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok(values
        .chunks(dimension.max(1))
        .take(count)
        .map(<[f32]>::to_vec)
        .collect())
}

pub(super) fn load(location: &Path) -> Result<VectorIndex, IndexError> {
    if !location.is_dir() {
        restore_backup(location)?;
    }
    let manifest = IndexManifest::read(location)?;

    if manifest.format_version != FORMAT_VERSION {
        return Err(IndexError::Incompatible(format!(
            "index format version {} is not supported (expected {})",
            manifest.format_version, FORMAT_VERSION
        )));
    }
    if manifest.dimension == 0 && manifest.count > 0 {
        return Err(IndexError::corrupt(
            location.join(MANIFEST_FILE),
            format!("{} entries with dimension 0", manifest.count),
        ));
    }

    let vectors_path = location.join(VECTORS_FILE);
    let bytes = fs::read(&vectors_path)
        .map_err(|e| IndexError::corrupt(&vectors_path, format!("unreadable: {e}")))?;
    let checksum = hex::encode(Sha256::digest(&bytes));
    if checksum != manifest.vectors_sha256 {
        return Err(IndexError::corrupt(&vectors_path, "checksum mismatch"));
    }
    let vectors = decode_vectors(&vectors_path, &bytes, manifest.dimension, manifest.count)?;

    let docstore_path = location.join(DOCSTORE_FILE);
    let file = File::open(&docstore_path)
        .map_err(|e| IndexError::corrupt(&docstore_path, format!("unreadable: {e}")))?;
    let mut records = Vec::with_capacity(manifest.count);
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| IndexError::corrupt(&docstore_path, e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: DocRecord = serde_json::from_str(&line).map_err(|e| {
            IndexError::corrupt(&docstore_path, format!("line {}: {e}", line_no + 1))
        })?;
        records.push(record);
    }

    if records.len() != manifest.count {
        return Err(IndexError::corrupt(
            &docstore_path,
            format!(
                "{} records, manifest says {}",
                records.len(),
                manifest.count
            ),
        ));
    }

    let entries = vectors
        .into_iter()
        .zip(records)
        .map(|(vector, record)| IndexEntry::new(vector, record.text, record.metadata))
        .collect();

    // Stored entries pass the same checks as freshly built ones.
    let mut index = VectorIndex::new(manifest.model_id, manifest.dimension, manifest.metric);
    index.build(entries).map_err(|e| match e {
        IndexError::Build(reason) => IndexError::corrupt(&vectors_path, reason),
        other => other,
    })?;
    index.built_at = manifest.built_at;
    Ok(index)
}

/// Put back an index left in the backup slot by a swap that was cut short.
fn restore_backup(location: &Path) -> Result<(), IndexError> {
    let backup = backup_path(location);
    if location.exists() || !backup.join(MANIFEST_FILE).is_file() {
        return Err(IndexError::NotFound(location.to_path_buf()));
    }
    warn!(
        location = %location.display(),
        backup = %backup.display(),
        "restoring index from interrupted replace"
    );
    fs::rename(&backup, location)?;
    Ok(())
}
