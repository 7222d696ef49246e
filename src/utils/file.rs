//! File utilities for document loading.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Calculate SHA-256 checksum of content.
pub fn calculate_checksum(content: &str) -> String {
    let hash = Sha256::digest(content.as_bytes());
    hex::encode(hash)
}

/// Lowercased extension of a path, without the dot.
pub fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// MIME type recorded in document metadata.
pub fn content_type(extension: &str) -> &'static str {
    match extension {
        "md" | "markdown" => "text/markdown",
        "pdf" => "application/pdf",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        _ => "text/plain",
    }
}

/// Fail early on files over the size limit.
pub fn check_file_size(path: &Path, max_size: u64) -> std::io::Result<u64> {
    let metadata = fs::metadata(path)?;

    if metadata.len() > max_size {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "file exceeds maximum size: {} > {}",
                metadata.len(),
                max_size
            ),
        ));
    }

    Ok(metadata.len())
}

/// Read file content with size limit.
///
/// Invalid UTF-8 is replaced rather than rejected so that a stray byte does
/// not drop a whole document.
pub fn read_file_content(path: &Path, max_size: u64) -> std::io::Result<String> {
    check_file_size(path, max_size)?;
    let bytes = fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// Get the relative path from a base directory.
pub fn get_relative_path(base: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(base)
        .ok()
        .map(|p| p.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_calculate_checksum() {
        let checksum = calculate_checksum("hello world");
        assert_eq!(checksum.len(), 64); // SHA-256 produces 64 hex chars
        assert_eq!(checksum, calculate_checksum("hello world"));
        assert_ne!(checksum, calculate_checksum("hello world!"));
    }

    #[test]
    fn test_file_extension_lowercased() {
        assert_eq!(
            file_extension(&PathBuf::from("Policy.TXT")),
            Some("txt".to_string())
        );
        assert_eq!(file_extension(&PathBuf::from("README")), None);
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type("txt"), "text/plain");
        assert_eq!(content_type("md"), "text/markdown");
        assert_eq!(content_type("pdf"), "application/pdf");
    }

    #[test]
    fn test_read_file_content_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        fs::write(&path, "x".repeat(100)).unwrap();

        assert!(read_file_content(&path, 10).is_err());
        assert_eq!(read_file_content(&path, 100).unwrap().len(), 100);
    }

    #[test]
    fn test_read_file_content_lossy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.txt");
        fs::write(&path, [b'c', b'a', b'f', 0xe9]).unwrap();

        let content = read_file_content(&path, 1024).unwrap();
        assert!(content.starts_with("caf"));
    }

    #[test]
    fn test_get_relative_path() {
        let base = PathBuf::from("/data");
        let path = PathBuf::from("/data/hr/leave.txt");
        assert_eq!(
            get_relative_path(&base, &path),
            Some("hr/leave.txt".to_string())
        );
        assert_eq!(get_relative_path(&base, &PathBuf::from("/other")), None);
    }
}
