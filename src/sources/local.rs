//! Local file system document source.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use super::DocumentSource;
use crate::error::SourceError;
use crate::models::{Document, LoaderConfig};
use crate::utils::file::{
    calculate_checksum, check_file_size, content_type, file_extension, get_relative_path,
    read_file_content,
};

/// Loads every matching file under a directory as one document.
#[derive(Debug)]
pub struct DirectoryLoader {
    /// Root path to scan
    root: PathBuf,

    /// Lowercased extensions to keep, without the dot
    extensions: Vec<String>,

    /// Patterns to exclude
    exclude_patterns: Vec<glob::Pattern>,

    /// Maximum file size
    max_file_size: u64,

    recursive: bool,
}

impl DirectoryLoader {
    pub fn new(root: impl Into<PathBuf>, config: &LoaderConfig) -> Result<Self, SourceError> {
        let exclude_patterns = config
            .exclude_patterns
            .iter()
            .map(|pattern| {
                glob::Pattern::new(pattern).map_err(|e| SourceError::PatternError {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            root: root.into(),
            extensions: config
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns,
            max_file_size: config.max_file_size,
            recursive: config.recursive,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Collect all indexable files, sorted by path.
    pub fn collect_files(&self) -> Result<Vec<PathBuf>, SourceError> {
        let mut files = Vec::new();

        if !self.root.exists() {
            warn!(root = %self.root.display(), "data directory does not exist");
            return Ok(files);
        }

        if self.root.is_file() {
            if self.accepts(&self.root) {
                files.push(self.root.clone());
            }
            return Ok(files);
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .max_depth(max_depth)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(SourceError::WalkError(e.to_string())),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            let path = entry.path();
            if entry.file_type().is_file() && self.accepts(path) {
                files.push(path.to_path_buf());
            }
        }

        Ok(files)
    }

    fn accepts(&self, path: &Path) -> bool {
        let Some(ext) = file_extension(path) else {
            return false;
        };
        if !self.extensions.iter().any(|allowed| *allowed == ext) {
            return false;
        }
        !self.is_excluded(path)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let relative = get_relative_path(&self.root, path);
        self.exclude_patterns.iter().any(|pattern| {
            pattern.matches_path(path)
                || relative
                    .as_deref()
                    .is_some_and(|rel| pattern.matches(rel))
        })
    }

    /// Read a file and create a Document.
    pub fn read_document(&self, path: &Path) -> Result<Document, SourceError> {
        let extension = file_extension(path).unwrap_or_default();
        let read_error = |reason: String| SourceError::ReadError {
            path: path.to_path_buf(),
            reason,
        };

        let content = if extension == "pdf" {
            check_file_size(path, self.max_file_size).map_err(|e| read_error(e.to_string()))?;
            extract_pdf_text(path)?
        } else {
            read_file_content(path, self.max_file_size).map_err(|e| read_error(e.to_string()))?
        };

        let mut document = Document::new(content, path.to_string_lossy())
            .with_metadata("content_type", content_type(&extension))
            .with_metadata("extension", extension.clone());
        if let Some(name) = path.file_name() {
            document = document.with_metadata("filename", name.to_string_lossy());
        }
        let checksum = calculate_checksum(&document.content);
        Ok(document.with_metadata("checksum", checksum))
    }
}

impl DocumentSource for DirectoryLoader {
    fn load(&self) -> Result<Vec<Document>, SourceError> {
        let files = self.collect_files()?;
        let mut documents = Vec::with_capacity(files.len());

        for path in files {
            match self.read_document(&path) {
                Ok(document) => {
                    debug!(path = %path.display(), bytes = document.content.len(), "loaded document");
                    documents.push(document);
                }
                Err(e) => warn!(error = %e, "skipping file"),
            }
        }

        Ok(documents)
    }

    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }
}

#[cfg(feature = "pdf")]
fn extract_pdf_text(path: &Path) -> Result<String, SourceError> {
    pdf_extract::extract_text(path).map_err(|e| SourceError::ReadError {
        path: path.to_path_buf(),
        reason: format!("PDF extraction failed: {e}"),
    })
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf_text(path: &Path) -> Result<String, SourceError> {
    Err(SourceError::ReadError {
        path: path.to_path_buf(),
        reason: "PDF support is not compiled in (enable the `pdf` feature)".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn loader(root: &Path) -> DirectoryLoader {
        DirectoryLoader::new(root, &LoaderConfig::default()).unwrap()
    }

    #[test]
    fn test_missing_directory_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let docs = loader(&dir.path().join("absent")).load().unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn test_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "leave.txt", "Annual leave is 20 days.");
        write(dir.path(), "notes.md", "# Notes");
        write(dir.path(), "image.png", "not really a png");
        write(dir.path(), "script.rs", "fn main() {}");

        let docs = loader(dir.path()).load().unwrap();
        let names: Vec<&str> = docs
            .iter()
            .map(|d| d.metadata["filename"].as_str())
            .collect();
        assert_eq!(names, vec!["leave.txt", "notes.md"]);
    }

    #[test]
    fn test_metadata_fields() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Policy.TXT", "Sick leave is 10 days.");

        let docs = loader(dir.path()).load().unwrap();
        assert_eq!(docs.len(), 1);
        let doc = &docs[0];
        assert!(doc.source().unwrap().ends_with("Policy.TXT"));
        assert_eq!(doc.metadata["extension"], "txt");
        assert_eq!(doc.metadata["content_type"], "text/plain");
        assert_eq!(doc.metadata["checksum"].len(), 64);
    }

    #[test]
    fn test_recursive_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.txt", "b");
        write(dir.path(), "a.txt", "a");
        write(dir.path(), "sub/c.txt", "c");

        let files = loader(dir.path()).collect_files().unwrap();
        let rel: Vec<String> = files
            .iter()
            .map(|p| get_relative_path(dir.path(), p).unwrap())
            .collect();
        assert_eq!(rel, vec!["a.txt", "b.txt", "sub/c.txt"]);

        let flat = DirectoryLoader::new(
            dir.path(),
            &LoaderConfig {
                recursive: false,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(flat.collect_files().unwrap().len(), 2);
    }

    #[test]
    fn test_exclude_patterns() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "keep.txt", "keep");
        write(dir.path(), "drafts/skip.txt", "skip");
        write(dir.path(), ".git/config.txt", "git");

        let config = LoaderConfig {
            exclude_patterns: vec!["drafts/*".to_string(), "**/.git/**".to_string()],
            ..Default::default()
        };
        let files = DirectoryLoader::new(dir.path(), &config)
            .unwrap()
            .collect_files()
            .unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep.txt"));
    }

    #[test]
    fn test_oversized_file_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "small.txt", "small");
        write(dir.path(), "large.txt", &"x".repeat(2048));

        let config = LoaderConfig {
            max_file_size: 1024,
            ..Default::default()
        };
        let docs = DirectoryLoader::new(dir.path(), &config)
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "small");
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let config = LoaderConfig {
            exclude_patterns: vec!["[".to_string()],
            ..Default::default()
        };
        let result = DirectoryLoader::new("/tmp", &config);
        assert!(matches!(result, Err(SourceError::PatternError { .. })));
    }

    #[test]
    fn test_single_file_root() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "only.txt", "one file");
        let docs = loader(&dir.path().join("only.txt")).load().unwrap();
        assert_eq!(docs.len(), 1);
    }
}
