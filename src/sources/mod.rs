//! Document sources.
//!
//! A source produces the raw documents an index is built from. The directory
//! loader is the only built-in implementation; tests and embedding
//! applications can supply their own.

mod local;

pub use local::DirectoryLoader;

use crate::error::SourceError;
use crate::models::Document;

/// Trait for document sources.
pub trait DocumentSource: Send + Sync {
    /// Load every document the source currently holds.
    fn load(&self) -> Result<Vec<Document>, SourceError>;

    /// Human-readable description for logs and reports.
    fn describe(&self) -> String;
}

/// Documents that are already in memory.
impl DocumentSource for Vec<Document> {
    fn load(&self) -> Result<Vec<Document>, SourceError> {
        Ok(self.clone())
    }

    fn describe(&self) -> String {
        format!("{} in-memory documents", self.len())
    }
}
