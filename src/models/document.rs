use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Metadata key holding the originating file path.
pub const SOURCE_KEY: &str = "source";

/// Ordered key/value metadata attached to documents, chunks and index entries.
pub type Metadata = BTreeMap<String, String>;

/// Raw text loaded from one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), source.into());
        Self {
            content: content.into(),
            metadata,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}

/// A bounded slice of a document's content.
///
/// Offsets count characters, not bytes. `span` is the part of the document
/// this chunk contributes for the first time; `start` is where its content
/// begins, which precedes `span.start` by the overlap for every chunk but the
/// first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: Metadata,
    pub index: usize,
    pub start: usize,
    pub span: Range<usize>,
}

impl Chunk {
    /// Content that is not shared with the previous chunk.
    pub fn fresh_content(&self) -> &str {
        let skip = self.span.start - self.start;
        match self.content.char_indices().nth(skip) {
            Some((byte, _)) => &self.content[byte..],
            None => "",
        }
    }

    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}

/// The persisted unit of a vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: Metadata,
}

impl IndexEntry {
    pub fn new(vector: Vec<f32>, text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            vector,
            text: text.into(),
            metadata,
        }
    }

    pub fn from_chunk(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self {
            vector,
            text: chunk.content,
            metadata: chunk.metadata,
        }
    }
}
