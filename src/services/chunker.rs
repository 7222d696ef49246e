//! Recursive separator-aware text chunking with overlap.

use std::ops::Range;

use crate::error::ConfigError;
use crate::models::{Chunk, ChunkingConfig, Document};

/// Splits documents into bounded, overlapping chunks.
///
/// Text is cut along the first separator that occurs in it, pieces are packed
/// greedily, and any piece that is still too large is cut again with the next
/// separator. An empty separator cuts between characters.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum chunk length in characters
    chunk_size: usize,
    /// Characters repeated from the end of the previous chunk
    overlap: usize,
    separators: Vec<String>,
}

impl TextChunker {
    pub fn new(
        chunk_size: usize,
        overlap: usize,
        separators: Vec<String>,
    ) -> Result<Self, ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "chunk_overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        if separators.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one separator is required".to_string(),
            ));
        }
        Ok(Self {
            chunk_size,
            overlap,
            separators,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.chunk_size as usize,
            config.chunk_overlap as usize,
            config.separators.clone(),
        )
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split a document. Every chunk carries its own copy of the metadata.
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let text = document.content.as_str();
        if text.is_empty() {
            return Vec::new();
        }

        // Fresh spans are packed below the full size so that prepending the
        // overlap keeps each chunk within chunk_size.
        let budget = self.chunk_size - self.overlap;
        let mut spans = Vec::new();
        split_spans(text, 0..text.len(), &self.separators, budget, &mut spans);

        // char index -> byte offset, with a trailing entry for text.len()
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(byte, _)| byte)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_at = |byte: usize| boundaries.partition_point(|&b| b < byte);

        spans
            .into_iter()
            .enumerate()
            .map(|(index, bytes)| {
                let span = char_at(bytes.start)..char_at(bytes.end);
                let start = if index == 0 {
                    span.start
                } else {
                    span.start.saturating_sub(self.overlap)
                };
                Chunk {
                    content: text[boundaries[start]..bytes.end].to_string(),
                    metadata: document.metadata.clone(),
                    index,
                    start,
                    span,
                }
            })
            .collect()
    }

    pub fn split_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|doc| self.split(doc)).collect()
    }
}

/// Append contiguous byte ranges covering `range`, each at most `budget`
/// characters unless no separator can cut it further.
fn split_spans(
    text: &str,
    range: Range<usize>,
    separators: &[String],
    budget: usize,
    out: &mut Vec<Range<usize>>,
) {
    let segment = &text[range.clone()];
    if segment.chars().count() <= budget {
        out.push(range);
        return;
    }

    let Some(level) = separators
        .iter()
        .position(|sep| sep.is_empty() || segment.contains(sep.as_str()))
    else {
        out.push(range);
        return;
    };
    let finer = &separators[level + 1..];

    let mut window: Option<Range<usize>> = None;
    let mut window_len = 0;

    for piece in pieces(segment, &separators[level]) {
        let piece = piece.start + range.start..piece.end + range.start;
        let piece_len = text[piece.clone()].chars().count();

        if piece_len > budget {
            if let Some(done) = window.take() {
                out.push(done);
            }
            window_len = 0;
            split_spans(text, piece, finer, budget, out);
            continue;
        }

        match window.as_mut() {
            Some(current) if window_len + piece_len <= budget => {
                current.end = piece.end;
                window_len += piece_len;
            }
            _ => {
                if let Some(done) = window.replace(piece) {
                    out.push(done);
                }
                window_len = piece_len;
            }
        }
    }

    if let Some(done) = window {
        out.push(done);
    }
}

/// Cut `segment` after every occurrence of `separator`, keeping the separator
/// at the end of the piece it terminates. Ranges are relative to `segment`.
fn pieces(segment: &str, separator: &str) -> Vec<Range<usize>> {
    if separator.is_empty() {
        return segment
            .char_indices()
            .map(|(byte, c)| byte..byte + c.len_utf8())
            .collect();
    }

    let mut result = Vec::new();
    let mut start = 0;
    for (idx, matched) in segment.match_indices(separator) {
        let end = idx + matched.len();
        result.push(start..end);
        start = end;
    }
    if start < segment.len() {
        result.push(start..segment.len());
    }
    result
}
