//! Question answering against the served index.

use tracing::debug;

use super::embedding::SharedEmbedder;
use super::vector_index::SharedIndex;
use crate::error::{IndexError, QueryError};
use crate::models::{Answer, NoAnswerReason};
use crate::utils::text::is_blank;

/// Turns a question into the passages nearest to it.
///
/// Missing data is an answer, not an error: blank questions, an absent index
/// and an empty index all come back as [`Answer::NoAnswer`]. Embedding and
/// index failures are returned as errors.
pub struct QueryResolver {
    embedder: SharedEmbedder,
    index: SharedIndex,
    top_k: usize,
}

impl QueryResolver {
    pub fn new(embedder: SharedEmbedder, index: SharedIndex, top_k: usize) -> Self {
        Self {
            embedder,
            index,
            top_k,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn answer(&self, question: &str) -> Result<Answer, QueryError> {
        self.answer_with_k(question, self.top_k)
    }

    pub fn answer_with_k(&self, question: &str, k: usize) -> Result<Answer, QueryError> {
        let no_answer = |reason| Answer::NoAnswer {
            question: question.to_string(),
            reason,
        };

        if is_blank(question) {
            return Ok(no_answer(NoAnswerReason::BlankQuestion));
        }

        // Hold one snapshot for the whole query so a concurrent rebuild
        // cannot change the index halfway through.
        let Some(index) = self.index.snapshot() else {
            return Ok(no_answer(NoAnswerReason::MissingIndex));
        };
        if index.is_empty() {
            return Ok(no_answer(NoAnswerReason::EmptyIndex));
        }

        let vector = self.embedder.embed_one(question.trim())?;
        let result = match index.query(&vector, k) {
            Ok(result) => result,
            Err(IndexError::Empty) => return Ok(no_answer(NoAnswerReason::EmptyIndex)),
            Err(e) => return Err(e.into()),
        };

        debug!(k, hits = result.len(), "question resolved");
        Ok(Answer::Found {
            question: question.to_string(),
            result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DistanceMetric, IndexEntry, Metadata, SOURCE_KEY};
    use crate::services::embedding::{Embedder, HashEmbedder};
    use crate::services::vector_index::VectorIndex;
    use std::sync::Arc;

    fn policy_index(embedder: &HashEmbedder) -> VectorIndex {
        let passages = [
            ("Annual leave is 20 days per year.", "/data/leave.txt"),
            ("Sick leave requires a doctor's note.", "/data/sick.txt"),
            (
                "Health insurance covers dental and vision.",
                "/data/benefits.txt",
            ),
        ];
        let entries = passages
            .iter()
            .map(|(text, source)| {
                let mut metadata = Metadata::new();
                metadata.insert(SOURCE_KEY.to_string(), source.to_string());
                IndexEntry::new(embedder.embed_one(text).unwrap(), *text, metadata)
            })
            .collect();
        VectorIndex::from_entries(
            embedder.model_id(),
            embedder.dimension(),
            DistanceMetric::Cosine,
            entries,
        )
        .unwrap()
    }

    fn resolver(index: Option<VectorIndex>, top_k: usize) -> QueryResolver {
        QueryResolver::new(
            Arc::new(HashEmbedder::new(256)),
            SharedIndex::new(index),
            top_k,
        )
    }

    #[test]
    fn test_finds_relevant_passage() {
        let index = policy_index(&HashEmbedder::new(256));
        let answer = resolver(Some(index), 2)
            .answer("How many annual leave days do I get?")
            .unwrap();

        let result = answer.result().unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.best().unwrap().source(), "/data/leave.txt");
    }

    #[test]
    fn test_blank_question() {
        let index = policy_index(&HashEmbedder::new(256));
        let answer = resolver(Some(index), 2).answer("   ").unwrap();
        assert!(matches!(
            answer,
            Answer::NoAnswer {
                reason: NoAnswerReason::BlankQuestion,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_index() {
        let answer = resolver(None, 2).answer("annual leave?").unwrap();
        assert!(matches!(
            answer,
            Answer::NoAnswer {
                reason: NoAnswerReason::MissingIndex,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_index() {
        let empty = VectorIndex::new("hash-256", 256, DistanceMetric::Cosine);
        let answer = resolver(Some(empty), 2).answer("annual leave?").unwrap();
        assert!(matches!(
            answer,
            Answer::NoAnswer {
                reason: NoAnswerReason::EmptyIndex,
                ..
            }
        ));
    }

    #[test]
    fn test_k_override_and_clamp() {
        let index = policy_index(&HashEmbedder::new(256));
        let resolver = resolver(Some(index), 1);

        let answer = resolver.answer_with_k("leave", 10).unwrap();
        assert_eq!(answer.result().unwrap().len(), 3);

        let answer = resolver.answer("leave").unwrap();
        assert_eq!(answer.result().unwrap().len(), 1);
    }

    #[test]
    fn test_dimension_mismatch_is_an_error() {
        let index = policy_index(&HashEmbedder::new(128));
        let result = resolver(Some(index), 2).answer("annual leave?");
        assert!(matches!(
            result,
            Err(QueryError::Index(IndexError::QueryDimension { .. }))
        ));
    }
}
