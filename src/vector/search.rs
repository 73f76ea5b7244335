//! Vector search module for executing exact top-k queries.
//!
//! - `ranking`: exhaustive scoring and top-k selection
//! - `executor`: pluggable fan-out for per-record scoring
//! - `cache`: memoized results keyed by query vector content
//! - `cancel`: cooperative cancellation of in-flight queries

pub mod cache;
pub mod cancel;
pub mod executor;
pub mod ranking;

use crate::vector::core::document::Document;

/// Documents and scores of a query, best first.
///
/// `documents[i]` scored `scores[i]`; both sequences always have the same
/// length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Matched documents, best first.
    pub documents: Vec<Document>,
    /// Score of each matched document (higher is better).
    pub scores: Vec<f32>,
}

impl QueryResult {
    /// Create an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty result with room for `capacity` hits.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            documents: Vec::with_capacity(capacity),
            scores: Vec::with_capacity(capacity),
        }
    }

    /// Append a hit.
    pub fn push(&mut self, document: Document, score: f32) {
        self.documents.push(document);
        self.scores.push(score);
    }

    /// Number of hits.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether there are no hits.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Iterate `(document, score)` pairs, best first.
    pub fn iter(&self) -> impl Iterator<Item = (&Document, f32)> {
        self.documents.iter().zip(self.scores.iter().copied())
    }

    /// A copy holding at most the first `k` hits.
    pub fn truncated(&self, k: usize) -> Self {
        let k = k.min(self.len());
        Self {
            documents: self.documents[..k].to_vec(),
            scores: self.scores[..k].to_vec(),
        }
    }
}
