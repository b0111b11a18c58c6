//! Read path: similarity search types and defensive result normalization.
//!
//! The query path is stateless and shares only the vector index handle and the data
//! model with ingestion. Every raw backend result is funneled through the normalizer
//! so callers see one canonical record shape no matter how the backend serialized it.

pub mod normalize;

use crate::embedding::EmbeddingClientError;
use crate::index::IndexError;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Canonical search record returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// Resolved representative text; never empty, unresolvable records are dropped.
    pub content: String,
    /// Provenance metadata merged from all available sources.
    pub metadata: Map<String, Value>,
    /// Similarity score reported by the backend, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// Errors emitted while orchestrating similarity searches.
///
/// A query that hits a backend error surfaces one readable error and no results,
/// never a partial or garbled list.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Embedding service failed to produce a vector for the query text.
    #[error("Failed to embed query text: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector index query returned an error response.
    #[error("Vector index query failed: {0}")]
    Index(#[from] IndexError),
}
