//! Core data types and report definitions for the ingestion pipeline.

use crate::index::IndexError;
use crate::pipeline::ledger::LedgerError;
use crate::pipeline::segment::ElementKind;
use serde::Serialize;
use thiserror::Error;

/// The unit persisted to the vector index, produced by enrichment.
///
/// `(source_name, sequence_index)` is the idempotency key: exactly one indexed vector
/// may exist per pair, and re-ingestion replaces it rather than merging.
#[derive(Debug, Clone)]
pub struct EnrichmentRecord {
    /// Distilled text produced by the summarization service; the only field embedded.
    pub representative_text: String,
    /// Bounded-length prefix of the unit's original text, kept for display and audit.
    pub source_excerpt: String,
    /// Logical document identifier.
    pub source_name: String,
    /// Position of the originating unit in the segmented document.
    pub sequence_index: usize,
    /// Page the unit was extracted from, when the segmenter could localize it.
    pub page_number: Option<u32>,
    /// Kind of the originating unit.
    pub element_kind: ElementKind,
}

/// Errors encountered while constructing the pipeline from configuration.
#[derive(Debug, Error)]
pub enum InitError {
    /// Vector index bootstrap failed.
    #[error("Vector index initialization failed: {0}")]
    Index(#[from] IndexError),
    /// Persisted ledger could not be opened.
    #[error("Upsert ledger could not be opened: {0}")]
    Ledger(#[from] LedgerError),
}

/// Category assigned to a per-unit failure in the batch report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Summarization service failed or returned an empty summary.
    Enrichment,
    /// Embedding service failed for the representative text.
    Embedding,
    /// Vector index rejected the upsert after the retry budget.
    Upsert,
}

/// One recorded per-unit failure.
#[derive(Debug, Clone, Serialize)]
pub struct UnitFailure {
    /// Sequence index of the unit that failed.
    pub sequence_index: usize,
    /// Which stage produced the failure.
    pub kind: FailureKind,
    /// Human-readable diagnostic.
    pub message: String,
}

/// Batch-level outcome of an ingestion run, the single surfaced artifact.
///
/// Unit-level errors never propagate past this boundary; a run always completes with
/// a count of what succeeded and what did not.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpsertReport {
    /// Units enriched and upserted successfully.
    pub succeeded: usize,
    /// Units that failed enrichment, embedding, or upsert.
    pub failed: usize,
    /// Units skipped because the ledger already recorded their key.
    pub skipped: usize,
    /// Per-unit failure details, ordered by sequence index.
    pub failures: Vec<UnitFailure>,
}
