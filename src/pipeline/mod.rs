//! Ingestion pipeline: segment adaptation, context windows, enrichment, and indexing.

pub mod context;
pub mod enrich;
pub mod indexer;
pub mod ledger;
pub mod segment;
mod service;
pub mod types;

pub use context::{ContextWindow, window_at};
pub use enrich::{EnrichmentClient, EnrichmentError};
pub use indexer::{Indexer, UpsertError, UpsertOutcome};
pub use ledger::{LedgerError, UpsertLedger};
pub use segment::{ContentUnit, ElementKind, RawBlock, SegmentError, adapt_blocks, read_blocks};
pub use service::{PipelineApi, PipelineService};
pub use types::{EnrichmentRecord, FailureKind, InitError, UnitFailure, UpsertReport};
