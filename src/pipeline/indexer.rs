//! Indexer: embed a record's representative text and upsert it idempotently.
//!
//! Exactly one embedding request is issued per record, always on the representative
//! text, never on the excerpt or the raw unit text. Search relevance is driven by the
//! distilled representation, trading verbatim phrase recall for conceptual recall.

use crate::embedding::{EmbeddingClient, EmbeddingClientError};
use crate::index::payload::current_timestamp_rfc3339;
use crate::index::{IndexError, VectorIndexService, build_payload, point_id_for};
use crate::pipeline::ledger::{LedgerError, UpsertLedger};
use crate::pipeline::types::{EnrichmentRecord, FailureKind};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Per-record indexing failures, recorded in the batch report.
#[derive(Debug, Error)]
pub enum UpsertError {
    /// Embedding service failed for the representative text.
    #[error("Failed to embed representative text: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector index rejected the upsert after the retry budget was spent.
    #[error("Vector index upsert failed: {0}")]
    Index(#[from] IndexError),
    /// Ledger update failed after a successful upsert.
    #[error("Upsert ledger update failed: {0}")]
    Ledger(#[from] LedgerError),
}

impl UpsertError {
    pub(crate) fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Embedding(_) => FailureKind::Embedding,
            Self::Index(_) | Self::Ledger(_) => FailureKind::Upsert,
        }
    }
}

/// How the indexer disposed of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Record was embedded and written to the index.
    Indexed,
    /// Ledger already held the key; no embedding request was made.
    Skipped,
}

/// Writes enrichment records into the vector index.
pub struct Indexer {
    embedding: Arc<dyn EmbeddingClient + Send + Sync>,
    index: Arc<VectorIndexService>,
    collection: String,
    ledger: Option<UpsertLedger>,
    retry_limit: usize,
}

impl Indexer {
    /// Construct an indexer around shared service handles.
    pub fn new(
        embedding: Arc<dyn EmbeddingClient + Send + Sync>,
        index: Arc<VectorIndexService>,
        collection: String,
        ledger: Option<UpsertLedger>,
        retry_limit: usize,
    ) -> Self {
        Self {
            embedding,
            index,
            collection,
            ledger,
            retry_limit: retry_limit.max(1),
        }
    }

    /// Embed and upsert one record as a single atomic unit of work.
    ///
    /// The vector and payload travel in one request under a deterministic point id, so
    /// a cancelled or failed run never leaves a half-written record behind and a
    /// re-run overwrites rather than duplicates.
    pub async fn index_record(
        &self,
        record: &EnrichmentRecord,
    ) -> Result<UpsertOutcome, UpsertError> {
        if let Some(ledger) = &self.ledger
            && ledger.contains(&record.source_name, record.sequence_index)
        {
            tracing::debug!(
                source = %record.source_name,
                sequence_index = record.sequence_index,
                "Ledger holds key; skipping before embedding"
            );
            return Ok(UpsertOutcome::Skipped);
        }

        let vector = self.embedding.embed(&record.representative_text).await?;
        let indexed_at = current_timestamp_rfc3339();
        let payload = build_payload(record, &indexed_at);
        let point_id = point_id_for(&record.source_name, record.sequence_index);

        self.upsert_with_retry(&point_id, &vector, &payload, record.sequence_index)
            .await?;

        if let Some(ledger) = &self.ledger {
            ledger.record(&record.source_name, record.sequence_index, &indexed_at)?;
        }

        Ok(UpsertOutcome::Indexed)
    }

    async fn upsert_with_retry(
        &self,
        point_id: &str,
        vector: &[f32],
        payload: &serde_json::Value,
        sequence_index: usize,
    ) -> Result<(), IndexError> {
        let mut attempt = 0;
        loop {
            match self
                .index
                .upsert_vector(&self.collection, point_id, vector, payload)
                .await
            {
                Ok(()) => return Ok(()),
                Err(error) if error.is_transient() && attempt + 1 < self.retry_limit => {
                    attempt += 1;
                    tracing::warn!(
                        sequence_index,
                        attempt,
                        error = %error,
                        "Transient index error; retrying upsert"
                    );
                    tokio::time::sleep(retry_backoff(attempt)).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(250 * (1 << capped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use httpmock::{Method::PUT, MockServer};
    use reqwest::Client;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl EmbeddingClient for CountingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.1, 0.2])
        }
    }

    fn index_for(server: &MockServer) -> Arc<VectorIndexService> {
        Arc::new(VectorIndexService {
            client: Client::builder()
                .user_agent("docdex-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: None,
        })
    }

    fn sample_record() -> EnrichmentRecord {
        EnrichmentRecord {
            representative_text: "Distilled idea.".into(),
            source_excerpt: "Original wording".into(),
            source_name: "manual.pdf".into(),
            sequence_index: 5,
            page_number: Some(2),
            element_kind: crate::pipeline::ElementKind::Text,
        }
    }

    fn scratch_ledger(tag: &str) -> (std::path::PathBuf, UpsertLedger) {
        let path = std::env::temp_dir().join(format!(
            "docdex-indexer-{}-{tag}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let ledger = UpsertLedger::open(&path).expect("open ledger");
        (path, ledger)
    }

    #[tokio::test]
    async fn index_record_embeds_once_and_upserts() {
        let server = MockServer::start_async().await;
        let embedder = CountingEmbedder::new();
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/docs/points")
                    .body_contains("Distilled idea.");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": { "operation_id": 1, "status": "completed" }
                }));
            })
            .await;

        let indexer = Indexer::new(embedder.clone(), index_for(&server), "docs".into(), None, 3);
        let outcome = indexer
            .index_record(&sample_record())
            .await
            .expect("indexed");

        mock.assert();
        assert_eq!(outcome, UpsertOutcome::Indexed);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ledger_hit_skips_before_the_embedding_call() {
        let server = MockServer::start_async().await;
        let embedder = CountingEmbedder::new();
        let (path, ledger) = scratch_ledger("skip");
        ledger
            .record("manual.pdf", 5, "2025-01-01T00:00:00Z")
            .expect("seed ledger");

        let indexer = Indexer::new(
            embedder.clone(),
            index_for(&server),
            "docs".into(),
            Some(ledger),
            3,
        );
        let outcome = indexer
            .index_record(&sample_record())
            .await
            .expect("skipped");

        assert_eq!(outcome, UpsertOutcome::Skipped);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn successful_upsert_is_recorded_in_the_ledger() {
        let server = MockServer::start_async().await;
        let (path, ledger) = scratch_ledger("record");
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs/points");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": { "operation_id": 1, "status": "completed" }
                }));
            })
            .await;

        let indexer = Indexer::new(
            CountingEmbedder::new(),
            index_for(&server),
            "docs".into(),
            Some(ledger),
            3,
        );
        indexer
            .index_record(&sample_record())
            .await
            .expect("indexed");

        let reopened = UpsertLedger::open(&path).expect("reopen ledger");
        assert!(reopened.contains("manual.pdf", 5));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn transient_errors_exhaust_the_retry_budget_then_surface() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs/points");
                then.status(503).body("unavailable");
            })
            .await;

        let indexer = Indexer::new(
            CountingEmbedder::new(),
            index_for(&server),
            "docs".into(),
            None,
            2,
        );
        let error = indexer
            .index_record(&sample_record())
            .await
            .expect_err("exhausted retries");

        assert_eq!(mock.hits_async().await, 2);
        assert_eq!(error.failure_kind(), FailureKind::Upsert);
    }

    #[tokio::test]
    async fn non_transient_errors_are_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/docs/points");
                then.status(400).body("bad vector");
            })
            .await;

        let indexer = Indexer::new(
            CountingEmbedder::new(),
            index_for(&server),
            "docs".into(),
            None,
            3,
        );
        indexer
            .index_record(&sample_record())
            .await
            .expect_err("rejected upsert");

        assert_eq!(mock.hits_async().await, 1);
    }
}
