//! Pipeline service coordinating segmentation adaptation, enrichment, indexing, and search.

use crate::{
    config::get_config,
    embedding::{EmbeddingClient, get_embedding_client},
    index::{IndexHealthSnapshot, VectorIndexService},
    metrics::{IngestMetrics, MetricsSnapshot},
    pipeline::{
        context::window_at,
        enrich::EnrichmentClient,
        indexer::{Indexer, UpsertOutcome},
        ledger::UpsertLedger,
        segment::{ContentUnit, RawBlock, adapt_blocks},
        types::{FailureKind, InitError, UnitFailure, UpsertReport},
    },
    query::{SearchError, SearchResult, normalize::map_scored_point},
    summarization::get_summarizer,
};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Coordinates the full pipeline: adapter, context windows, enrichment, and indexing
/// on the write path; embedding, search, and normalization on the read path.
///
/// The service owns long-lived handles to the summarization client, the embedding
/// client, and the vector index transport, so every surface (HTTP, CLI) reuses the
/// same components. Construct it once near process start and share it through an
/// `Arc`.
pub struct PipelineService {
    embedding_client: Arc<dyn EmbeddingClient + Send + Sync>,
    enrichment: EnrichmentClient,
    indexer: Indexer,
    index: Arc<VectorIndexService>,
    metrics: Arc<IngestMetrics>,
    collection: String,
    concurrency: usize,
}

/// Abstraction over the pipeline used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// Adapt, enrich, and index one document's segmented blocks.
    async fn ingest(&self, source_name: &str, blocks: Vec<RawBlock>) -> UpsertReport;

    /// Search the vector index, returning normalized results in backend rank order.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, SearchError>;

    /// Probe the vector index for a lightweight health snapshot.
    async fn index_health(&self) -> IndexHealthSnapshot;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl PipelineService {
    /// Build a new pipeline service, bootstrapping the backing collection as needed.
    pub async fn new() -> Result<Self, InitError> {
        let config = get_config();
        tracing::info!("Initializing pipeline service");
        let index = Arc::new(VectorIndexService::new()?);
        let vector_size = config.embedding_dimension as u64;
        index
            .create_collection_if_not_exists(&config.index_collection, vector_size)
            .await?;
        index.ensure_payload_indexes(&config.index_collection).await?;
        tracing::debug!(collection = %config.index_collection, vector_size, "Collection ready");

        let ledger = config
            .ledger_path
            .as_ref()
            .map(UpsertLedger::open)
            .transpose()?;
        if ledger.is_some() {
            tracing::info!(path = ?config.ledger_path, "Upsert ledger enabled");
        }

        let embedding_client: Arc<dyn EmbeddingClient + Send + Sync> =
            Arc::from(get_embedding_client());
        let enrichment = EnrichmentClient::new(get_summarizer(), config.summarizer_model.clone());
        let indexer = Indexer::new(
            Arc::clone(&embedding_client),
            Arc::clone(&index),
            config.index_collection.clone(),
            ledger,
            config.ingest_retry_limit,
        );

        Ok(Self {
            embedding_client,
            enrichment,
            indexer,
            index,
            metrics: Arc::new(IngestMetrics::new()),
            collection: config.index_collection.clone(),
            concurrency: config.ingest_concurrency,
        })
    }

    /// Adapt, enrich, and index one document's segmented blocks.
    ///
    /// The unit sequence is built and frozen before any concurrent work begins; the
    /// workers only ever read it. Each unit's enrichment-then-upsert is one atomic
    /// unit of work, fanned out under a bounded worker pool. Unit-level failures are
    /// collected into the report; the run itself never raises.
    pub async fn ingest(&self, source_name: &str, blocks: Vec<RawBlock>) -> UpsertReport {
        let block_count = blocks.len();
        let units: Arc<Vec<ContentUnit>> = Arc::new(adapt_blocks(blocks));
        tracing::info!(
            source = source_name,
            blocks = block_count,
            "Ingesting document"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let outcomes: Vec<Option<UnitOutcome>> = stream::iter((0..units.len()).map(|index| {
            let units = Arc::clone(&units);
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .expect("ingest semaphore never closes");
                self.process_unit(source_name, &units, index).await
            }
        }))
        .buffer_unordered(self.concurrency)
        .collect()
        .await;

        let mut report = UpsertReport::default();
        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                UnitOutcome::Indexed => report.succeeded += 1,
                UnitOutcome::Skipped => report.skipped += 1,
                UnitOutcome::Failed(failure) => {
                    report.failed += 1;
                    report.failures.push(failure);
                }
            }
        }
        report
            .failures
            .sort_by_key(|failure| failure.sequence_index);

        self.metrics
            .record_run(report.succeeded as u64, report.failed as u64);
        tracing::info!(
            source = source_name,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "Ingestion run complete"
        );

        report
    }

    /// Enrich and index the unit at `index`; `None` when the unit is not text-bearing.
    async fn process_unit(
        &self,
        source_name: &str,
        units: &[ContentUnit],
        index: usize,
    ) -> Option<UnitOutcome> {
        let window = window_at(units, index)?;

        let record = match self.enrichment.enrich(source_name, &window).await {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(
                    source = source_name,
                    sequence_index = error.sequence_index(),
                    error = %error,
                    "Unit enrichment failed"
                );
                return Some(UnitOutcome::Failed(UnitFailure {
                    sequence_index: error.sequence_index(),
                    kind: FailureKind::Enrichment,
                    message: error.to_string(),
                }));
            }
        };

        match self.indexer.index_record(&record).await {
            Ok(UpsertOutcome::Indexed) => Some(UnitOutcome::Indexed),
            Ok(UpsertOutcome::Skipped) => Some(UnitOutcome::Skipped),
            Err(error) => {
                tracing::warn!(
                    source = source_name,
                    sequence_index = record.sequence_index,
                    error = %error,
                    "Unit upsert failed"
                );
                Some(UnitOutcome::Failed(UnitFailure {
                    sequence_index: record.sequence_index,
                    kind: error.failure_kind(),
                    message: error.to_string(),
                }))
            }
        }
    }

    /// Search the vector index, returning normalized results in backend rank order.
    ///
    /// The query text is embedded once with the shared client; raw results are
    /// normalized and unresolvable records dropped, so the list never exceeds
    /// `limit` entries.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let vector = self.embedding_client.embed(query).await?;
        let points = self
            .index
            .search_points(&self.collection, vector, limit)
            .await?;
        Ok(points
            .into_iter()
            .filter_map(map_scored_point)
            .take(limit)
            .collect())
    }

    /// Exact number of indexed vectors, optionally scoped to one source document.
    pub async fn indexed_count(
        &self,
        source_name: Option<&str>,
    ) -> Result<usize, crate::index::IndexError> {
        self.index.count_points(&self.collection, source_name).await
    }

    /// Probe the vector index to surface a lightweight health snapshot.
    pub async fn index_health(&self) -> IndexHealthSnapshot {
        match self.index.collection_exists(&self.collection).await {
            Ok(present) => IndexHealthSnapshot {
                reachable: true,
                collection_present: present,
                error: None,
            },
            Err(error) => {
                tracing::warn!(error = %error, "Vector index health probe failed");
                IndexHealthSnapshot {
                    reachable: false,
                    collection_present: false,
                    error: Some(error.to_string()),
                }
            }
        }
    }

    /// Return the current ingestion metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

enum UnitOutcome {
    Indexed,
    Skipped,
    Failed(UnitFailure),
}

#[async_trait]
impl PipelineApi for PipelineService {
    async fn ingest(&self, source_name: &str, blocks: Vec<RawBlock>) -> UpsertReport {
        PipelineService::ingest(self, source_name, blocks).await
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, SearchError> {
        PipelineService::search(self, query, limit).await
    }

    async fn index_health(&self) -> IndexHealthSnapshot {
        PipelineService::index_health(self).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        PipelineService::metrics_snapshot(self)
    }
}
