//! Enrichment: turn a context window into a search-ready record.
//!
//! The summarization service distills each window into the representative text that
//! gets embedded and matched at query time. The original wording is preserved
//! separately as a truncated excerpt, so drift in the representation never loses the
//! auditable source.

use crate::pipeline::context::ContextWindow;
use crate::pipeline::types::EnrichmentRecord;
use crate::summarization::{Summarizer, SummarizerError, SummaryRequest};
use thiserror::Error;

/// Character budget for the stored source excerpt. Truncation, not summarization:
/// the excerpt must stay verbatim.
const SOURCE_EXCERPT_CHARS: usize = 300;

const SUMMARY_INSTRUCTION: &str = "Summarize the central idea of the following text \
for search purposes. Preserve domain-specific terminology and definitions.";

/// Per-unit enrichment failures, tagged with the unit's sequence index.
///
/// These are recorded in the batch report and never abort the remaining units.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// Summarization service call failed.
    #[error("Summarization failed for unit {sequence_index}: {source}")]
    Summarization {
        /// Sequence index of the failing unit.
        sequence_index: usize,
        /// Underlying service error.
        #[source]
        source: SummarizerError,
    },
    /// Summarization service returned an empty response.
    #[error("Summarizer returned an empty summary for unit {sequence_index}")]
    EmptySummary {
        /// Sequence index of the failing unit.
        sequence_index: usize,
    },
}

impl EnrichmentError {
    /// Sequence index of the unit this failure belongs to.
    pub fn sequence_index(&self) -> usize {
        match self {
            Self::Summarization { sequence_index, .. } | Self::EmptySummary { sequence_index } => {
                *sequence_index
            }
        }
    }
}

/// Client that enriches context windows via the summarization service.
pub struct EnrichmentClient {
    summarizer: Box<dyn Summarizer + Send + Sync>,
    model: String,
}

impl EnrichmentClient {
    /// Construct a client around an existing summarizer handle.
    pub fn new(summarizer: Box<dyn Summarizer + Send + Sync>, model: String) -> Self {
        Self { summarizer, model }
    }

    /// Enrich one window into a record ready for indexing.
    ///
    /// No local state is mutated; the only side effect is the outbound service call.
    pub async fn enrich(
        &self,
        source_name: &str,
        window: &ContextWindow<'_>,
    ) -> Result<EnrichmentRecord, EnrichmentError> {
        let sequence_index = window.center.sequence_index;
        let prompt = format!("{SUMMARY_INSTRUCTION}\n\n{}", window.context_text());

        let summary = self
            .summarizer
            .summarize(SummaryRequest {
                model: self.model.clone(),
                prompt,
            })
            .await
            .map_err(|source| EnrichmentError::Summarization {
                sequence_index,
                source,
            })?;

        let representative_text = summary.trim().to_string();
        if representative_text.is_empty() {
            return Err(EnrichmentError::EmptySummary { sequence_index });
        }

        Ok(EnrichmentRecord {
            representative_text,
            source_excerpt: truncate_chars(window.center.text_or_empty(), SOURCE_EXCERPT_CHARS),
            source_name: source_name.to_string(),
            sequence_index,
            page_number: window.center.page_number,
            element_kind: window.center.kind,
        })
    }
}

fn truncate_chars(text: &str, budget: usize) -> String {
    text.chars().take(budget).collect()
}
