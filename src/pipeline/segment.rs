//! Segmenter adapter: normalizes upstream block output into typed content units.
//!
//! The segmentation engine itself (layout analysis, OCR) is an external collaborator;
//! it hands this crate an ordered sequence of blocks, each exposing a type label,
//! optional text, and an optional page number. The adapter classifies every block
//! exactly once into a closed kind and assigns its position in the *original* output
//! as the sequence index, so provenance gaps survive even for units that are never
//! enriched.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while consuming the segmenter's block output.
///
/// These are fatal to an ingestion run: without a usable block sequence there is no
/// partial document worth processing.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// Block output could not be read.
    #[error("Failed to read segmenter output: {0}")]
    Io(#[from] std::io::Error),
    /// Block output could not be decoded.
    #[error("Failed to decode segmenter output: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One block emitted by the upstream segmentation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBlock {
    /// Element-type label reported by the segmenter (e.g. `NarrativeText`, `Table`, `Image`).
    pub element_type: String,
    /// Extracted text, absent for pure-image blocks.
    #[serde(default)]
    pub text: Option<String>,
    /// One-based page number when the segmenter could localize the block.
    #[serde(default)]
    pub page_number: Option<u32>,
}

/// Closed classification of a content unit, decided once at the adapter boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// Prose block: paragraph, heading, or composite text.
    Text,
    /// Structured tabular block.
    Table,
    /// Visual block with no prose of its own.
    Image,
}

impl ElementKind {
    fn classify(label: &str) -> Self {
        if label.contains("Table") {
            Self::Table
        } else if label.contains("Image") {
            Self::Image
        } else {
            Self::Text
        }
    }

    /// Stable string form stored in index payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Table => "Table",
            Self::Image => "Image",
        }
    }
}

/// One segmented block with provenance, immutable after adaptation.
#[derive(Debug, Clone)]
pub struct ContentUnit {
    /// Closed kind assigned at the adapter boundary.
    pub kind: ElementKind,
    /// Extracted text, absent for pure-image units.
    pub text: Option<String>,
    /// One-based page number, absent when the segmenter could not localize the unit.
    pub page_number: Option<u32>,
    /// Zero-based position in the original block sequence; unique and never reassigned.
    pub sequence_index: usize,
}

impl ContentUnit {
    /// Whether this unit is a candidate for enrichment.
    pub fn is_enrichable(&self) -> bool {
        self.kind == ElementKind::Text
            && self
                .text
                .as_deref()
                .is_some_and(|text| !text.trim().is_empty())
    }

    /// The unit's text, or an empty string when absent.
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

/// Adapt the segmenter's raw blocks into the canonical unit sequence.
///
/// Every block is kept, including those that will never be enriched: neighbors feed
/// context windows, and the unfiltered position is the provenance the index stores.
pub fn adapt_blocks(blocks: Vec<RawBlock>) -> Vec<ContentUnit> {
    blocks
        .into_iter()
        .enumerate()
        .map(|(sequence_index, block)| ContentUnit {
            kind: ElementKind::classify(&block.element_type),
            text: block.text,
            page_number: block.page_number,
            sequence_index,
        })
        .collect()
}

/// Read a segmenter block export from disk.
pub fn read_blocks(path: &Path) -> Result<Vec<RawBlock>, SegmentError> {
    let raw = std::fs::read_to_string(path)?;
    let blocks = serde_json::from_str(&raw)?;
    Ok(blocks)
}
