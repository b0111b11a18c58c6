//! Persisted upsert ledger.
//!
//! Only used when the vector index backend cannot deduplicate on write. The ledger
//! records every `(source_name, sequence_index)` key that completed an upsert, and is
//! consulted before the embedding call so a re-run after partial failure never pays
//! for embeddings it does not need. The file format is an implementation detail, not
//! a wire contract.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Errors raised while loading or persisting the ledger file.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Ledger file could not be read or written.
    #[error("Ledger I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Ledger file contents could not be decoded.
    #[error("Ledger file is corrupt: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerEntry {
    indexed_at: String,
}

/// Mapping from idempotency key to upsert status, persisted between runs.
#[derive(Debug)]
pub struct UpsertLedger {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, LedgerEntry>>,
}

impl UpsertLedger {
    /// Open the ledger at `path`, loading any entries from a previous run.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Whether the key has already completed an upsert.
    pub fn contains(&self, source_name: &str, sequence_index: usize) -> bool {
        self.entries
            .lock()
            .expect("ledger lock poisoned")
            .contains_key(&key_for(source_name, sequence_index))
    }

    /// Record a completed upsert and persist the ledger to disk.
    pub fn record(
        &self,
        source_name: &str,
        sequence_index: usize,
        indexed_at: &str,
    ) -> Result<(), LedgerError> {
        let mut entries = self.entries.lock().expect("ledger lock poisoned");
        entries.insert(
            key_for(source_name, sequence_index),
            LedgerEntry {
                indexed_at: indexed_at.to_string(),
            },
        );
        persist(&self.path, &entries)
    }
}

fn key_for(source_name: &str, sequence_index: usize) -> String {
    format!("{source_name}#{sequence_index}")
}

fn persist(path: &Path, entries: &BTreeMap<String, LedgerEntry>) -> Result<(), LedgerError> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("docdex-ledger-{}-{tag}.json", std::process::id()))
    }

    #[test]
    fn records_and_reports_keys() {
        let path = scratch_path("records");
        let _ = std::fs::remove_file(&path);
        let ledger = UpsertLedger::open(&path).expect("open ledger");

        assert!(!ledger.contains("manual.pdf", 3));
        ledger
            .record("manual.pdf", 3, "2025-01-01T00:00:00Z")
            .expect("record");
        assert!(ledger.contains("manual.pdf", 3));
        assert!(!ledger.contains("manual.pdf", 4));
        assert!(!ledger.contains("other.pdf", 3));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn entries_survive_reopen() {
        let path = scratch_path("reopen");
        let _ = std::fs::remove_file(&path);

        {
            let ledger = UpsertLedger::open(&path).expect("open ledger");
            ledger
                .record("manual.pdf", 0, "2025-01-01T00:00:00Z")
                .expect("record");
            ledger
                .record("manual.pdf", 1, "2025-01-01T00:00:01Z")
                .expect("record");
        }

        let reopened = UpsertLedger::open(&path).expect("reopen ledger");
        assert!(reopened.contains("manual.pdf", 0));
        assert!(reopened.contains("manual.pdf", 1));
        assert!(!reopened.contains("manual.pdf", 2));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn corrupt_file_is_reported_not_swallowed() {
        let path = scratch_path("corrupt");
        std::fs::write(&path, "not json").expect("write scratch file");

        let error = UpsertLedger::open(&path).expect_err("corrupt ledger");
        assert!(matches!(error, LedgerError::Decode(_)));

        let _ = std::fs::remove_file(&path);
    }
}
