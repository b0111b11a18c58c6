//! Helpers for constructing point identifiers and payloads.

use crate::pipeline::EnrichmentRecord;
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use uuid::Uuid;

/// Derive the deterministic point identifier for an idempotency key.
///
/// The same `(source_name, sequence_index)` pair always maps to the same id, so a
/// repeated upsert overwrites the existing vector instead of inserting a duplicate.
pub fn point_id_for(source_name: &str, sequence_index: usize) -> String {
    let key = format!("{source_name}/{sequence_index}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
}

/// Build the payload object stored alongside each indexed vector.
///
/// The representative text is stored under `content` and all provenance under a
/// `metadata` mapping, the shape the query normalizer resolves first.
pub fn build_payload(record: &EnrichmentRecord, indexed_at: &str) -> Value {
    let mut metadata = Map::new();
    metadata.insert(
        "source_name".into(),
        Value::String(record.source_name.clone()),
    );
    metadata.insert("sequence_index".into(), json!(record.sequence_index));
    metadata.insert(
        "page_number".into(),
        record.page_number.map_or(Value::Null, |page| json!(page)),
    );
    metadata.insert(
        "element_kind".into(),
        Value::String(record.element_kind.as_str().to_string()),
    );
    metadata.insert(
        "source_excerpt".into(),
        Value::String(record.source_excerpt.clone()),
    );
    metadata.insert("indexed_at".into(), Value::String(indexed_at.to_string()));

    let mut payload = Map::new();
    payload.insert(
        "content".into(),
        Value::String(record.representative_text.clone()),
    );
    payload.insert("metadata".into(), Value::Object(metadata));
    Value::Object(payload)
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
