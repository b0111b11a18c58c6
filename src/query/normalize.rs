//! Fallback-chain normalization of heterogeneous backend result payloads.
//!
//! The retrieval backend's client libraries have historically serialized results
//! inconsistently between execution environments, so the read path accepts every
//! shape it has been observed to produce. Precedence, each step a fallback for the
//! previous:
//!
//! 1. A typed object exposing `content` and a non-empty `metadata` mapping is used
//!    as-is.
//! 2. A `content` string that itself begins with `{"` is parsed as a serialized
//!    document: its `page_content` becomes the true content and its `metadata`
//!    sub-mapping is merged over the outer metadata (embedded keys override, since
//!    the serialized document is the most specific source). A parse failure falls
//!    through with the *original* unparsed string, so a malformed payload stays
//!    visible instead of vanishing.
//! 3. A plain mapping is read through its `page_content`/`metadata` keys.
//! 4. Anything else is coerced to its string form with empty metadata: degraded
//!    display beats a silent drop.
//!
//! Records whose content still resolves to nothing are dropped rather than returned
//! empty.

use crate::index::ScoredPoint;
use crate::query::SearchResult;
use serde_json::{Map, Value};

/// Normalize one raw backend payload into the canonical record shape.
///
/// Returns `None` only when no textual content can be resolved at all.
pub fn normalize(raw: Value) -> Option<SearchResult> {
    let (content, metadata) = match raw {
        Value::Object(map) => normalize_object(map),
        Value::Null => return None,
        other => (coerce_to_string(other), Map::new()),
    };

    if content.trim().is_empty() {
        return None;
    }

    Some(SearchResult {
        content,
        metadata,
        score: None,
    })
}

/// Attach the backend's score to a normalized payload.
pub(crate) fn map_scored_point(point: ScoredPoint) -> Option<SearchResult> {
    let payload = point.payload?;
    let mut result = normalize(Value::Object(payload))?;
    result.score = Some(point.score);
    Some(result)
}

fn normalize_object(map: Map<String, Value>) -> (String, Map<String, Value>) {
    let outer_metadata = match map.get("metadata") {
        Some(Value::Object(metadata)) => metadata.clone(),
        _ => Map::new(),
    };

    if let Some(Value::String(content)) = map.get("content") {
        if !outer_metadata.is_empty() {
            return (content.clone(), outer_metadata);
        }

        if content.trim_start().starts_with("{\"")
            && let Ok(Value::Object(embedded)) = serde_json::from_str::<Value>(content)
            && let Some(Value::String(page_content)) = embedded.get("page_content")
        {
            let mut metadata = outer_metadata;
            if let Some(Value::Object(embedded_metadata)) = embedded.get("metadata") {
                for (key, value) in embedded_metadata {
                    metadata.insert(key.clone(), value.clone());
                }
            }
            return (page_content.clone(), metadata);
        }

        // Parse failed or no embedded document: keep the original string visible.
        return (content.clone(), outer_metadata);
    }

    if let Some(Value::String(page_content)) = map.get("page_content") {
        return (page_content.clone(), outer_metadata);
    }

    (Value::Object(map).to_string(), Map::new())
}

fn coerce_to_string(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_shape_is_used_as_is() {
        let raw = json!({
            "content": "Distilled idea.",
            "metadata": { "source_name": "manual.pdf", "sequence_index": 4 }
        });

        let result = normalize(raw).expect("result");
        assert_eq!(result.content, "Distilled idea.");
        assert_eq!(result.metadata["source_name"], "manual.pdf");
        assert_eq!(result.metadata["sequence_index"], 4);
    }

    #[test]
    fn embedded_document_string_is_unwrapped() {
        let raw = json!({
            "content": r#"{"page_content": "X", "metadata": {"source": "doc"}}"#
        });

        let result = normalize(raw).expect("result");
        assert_eq!(result.content, "X");
        assert_eq!(result.metadata["source"], "doc");
    }

    #[test]
    fn embedded_metadata_overrides_empty_outer_mapping() {
        let raw = json!({
            "content": r#"{"page_content": "X", "metadata": {"page_number": 9}}"#,
            "metadata": {}
        });

        let result = normalize(raw).expect("result");
        assert_eq!(result.content, "X");
        assert_eq!(result.metadata["page_number"], 9);
    }

    #[test]
    fn malformed_embedded_json_keeps_the_original_string() {
        let malformed = r#"{"page_content": X"#;
        let raw = json!({ "content": malformed });

        let result = normalize(raw).expect("result");
        assert_eq!(result.content, malformed);
        assert!(result.metadata.is_empty());
    }

    #[test]
    fn plain_mapping_is_read_through_page_content() {
        let raw = json!({
            "page_content": "Plain mapping text",
            "metadata": { "source": "doc" }
        });

        let result = normalize(raw).expect("result");
        assert_eq!(result.content, "Plain mapping text");
        assert_eq!(result.metadata["source"], "doc");
    }

    #[test]
    fn unknown_payloads_are_coerced_to_strings() {
        let result = normalize(json!("bare text")).expect("result");
        assert_eq!(result.content, "bare text");
        assert!(result.metadata.is_empty());

        let result = normalize(json!({ "unexpected": true })).expect("result");
        assert_eq!(result.content, r#"{"unexpected":true}"#);
    }

    #[test]
    fn unresolvable_records_are_dropped_not_emptied() {
        assert!(normalize(Value::Null).is_none());
        assert!(normalize(json!({ "content": "   " })).is_none());
    }

    #[test]
    fn scored_points_carry_their_score_through() {
        let point = ScoredPoint {
            id: "point-1".into(),
            score: 0.42,
            payload: Some(
                json!({ "content": "hit", "metadata": { "source_name": "doc" } })
                    .as_object()
                    .expect("object")
                    .clone(),
            ),
        };

        let result = map_scored_point(point).expect("result");
        assert_eq!(result.score, Some(0.42));
        assert_eq!(result.content, "hit");
    }

    #[test]
    fn payloadless_points_are_dropped() {
        let point = ScoredPoint {
            id: "point-2".into(),
            score: 0.1,
            payload: None,
        };
        assert!(map_scored_point(point).is_none());
    }
}
