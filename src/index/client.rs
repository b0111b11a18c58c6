//! HTTP client wrapper for the vector index backend.

use crate::config::get_config;
use crate::index::types::{
    CountResponse, IndexError, QueryResponse, QueryResponseResult, ScoredPoint,
};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Lightweight HTTP client for vector index operations.
///
/// Construct one per process and share it by reference; both the ingestion and the
/// query path hold the same handle, which wraps a pooled `reqwest::Client`.
pub struct VectorIndexService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl VectorIndexService {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, IndexError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("docdex/0.3")
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let base_url = validate_base_url(&config.index_url)?;

        tracing::debug!(
            url = %base_url,
            has_api_key = config.index_api_key.is_some(),
            "Initialized vector index HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.index_api_key.clone(),
        })
    }

    /// Create a collection only when it is missing from the backend.
    pub async fn create_collection_if_not_exists(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), IndexError> {
        if self.collection_exists(collection_name).await? {
            tracing::debug!(collection = collection_name, "Collection already present");
            return Ok(());
        }
        self.create_collection(collection_name, vector_size).await
    }

    /// Create or update a collection with the specified vector size.
    pub async fn create_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), IndexError> {
        let response = self
            .endpoint(Method::PUT, &format!("collections/{collection_name}"))
            .json(&json!({
                "vectors": { "size": vector_size, "distance": "Cosine" }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(unexpected_status(response).await);
        }
        tracing::info!(
            collection = collection_name,
            vector_size,
            "Collection created"
        );
        Ok(())
    }

    /// Ensure payload indexes exist for the provenance fields used in filters.
    pub async fn ensure_payload_indexes(&self, collection_name: &str) -> Result<(), IndexError> {
        let fields = [
            ("metadata.source_name", "keyword"),
            ("metadata.sequence_index", "integer"),
        ];

        for (field, schema) in fields {
            let response = self
                .endpoint(Method::PUT, &format!("collections/{collection_name}/index"))
                .json(&json!({ "field_name": field, "field_schema": schema }))
                .send()
                .await?;

            match response.status() {
                status if status.is_success() => {
                    tracing::debug!(collection = collection_name, field, "Payload index ensured");
                }
                StatusCode::CONFLICT => {
                    tracing::debug!(
                        collection = collection_name,
                        field,
                        "Payload index already exists"
                    );
                }
                _ => {
                    let error = unexpected_status(response).await;
                    tracing::warn!(collection = collection_name, field, error = %error, "Failed to ensure payload index");
                }
            }
        }

        Ok(())
    }

    /// Upsert a single vector under a caller-supplied point id.
    ///
    /// The id carries the idempotency semantics: writing the same id again replaces
    /// the stored vector and payload in one request, so a record is never half
    /// written.
    pub async fn upsert_vector(
        &self,
        collection_name: &str,
        point_id: &str,
        vector: &[f32],
        payload: &Value,
    ) -> Result<(), IndexError> {
        let response = self
            .endpoint(
                Method::PUT,
                &format!("collections/{collection_name}/points"),
            )
            .query(&[("wait", true)])
            .json(&json!({
                "points": [{ "id": point_id, "vector": vector, "payload": payload }]
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(unexpected_status(response).await);
        }
        tracing::debug!(collection = collection_name, point_id, "Vector upserted");
        Ok(())
    }

    /// Perform a similarity search against a collection, returning scored payloads.
    pub async fn search_points(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, IndexError> {
        let response = self
            .endpoint(
                Method::POST,
                &format!("collections/{collection_name}/points/query"),
            )
            .json(&json!({
                "query": vector,
                "limit": limit,
                "with_payload": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let error = unexpected_status(response).await;
            tracing::error!(collection = collection_name, error = %error, "Vector index search failed");
            return Err(error);
        }

        let decoded: QueryResponse = response.json().await?;
        let points = match decoded.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };

        Ok(points
            .into_iter()
            .map(|point| ScoredPoint {
                id: point_id_string(point.id),
                score: point.score,
                payload: point.payload,
            })
            .collect())
    }

    /// Exact count of indexed vectors, optionally scoped to one source document.
    pub async fn count_points(
        &self,
        collection_name: &str,
        source_name: Option<&str>,
    ) -> Result<usize, IndexError> {
        let body = match source_name {
            Some(source) => json!({
                "exact": true,
                "filter": {
                    "must": [
                        { "key": "metadata.source_name", "match": { "value": source } }
                    ]
                }
            }),
            None => json!({ "exact": true }),
        };

        let response = self
            .endpoint(
                Method::POST,
                &format!("collections/{collection_name}/points/count"),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error = unexpected_status(response).await;
            tracing::error!(collection = collection_name, error = %error, "Vector index count failed");
            return Err(error);
        }

        let decoded: CountResponse = response.json().await?;
        Ok(decoded.result.count)
    }

    /// Probe whether a collection is present in the backend.
    pub async fn collection_exists(&self, collection_name: &str) -> Result<bool, IndexError> {
        let response = self
            .endpoint(Method::GET, &format!("collections/{collection_name}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => {
                let error = unexpected_status(response).await;
                tracing::error!(collection = collection_name, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    fn endpoint(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut request = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            request = request.header("api-key", api_key);
        }
        request
    }
}

/// Drain a failing response into the structured error form.
async fn unexpected_status(response: reqwest::Response) -> IndexError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    IndexError::UnexpectedStatus { status, body }
}

fn validate_base_url(url: &str) -> Result<String, IndexError> {
    let mut parsed =
        reqwest::Url::parse(url).map_err(|err| IndexError::InvalidUrl(err.to_string()))?;
    let trimmed = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&trimmed);
    Ok(parsed.to_string())
}

fn point_id_string(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, Method::PUT, MockServer};

    fn service_for(server: &MockServer) -> VectorIndexService {
        VectorIndexService {
            client: Client::builder()
                .user_agent("docdex-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: None,
        }
    }

    #[tokio::test]
    async fn search_points_decodes_scored_payloads() {
        let server = MockServer::start_async().await;
        let service = service_for(&server);

        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/docs/points/query");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": [
                        {
                            "id": "point-1",
                            "score": 0.87,
                            "payload": {
                                "content": "Distilled idea.",
                                "metadata": { "source_name": "manual.pdf" }
                            }
                        }
                    ]
                }));
            })
            .await;

        let results = service
            .search_points("docs", vec![0.1, 0.2], 3)
            .await
            .expect("search request");

        mock.assert();
        assert_eq!(results.len(), 1);
        let hit = &results[0];
        assert_eq!(hit.id, "point-1");
        assert!((hit.score - 0.87).abs() < f32::EPSILON);
        let payload = hit.payload.as_ref().expect("payload");
        assert_eq!(payload["content"], Value::String("Distilled idea.".into()));
    }

    #[tokio::test]
    async fn upsert_vector_targets_points_endpoint() {
        let server = MockServer::start_async().await;
        let service = service_for(&server);

        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/docs/points")
                    .query_param("wait", "true")
                    .body_contains("\"id\":\"point-1\"");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": { "operation_id": 1, "status": "completed" }
                }));
            })
            .await;

        service
            .upsert_vector(
                "docs",
                "point-1",
                &[0.3, 0.7],
                &json!({ "content": "text" }),
            )
            .await
            .expect("upsert request");

        mock.assert();
    }

    #[tokio::test]
    async fn count_points_applies_source_filter() {
        let server = MockServer::start_async().await;
        let service = service_for(&server);

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/docs/points/count")
                    .body_contains("manual.pdf");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": { "count": 619 }
                }));
            })
            .await;

        let count = service
            .count_points("docs", Some("manual.pdf"))
            .await
            .expect("count request");

        mock.assert();
        assert_eq!(count, 619);
    }

    #[tokio::test]
    async fn unexpected_status_is_surfaced_with_body() {
        let server = MockServer::start_async().await;
        let service = service_for(&server);

        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/docs/points/query");
                then.status(500).body("backend exploded");
            })
            .await;

        let error = service
            .search_points("docs", vec![0.1], 1)
            .await
            .expect_err("error response");

        assert!(error.is_transient());
        assert!(matches!(
            error,
            IndexError::UnexpectedStatus { status, body }
                if status == StatusCode::INTERNAL_SERVER_ERROR && body.contains("exploded")
        ));
    }
}
