use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration shared by the ingestion and query paths.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the vector index backend.
    pub index_url: String,
    /// Collection that holds the document vectors.
    pub index_collection: String,
    /// Optional API key required to access the vector index.
    pub index_api_key: Option<String>,
    /// Optional base URL override for the embedding service.
    pub embedding_url: Option<String>,
    /// Embedding model identifier passed to the service.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Optional base URL override for the summarization service.
    pub summarizer_url: Option<String>,
    /// Generative model used to distill units into search representations.
    pub summarizer_model: String,
    /// Maximum concurrent enrich-and-upsert workers per ingestion run.
    pub ingest_concurrency: usize,
    /// Bounded attempt budget for transient index errors.
    pub ingest_retry_limit: usize,
    /// Upper bound applied to caller-supplied search limits.
    pub search_max_results: usize,
    /// Path of the persisted upsert ledger, when the backend lacks native dedup.
    pub ledger_path: Option<PathBuf>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

const DEFAULT_INGEST_CONCURRENCY: usize = 4;
const DEFAULT_INGEST_RETRY_LIMIT: usize = 3;
const DEFAULT_SEARCH_MAX_RESULTS: usize = 20;

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            index_url: load_env("VECTOR_INDEX_URL")?,
            index_collection: load_env("VECTOR_INDEX_COLLECTION")?,
            index_api_key: load_env_optional("VECTOR_INDEX_API_KEY"),
            embedding_url: load_env_optional("EMBEDDING_URL"),
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: load_env("EMBEDDING_DIMENSION")?
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()))?,
            summarizer_url: load_env_optional("SUMMARIZER_URL"),
            summarizer_model: load_env("SUMMARIZER_MODEL")?,
            ingest_concurrency: parse_optional("INGEST_CONCURRENCY", DEFAULT_INGEST_CONCURRENCY)?
                .max(1),
            ingest_retry_limit: parse_optional("INGEST_RETRY_LIMIT", DEFAULT_INGEST_RETRY_LIMIT)?
                .max(1),
            search_max_results: parse_optional("SEARCH_MAX_RESULTS", DEFAULT_SEARCH_MAX_RESULTS)?
                .max(1),
            ledger_path: load_env_optional("LEDGER_PATH").map(PathBuf::from),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional(key: &str, default: usize) -> Result<usize, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|value| value.unwrap_or(default))
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        index_url = %config.index_url,
        collection = %config.index_collection,
        embedding_model = %config.embedding_model,
        summarizer_model = %config.summarizer_model,
        concurrency = config.ingest_concurrency,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
