//! Vector index integration.
//!
//! The backend is consumed as an opaque upsert-and-query service over HTTP. Index and
//! endpoint lifecycle beyond collection bootstrap is owned by the deployment, not by
//! this crate.

pub mod client;
pub mod payload;
pub mod types;

pub use client::VectorIndexService;
pub use payload::{build_payload, point_id_for};
pub use types::{IndexError, IndexHealthSnapshot, ScoredPoint};
