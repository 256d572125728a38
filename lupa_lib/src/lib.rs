//! Ingestion library for Câmara dos Deputados open data.
//!
//! Wires the `camara_api` transport crate to a SQLite store: per-record
//! schema validation with dead-letter capture, idempotent batch upserts,
//! and a windowed, rate-limited fetch orchestrator.

pub mod db;
pub mod fetch;
pub mod ingest;
pub mod model;
pub mod validate;

pub use camara_api;

pub use db::{Db, DbError, DeadLetterRow};
pub use fetch::{FetchConfig, FetchError, Fetcher};
pub use ingest::{BatchSummary, Ingestor};
pub use validate::{RejectKind, Rejection};
