//! HTTP client for the Câmara dos Deputados Dados Abertos API.
//!
//! Provides a rate-limited, retrying GET client ([`Client`]) and typed
//! accessors for each upstream resource ([`CamaraExtractor`]). Payloads
//! are returned as raw `serde_json::Value` records; schema validation is
//! the ingestion layer's job.

mod client;
mod errors;
mod extractor;
pub mod pacing;
pub mod query;

pub use client::{Client, RetryConfig, DEFAULT_BASE_URL};
pub use errors::Error;
pub use extractor::CamaraExtractor;
pub use pacing::RequestPacer;
pub use query::{BillQuery, ExpenseQuery, LegislatorQuery, Query, RollCallQuery, SortDirection};
