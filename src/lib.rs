// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # usage-ingest
//!
//! Collects GitHub Copilot usage metrics into a raw store and extracts them
//! into normalized daily rows.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use usage_ingest::{HttpClient, MemoryStore, Pipeline, TaskScope};
//!
//! #[tokio::main]
//! async fn main() -> usage_ingest::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     let mut pipeline = Pipeline::new(HttpClient::new()?, store.clone(), store.clone());
//!
//!     let report = pipeline.run(&TaskScope::new(1, "acme")).await?;
//!     println!("{} rows", report.extract.records_extracted);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   pages    ┌───────────┐  replay   ┌───────────┐  rows   ┌──────────────┐
//! │ Usage API  │ ─────────► │ Collector │ ────────► │ Raw Store │ ──────► │  Extractor   │
//! └────────────┘            └───────────┘           └───────────┘         └──────┬───────┘
//!        ▲                    │    │                                             │
//!        └── Rate Limiter ────┘  Pager                                  ┌────────▼───────┐
//!                                                                       │  Domain Store  │
//!                                                                       └────────────────┘
//! ```
//!
//! Both stores are partitioned by [`ScopeFingerprint`], so concurrent scopes
//! never collide and re-runs overwrite instead of duplicating.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types and classification
pub mod error;

/// HTTP client and rate limiting
pub mod http;

/// Page-number pagination
pub mod pagination;

/// Task scope and scope fingerprint
pub mod scope;

/// API item shapes and domain rows
pub mod model;

/// Raw and domain storage
pub mod store;

/// Raw page collection
pub mod collector;

/// Raw page extraction
pub mod extractor;

/// Collection + extraction state machine
pub mod pipeline;

/// YAML configuration
pub mod config;

/// Template interpolation
pub mod template;

/// Arrow/Parquet output
pub mod output;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use collector::{CollectStats, Collector, CollectorConfig};
pub use config::PipelineConfig;
pub use error::{Error, ErrorKind, Result};
pub use extractor::{ExtractStats, Extractor};
pub use http::{HttpClient, HttpClientConfig, RateLimiter, RateLimiterConfig};
pub use model::{Breakdown, UsageRecord};
pub use pipeline::{Pipeline, PipelineReport, PipelineState};
pub use scope::{ScopeFingerprint, TaskScope};
pub use store::{DomainStore, DuckDbStore, MemoryStore, RawRecord, RawStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
