//! gcd-extract - Grand Comics Database extraction engine
//!
//! Streams the issue/story join of a GCD database dump and writes one
//! document per row, either into a search index or into snapshot-partitioned
//! Parquet files.
//!
//! # Example
//!
//! ```ignore
//! use gcd_core::ProgressContext;
//! use gcd_extract::{ExtractConfig, OutputFormat, run};
//!
//! let config = ExtractConfig {
//!     snapshot_date: "2021-03-05".into(),
//!     format: OutputFormat::Parquet,
//!     ..Default::default()
//! };
//!
//! let summary = run(&config, &ProgressContext::new())?;
//! println!("Wrote {} documents", summary.documents);
//! ```

pub mod assembler;
pub mod catalog;
pub mod config;
pub mod credit;
pub mod document;
pub mod mapper;
pub mod runner;
pub mod schema;
pub mod sink;
pub mod snapshot;
pub mod source;

// Re-exports
pub use config::{
    CompressionKind, DatabaseConfig, DatabaseKind, ExtractConfig, IndexConfig, OutputFormat,
    ParquetConfig,
};
pub use document::{Document, FIELDS, Value};
pub use runner::{ExtractSummary, run, run_with_source};
pub use schema::SchemaProfile;
pub use snapshot::Snapshot;
pub use source::GcdSource;
