//! search-eval - retrieval-quality evaluation for pluggable search backends.
//!
//! Given a labeled benchmark dataset and a search backend, this crate issues
//! every unique query once, joins the returned items against the ground
//! truth, and computes per-query ranking metrics: precision, recall,
//! accuracy, and NDCG. Queries run concurrently on a bounded worker pool;
//! a failing query degrades to a zero-metric row instead of aborting the
//! run, and the aggregate output is independent of scheduling order.
//!
//! # Overview
//!
//! The engine only knows two capabilities:
//! - a [`Searcher`], which turns one query into a ranked item list
//!   (implemented by your backend adapter), and
//! - a [`Dataset`], an immutable table of rows with query text, query id,
//!   and binary relevance labels.
//!
//! Everything around those seams (backend clients, dataset acquisition,
//! result persistence, CLI) belongs to the caller.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use search_eval::{
//!     EvalConfig, EvaluationRunner, RankedItem, Result, SearchOptions, Searcher,
//!     sample_dataset,
//! };
//!
//! struct MyBackend;
//!
//! #[async_trait]
//! impl Searcher for MyBackend {
//!     async fn search(
//!         &self,
//!         _query: &str,
//!         _collection: &str,
//!         _limit: usize,
//!         _options: &SearchOptions,
//!     ) -> Result<Vec<RankedItem>> {
//!         // Call your vector database / search service here.
//!         Ok(Vec::new())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let runner = EvaluationRunner::new(Arc::new(MyBackend), EvalConfig::default())?;
//!     let output = runner.run(Arc::new(sample_dataset())).await?;
//!
//!     for stats in &output.stats {
//!         println!(
//!             "{}: precision {:.2}, recall {:.2}, ndcg {:.2}",
//!             stats.query_text, stats.precision, stats.recall, stats.ndcg
//!         );
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Dataset / deduplication**: row model, schema, and the unique-query
//!   reduction ([`dataset`])
//! - **Searcher**: the backend capability contract ([`searcher`])
//! - **Metrics**: pure NDCG/precision/recall/accuracy ([`metrics`])
//! - **QueryEvaluator**: one query end to end ([`evaluator`])
//! - **EvaluationRunner**: bounded-parallel dispatch and aggregation
//!   ([`runner`])

pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluator;
pub mod metrics;
pub mod runner;
pub mod searcher;

// Re-export commonly used types
pub use config::EvalConfig;
pub use dataset::{
    Dataset, DatasetSchema, FieldValue, QueryRecord, Row, TableDataset, sample_dataset,
    unique_queries,
};
pub use error::{EvalError, Result};
pub use evaluator::{QueryEvaluator, QueryStats, ResultRow};
pub use runner::{EvaluationOutput, EvaluationRunner};
pub use searcher::{RankedItem, SearchOptions, Searcher};
