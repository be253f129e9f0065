//! Engine configuration.
//!
//! `EvalConfig` is an explicit value object handed to the engine at
//! construction time. There is no process-wide state: callers build the
//! config however they like (CLI flags, config files, hard-coded tests) and
//! pass it in.

use crate::error::{EvalError, Result};
use crate::searcher::SearchOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Name of the backend collection/index to search.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Maximum number of results requested per query.
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Number of parallel workers. `0` means one per available processing
    /// unit.
    #[serde(default)]
    pub workers: usize,

    /// Queries per submission batch. Bookkeeping only; has no effect on the
    /// output.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Candidate ranking fields for NDCG, in order of preference. The first
    /// field present in a query's results is used.
    #[serde(default = "default_score_columns")]
    pub score_columns: Vec<String>,

    /// Opaque options forwarded to every `Searcher::search` call.
    #[serde(default)]
    pub options: SearchOptions,

    /// Optional wall-clock budget for the whole dispatch. When it expires
    /// the run finalizes with the queries that completed in time.
    #[serde(default)]
    pub run_budget: Option<Duration>,
}

fn default_collection() -> String {
    "default".to_string()
}

fn default_limit() -> usize {
    25
}

fn default_batch_size() -> usize {
    100
}

fn default_score_columns() -> Vec<String> {
    ["rerank_score", "clip_score", "score", "distance"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            limit: default_limit(),
            workers: 0,
            batch_size: default_batch_size(),
            score_columns: default_score_columns(),
            options: SearchOptions::new(),
            run_budget: None,
        }
    }
}

impl EvalConfig {
    /// Validate that the configuration can drive a run.
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(EvalError::InvalidConfig(
                "limit must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(EvalError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Worker count to actually use: the configured value, or the number of
    /// available processing units when unset.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EvalConfig::default();
        assert_eq!(config.collection, "default");
        assert_eq!(config.limit, 25);
        assert_eq!(config.workers, 0);
        assert_eq!(config.batch_size, 100);
        assert_eq!(
            config.score_columns,
            vec!["rerank_score", "clip_score", "score", "distance"]
        );
        assert!(config.run_budget.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let config = EvalConfig {
            limit: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let config = EvalConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_workers() {
        let config = EvalConfig {
            workers: 4,
            ..Default::default()
        };
        assert_eq!(config.effective_workers(), 4);

        let config = EvalConfig::default();
        assert!(config.effective_workers() >= 1);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: EvalConfig = serde_json::from_str(r#"{"limit": 10}"#).unwrap();
        assert_eq!(config.limit, 10);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.score_columns.len(), 4);
    }
}
