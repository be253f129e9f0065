//! Search backend capability.
//!
//! The engine talks to whatever backend is being benchmarked through the
//! [`Searcher`] trait: one query in, a ranked list of items out. Adapters own
//! everything behind that line, including transport, query strategy, and any
//! retry policy.

use crate::dataset::FieldValue;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque backend options forwarded verbatim to every search call.
///
/// The engine never inspects these; strategy selection (hybrid, vector,
/// keyword, ...) is fixed when the adapter is constructed, and anything it
/// still needs per call travels here.
pub type SearchOptions = serde_json::Map<String, serde_json::Value>;

/// One item returned by a search, in backend order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedItem {
    /// Backend identifier for the returned item.
    pub item_id: String,
    /// The query id this item belongs to in the ground truth. Comparing it
    /// to the evaluated query's id catches backends that leak results
    /// across queries.
    pub query_id: FieldValue,
    /// Binary relevance label stored with the item (1 = relevant).
    pub relevance_label: u8,
    /// Ranking fields attached by the backend, e.g. "score", "distance",
    /// "rerank_score". Which one drives NDCG is decided by the engine's
    /// score-column preference list.
    #[serde(default)]
    pub rank_fields: HashMap<String, f64>,
}

impl RankedItem {
    /// Create an item with a single ranking field.
    pub fn new(
        item_id: impl Into<String>,
        query_id: impl Into<FieldValue>,
        relevance_label: u8,
        rank_field: impl Into<String>,
        rank_value: f64,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            query_id: query_id.into(),
            relevance_label,
            rank_fields: HashMap::from([(rank_field.into(), rank_value)]),
        }
    }
}

/// Capability contract for the search backend under evaluation.
///
/// Implementations are shared across worker tasks, so they must be cheap to
/// call concurrently. A failed call reports `EvalError::Backend`; the engine
/// contains the failure to the affected query.
#[async_trait]
pub trait Searcher: Send + Sync {
    /// Execute one search and return ranked items in backend order.
    async fn search(
        &self,
        query: &str,
        collection: &str,
        limit: usize,
        options: &SearchOptions,
    ) -> Result<Vec<RankedItem>>;
}
