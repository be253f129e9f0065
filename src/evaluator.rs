//! Per-query evaluation.
//!
//! A [`QueryEvaluator`] runs one query against the backend, joins the
//! returned items with the ground truth, and produces a statistics row plus
//! an annotated result table. It is the unit of concurrent work: it never
//! fails, and a backend error degrades to a zero-metric row for that query
//! alone.

use crate::config::EvalConfig;
use crate::dataset::{Dataset, FieldValue, QueryRecord, relevant_in_dataset};
use crate::error::{EvalError, Result};
use crate::metrics;
use crate::searcher::{RankedItem, Searcher};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A ranked item annotated with the query it was retrieved for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    /// Id of the query this search was issued for.
    pub queried_on_id: FieldValue,
    /// Text of the query this search was issued for.
    pub queried_on_query: String,
    /// The item as the backend returned it.
    pub item: RankedItem,
}

/// Statistics for one unique query. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStats {
    /// Query identifier.
    pub query_id: FieldValue,
    /// Query text.
    pub query_text: String,
    /// Results returned by the backend.
    pub total_results: usize,
    /// Results whose own query id matches the evaluated query.
    pub correctly_returned: usize,
    /// Results belonging to some other query.
    pub incorrectly_returned: usize,
    /// Results labeled relevant.
    pub relevant_results: usize,
    /// Results labeled not relevant.
    pub non_relevant_results: usize,
    /// `correctly_returned / total_results`.
    pub accuracy: f64,
    /// `relevant_results / total_results`.
    pub precision: f64,
    /// `relevant_results / relevant rows in the whole dataset`.
    pub recall: f64,
    /// NDCG over the preferred ranking field.
    pub ndcg: f64,
    /// NDCG over the next available ranking field. `None` when the results
    /// expose no second field; a legitimate 0.0 is still reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_ndcg: Option<f64>,
    /// Configured metadata fields copied from the query record.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<(String, FieldValue)>,
}

impl QueryStats {
    /// Stats row for a query that produced no usable results.
    fn zeroed(record: &QueryRecord) -> Self {
        Self {
            query_id: record.query_id.clone(),
            query_text: record.query_text.clone(),
            total_results: 0,
            correctly_returned: 0,
            incorrectly_returned: 0,
            relevant_results: 0,
            non_relevant_results: 0,
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            ndcg: 0.0,
            secondary_ndcg: None,
            metadata: record.metadata.clone(),
        }
    }
}

/// Evaluates a single query against the backend and the ground truth.
pub struct QueryEvaluator {
    searcher: Arc<dyn Searcher>,
    config: Arc<EvalConfig>,
}

impl QueryEvaluator {
    /// Create an evaluator sharing the run's searcher and configuration.
    pub fn new(searcher: Arc<dyn Searcher>, config: Arc<EvalConfig>) -> Self {
        Self { searcher, config }
    }

    /// Evaluate one query.
    ///
    /// Infallible by design: backend errors are logged and produce the same
    /// all-zero row as an empty result set, keeping one stats row per
    /// dispatched query.
    pub async fn evaluate(
        &self,
        record: &QueryRecord,
        dataset: &dyn Dataset,
    ) -> (Vec<ResultRow>, QueryStats) {
        tracing::debug!(
            query_id = %record.query_id,
            query = %record.query_text,
            "evaluating query"
        );

        let items = match self
            .searcher
            .search(
                &record.query_text,
                &self.config.collection,
                self.config.limit,
                &self.config.options,
            )
            .await
        {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(query_id = %record.query_id, error = %e, "query failed");
                Vec::new()
            }
        };

        if items.is_empty() {
            tracing::debug!(query_id = %record.query_id, "no results returned");
            return (Vec::new(), QueryStats::zeroed(record));
        }

        let total_results = items.len();
        let correctly_returned = items
            .iter()
            .filter(|item| item.query_id == record.query_id)
            .count();
        let relevant_results = items
            .iter()
            .filter(|item| item.relevance_label != 0)
            .count();
        let relevant_total = relevant_in_dataset(dataset, &record.query_id);

        let (ndcg, secondary_ndcg) = self.compute_ndcg(record, &items);

        let stats = QueryStats {
            query_id: record.query_id.clone(),
            query_text: record.query_text.clone(),
            total_results,
            correctly_returned,
            incorrectly_returned: total_results - correctly_returned,
            relevant_results,
            non_relevant_results: total_results - relevant_results,
            accuracy: metrics::accuracy(correctly_returned, total_results),
            precision: metrics::precision(relevant_results, total_results),
            recall: metrics::recall(relevant_results, relevant_total),
            ndcg,
            secondary_ndcg,
            metadata: record.metadata.clone(),
        };

        let rows = items
            .into_iter()
            .map(|item| ResultRow {
                queried_on_id: record.query_id.clone(),
                queried_on_query: record.query_text.clone(),
                item,
            })
            .collect();

        (rows, stats)
    }

    /// Primary and secondary NDCG over the configured score-column
    /// preference list.
    ///
    /// The primary uses the first column present in at least one item; the
    /// secondary the first different present column, `None` when there is no
    /// second. Ill-formed ranking values degrade to 0.0 for this query.
    fn compute_ndcg(&self, record: &QueryRecord, items: &[RankedItem]) -> (f64, Option<f64>) {
        let mut present = self
            .config
            .score_columns
            .iter()
            .filter(|col| items.iter().any(|item| item.rank_fields.contains_key(*col)));

        let primary = match present.next() {
            Some(col) => self.ndcg_on_column(record, items, col),
            None => 0.0,
        };
        let secondary = present
            .next()
            .map(|col| self.ndcg_on_column(record, items, col));

        (primary, secondary)
    }

    fn ndcg_on_column(&self, record: &QueryRecord, items: &[RankedItem], column: &str) -> f64 {
        match ranking_scores(items, column) {
            Ok(scores) => {
                let labels: Vec<f64> = items
                    .iter()
                    .map(|item| f64::from(item.relevance_label))
                    .collect();
                metrics::ndcg(&labels, &scores)
            }
            Err(e) => {
                tracing::warn!(
                    query_id = %record.query_id,
                    column,
                    error = %e,
                    "falling back to NDCG 0.0"
                );
                0.0
            }
        }
    }
}

/// Extract one ranking field from every item.
///
/// The column is known to exist on at least one item; an item missing it,
/// or carrying a non-finite value, makes the ranking ill-formed for this
/// query.
fn ranking_scores(items: &[RankedItem], column: &str) -> Result<Vec<f64>> {
    items
        .iter()
        .map(|item| match item.rank_fields.get(column) {
            Some(v) if v.is_finite() => Ok(*v),
            Some(v) => Err(EvalError::Computation(format!(
                "non-finite value {v} in ranking field '{column}'"
            ))),
            None => Err(EvalError::Computation(format!(
                "item '{}' is missing ranking field '{column}'",
                item.item_id
            ))),
        })
        .collect()
}
