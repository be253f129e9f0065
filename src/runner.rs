//! Evaluation dispatch and aggregation.
//!
//! The runner fans the unique-query set out over a bounded pool of worker
//! tasks and collects every completion through a single channel, so the only
//! cross-worker mutable state is owned by the collector loop. Row order in
//! the output is whatever completion order the scheduler produced; consumers
//! that need a stable order sort on `query_id` themselves.

use crate::config::EvalConfig;
use crate::dataset::{Dataset, unique_queries};
use crate::error::Result;
use crate::evaluator::{QueryEvaluator, QueryStats, ResultRow};
use crate::searcher::Searcher;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::time::Instant;

/// The two tables produced by a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationOutput {
    /// Every returned item, annotated with its originating query.
    pub results: Vec<ResultRow>,
    /// One statistics row per completed unique query.
    pub stats: Vec<QueryStats>,
}

/// Runs the evaluation over a dataset with bounded parallelism.
pub struct EvaluationRunner {
    searcher: Arc<dyn Searcher>,
    config: Arc<EvalConfig>,
}

impl EvaluationRunner {
    /// Create a runner. Fails if the configuration is invalid.
    pub fn new(searcher: Arc<dyn Searcher>, config: EvalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            searcher,
            config: Arc::new(config),
        })
    }

    /// Evaluate every unique query in the dataset.
    ///
    /// Fatal only on dataset-structure errors, raised before any query is
    /// dispatched. Per-query failures are contained by the evaluator and
    /// show up as zero-valued statistics rows. An empty dataset yields
    /// empty outputs.
    pub async fn run(&self, dataset: Arc<dyn Dataset>) -> Result<EvaluationOutput> {
        let records = unique_queries(dataset.as_ref())?;
        if records.is_empty() {
            tracing::debug!("dataset has no queries, nothing to evaluate");
            return Ok(EvaluationOutput::default());
        }

        let total = records.len();
        let workers = self.config.effective_workers();
        let deadline = self.config.run_budget.map(|budget| Instant::now() + budget);
        tracing::debug!(queries = total, workers, "starting evaluation");

        let semaphore = Arc::new(Semaphore::new(workers));
        let (tx, rx) = mpsc::channel::<(Vec<ResultRow>, QueryStats)>(total);

        // Batches are submission bookkeeping only; every query is its own
        // unit of work.
        let mut queue = records.into_iter();
        let mut batch_index = 0usize;
        loop {
            let batch: Vec<_> = queue.by_ref().take(self.config.batch_size).collect();
            if batch.is_empty() {
                break;
            }
            batch_index += 1;
            tracing::debug!(batch = batch_index, size = batch.len(), "submitting batch");

            for record in batch {
                let semaphore = Arc::clone(&semaphore);
                let tx = tx.clone();
                let dataset = Arc::clone(&dataset);
                let evaluator =
                    QueryEvaluator::new(Arc::clone(&self.searcher), Arc::clone(&self.config));

                tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire().await else {
                        return;
                    };
                    let outcome = evaluator.evaluate(&record, dataset.as_ref()).await;
                    // The receiver is gone once the run budget expires;
                    // dropping the completed outcome is the intended
                    // abandonment.
                    let _ = tx.send(outcome).await;
                });
            }
        }
        drop(tx);

        let output = collect(rx, total, deadline).await;
        tracing::debug!(
            queries = output.stats.len(),
            results = output.results.len(),
            "evaluation finished"
        );
        Ok(output)
    }

}

/// Drain worker completions into the two output tables.
///
/// Single consumer: no worker ever touches the collections directly. A
/// stats row is appended only once its query fully completed, so an
/// expired budget can drop queries but never truncate rows.
async fn collect(
    mut rx: mpsc::Receiver<(Vec<ResultRow>, QueryStats)>,
    total: usize,
    deadline: Option<Instant>,
) -> EvaluationOutput {
    let mut output = EvaluationOutput {
        results: Vec::new(),
        stats: Vec::with_capacity(total),
    };

    loop {
        let next = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(next) => next,
                Err(_) => {
                    tracing::warn!(
                        completed = output.stats.len(),
                        abandoned = total - output.stats.len(),
                        "run budget exhausted, finalizing with completed queries"
                    );
                    break;
                }
            },
            None => rx.recv().await,
        };

        match next {
            Some((rows, stats)) => {
                output.results.extend(rows);
                output.stats.push(stats);
            }
            None => break,
        }
    }

    output
}
