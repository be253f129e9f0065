//! End-to-end properties of the evaluation engine over scripted backends.

use anyhow::Result;
use async_trait::async_trait;
use search_eval::{
    DatasetSchema, EvalConfig, EvaluationRunner, FieldValue, RankedItem, SearchOptions, Searcher,
    TableDataset, dataset::row,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Backend scripted per query text. Unknown queries return no results,
/// queries listed in `failures` error out.
#[derive(Default)]
struct ScriptedSearcher {
    responses: HashMap<String, Vec<RankedItem>>,
    failures: Vec<String>,
}

impl ScriptedSearcher {
    fn respond(mut self, query: &str, items: Vec<RankedItem>) -> Self {
        self.responses.insert(query.to_string(), items);
        self
    }

    fn fail_on(mut self, query: &str) -> Self {
        self.failures.push(query.to_string());
        self
    }
}

#[async_trait]
impl Searcher for ScriptedSearcher {
    async fn search(
        &self,
        query: &str,
        _collection: &str,
        limit: usize,
        _options: &SearchOptions,
    ) -> search_eval::Result<Vec<RankedItem>> {
        if self.failures.iter().any(|q| q == query) {
            return Err(search_eval::EvalError::backend("simulated outage"));
        }
        let mut items = self.responses.get(query).cloned().unwrap_or_default();
        items.truncate(limit);
        Ok(items)
    }
}

/// Backend that stalls long enough to blow any test-sized run budget.
struct StalledSearcher;

#[async_trait]
impl Searcher for StalledSearcher {
    async fn search(
        &self,
        _query: &str,
        _collection: &str,
        _limit: usize,
        _options: &SearchOptions,
    ) -> search_eval::Result<Vec<RankedItem>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}

/// One row per (query, candidate) pair, the usual benchmark shape.
fn dataset_row(query: &str, id: i64, relevant: i64) -> search_eval::Row {
    row([
        ("query", query.into()),
        ("query_id", id.into()),
        ("relevant", relevant.into()),
    ])
}

fn two_query_dataset() -> TableDataset {
    TableDataset::new(
        "two-queries",
        DatasetSchema::default(),
        vec![
            dataset_row("cat", 1, 1),
            dataset_row("cat", 1, 0),
            dataset_row("dog", 2, 1),
            dataset_row("dog", 2, 1),
            dataset_row("dog", 2, 0),
        ],
    )
}

fn runner(searcher: impl Searcher + 'static, config: EvalConfig) -> EvaluationRunner {
    EvaluationRunner::new(Arc::new(searcher), config).unwrap()
}

#[tokio::test]
async fn stats_has_one_row_per_unique_query() -> Result<()> {
    let searcher = ScriptedSearcher::default()
        .respond("cat", vec![RankedItem::new("c1", 1i64, 1, "score", 0.9)]);
    let output = runner(searcher, EvalConfig::default())
        .run(Arc::new(two_query_dataset()))
        .await?;

    assert_eq!(output.stats.len(), 2);
    let mut ids: Vec<String> = output.stats.iter().map(|s| s.query_text.clone()).collect();
    ids.sort();
    assert_eq!(ids, vec!["cat", "dog"]);
    Ok(())
}

#[tokio::test]
async fn counter_invariants_hold_on_every_row() -> Result<()> {
    let searcher = ScriptedSearcher::default()
        .respond(
            "cat",
            vec![
                RankedItem::new("c1", 1i64, 1, "score", 0.9),
                RankedItem::new("d7", 2i64, 0, "score", 0.8),
                RankedItem::new("c2", 1i64, 0, "score", 0.7),
            ],
        )
        .respond("dog", vec![RankedItem::new("d1", 2i64, 1, "score", 0.6)]);
    let output = runner(searcher, EvalConfig::default())
        .run(Arc::new(two_query_dataset()))
        .await?;

    for stats in &output.stats {
        assert_eq!(
            stats.correctly_returned + stats.incorrectly_returned,
            stats.total_results
        );
        assert_eq!(
            stats.relevant_results + stats.non_relevant_results,
            stats.total_results
        );
        for rate in [stats.accuracy, stats.precision, stats.recall, stats.ndcg] {
            assert!((0.0..=1.0).contains(&rate));
        }
    }

    // The results table is the concatenation of every query's annotated items.
    let total: usize = output.stats.iter().map(|s| s.total_results).sum();
    assert_eq!(output.results.len(), total);
    Ok(())
}

#[tokio::test]
async fn cross_query_leakage_is_counted_not_dropped() -> Result<()> {
    // Backend returns a dog item for the cat query.
    let searcher = ScriptedSearcher::default().respond(
        "cat",
        vec![
            RankedItem::new("c1", 1i64, 1, "score", 0.9),
            RankedItem::new("d1", 2i64, 1, "score", 0.8),
        ],
    );
    let output = runner(searcher, EvalConfig::default())
        .run(Arc::new(two_query_dataset()))
        .await?;

    let cat = output
        .stats
        .iter()
        .find(|s| s.query_text == "cat")
        .expect("cat row");
    assert_eq!(cat.total_results, 2);
    assert_eq!(cat.correctly_returned, 1);
    assert_eq!(cat.incorrectly_returned, 1);
    assert_eq!(cat.accuracy, 0.5);
    // Both items carried a relevance label of 1.
    assert_eq!(cat.relevant_results, 2);
    Ok(())
}

// Scenario A: dataset [{q:"cat", id:1, rel:1}, {q:"cat", id:1, rel:0}],
// backend returns nothing for "cat".
#[tokio::test]
async fn scenario_zero_results() -> Result<()> {
    let dataset = TableDataset::new(
        "cat-only",
        DatasetSchema::default(),
        vec![dataset_row("cat", 1, 1), dataset_row("cat", 1, 0)],
    );
    let output = runner(ScriptedSearcher::default(), EvalConfig::default())
        .run(Arc::new(dataset))
        .await?;

    assert_eq!(output.stats.len(), 1);
    let stats = &output.stats[0];
    assert_eq!(stats.total_results, 0);
    assert_eq!(stats.precision, 0.0);
    assert_eq!(stats.recall, 0.0);
    assert_eq!(stats.ndcg, 0.0);
    assert!(output.results.is_empty());
    Ok(())
}

// Scenario B: three results with labels [1, 0, 1] and "score" values
// [0.9, 0.5, 0.8]; "rerank_score" absent. Sorting by score gives labels
// [1, 1, 0], which is the ideal ordering, so NDCG is exactly 1.0 by the
// DCG/IDCG formula.
#[tokio::test]
async fn scenario_ndcg_on_first_present_score_column() -> Result<()> {
    let dataset = TableDataset::new(
        "dog-only",
        DatasetSchema::default(),
        vec![
            dataset_row("dog", 2, 1),
            dataset_row("dog", 2, 0),
            dataset_row("dog", 2, 1),
        ],
    );
    let searcher = ScriptedSearcher::default().respond(
        "dog",
        vec![
            RankedItem::new("a", 2i64, 1, "score", 0.9),
            RankedItem::new("b", 2i64, 0, "score", 0.5),
            RankedItem::new("c", 2i64, 1, "score", 0.8),
        ],
    );
    let output = runner(searcher, EvalConfig::default())
        .run(Arc::new(dataset))
        .await?;

    let stats = &output.stats[0];
    let dcg = 1.0 / 2.0f64.log2() + 1.0 / 3.0f64.log2();
    let idcg = dcg;
    assert!((stats.ndcg - dcg / idcg).abs() < 1e-12);
    assert!((stats.ndcg - 1.0).abs() < 1e-12);
    assert_eq!(stats.secondary_ndcg, None);
    Ok(())
}

// Scenario C: the backend errors for one query; the run still completes
// with a zero row for it.
#[tokio::test]
async fn scenario_backend_error_is_contained() -> Result<()> {
    let searcher = ScriptedSearcher::default()
        .respond("cat", vec![RankedItem::new("c1", 1i64, 1, "score", 0.9)])
        .fail_on("dog");
    let output = runner(searcher, EvalConfig::default())
        .run(Arc::new(two_query_dataset()))
        .await?;

    assert_eq!(output.stats.len(), 2);
    let dog = output
        .stats
        .iter()
        .find(|s| s.query_text == "dog")
        .expect("dog row");
    assert_eq!(dog.total_results, 0);
    assert_eq!(dog.ndcg, 0.0);

    let cat = output
        .stats
        .iter()
        .find(|s| s.query_text == "cat")
        .expect("cat row");
    assert_eq!(cat.total_results, 1);
    Ok(())
}

#[tokio::test]
async fn malformed_dataset_aborts_before_dispatch() {
    let mut dataset = two_query_dataset();
    dataset.push_row(row([("query_id", 9.into()), ("relevant", 1.into())]));

    let result = runner(ScriptedSearcher::default(), EvalConfig::default())
        .run(Arc::new(dataset))
        .await;
    assert!(matches!(
        result,
        Err(search_eval::EvalError::MalformedDataset { .. })
    ));
}

// Worker count must not affect the output beyond row order.
#[tokio::test]
async fn output_is_deterministic_across_worker_counts() -> Result<()> {
    let mut rows = Vec::new();
    for id in 0..12i64 {
        let query = format!("query {id}");
        rows.push(row([
            ("query", query.clone().into()),
            ("query_id", id.into()),
            ("relevant", 1.into()),
        ]));
        rows.push(row([
            ("query", query.into()),
            ("query_id", id.into()),
            ("relevant", (id % 2).into()),
        ]));
    }
    let dataset = Arc::new(TableDataset::new(
        "many",
        DatasetSchema::default(),
        rows,
    ));

    let scripted = || {
        let mut searcher = ScriptedSearcher::default();
        for id in 0..12i64 {
            searcher = searcher.respond(
                &format!("query {id}"),
                vec![
                    RankedItem::new(format!("{id}-a"), id, 1, "score", 0.9),
                    RankedItem::new(format!("{id}-b"), id, (id % 2 == 0) as u8, "score", 0.4),
                ],
            );
        }
        searcher
    };

    let single = runner(
        scripted(),
        EvalConfig {
            workers: 1,
            ..Default::default()
        },
    )
    .run(dataset.clone())
    .await?;
    let parallel = runner(
        scripted(),
        EvalConfig {
            workers: 8,
            batch_size: 5,
            ..Default::default()
        },
    )
    .run(dataset)
    .await?;

    let sorted = |output: &search_eval::EvaluationOutput| {
        let mut stats = output.stats.clone();
        stats.sort_by(|a, b| a.query_text.cmp(&b.query_text));
        stats
    };
    assert_eq!(sorted(&single), sorted(&parallel));
    Ok(())
}

#[tokio::test]
async fn limit_truncates_backend_results() -> Result<()> {
    // One dataset row per candidate item, all relevant.
    let rows = (0..40).map(|_| dataset_row("cat", 1, 1)).collect();
    let dataset = TableDataset::new("cat-only", DatasetSchema::default(), rows);

    let items: Vec<RankedItem> = (0..40)
        .map(|i| RankedItem::new(format!("c{i}"), 1i64, 1, "score", 1.0 - i as f64 / 100.0))
        .collect();
    let searcher = ScriptedSearcher::default().respond("cat", items);
    let output = runner(searcher, EvalConfig::default())
        .run(Arc::new(dataset))
        .await?;

    // Default limit is 25, so 25 of the 40 relevant rows come back.
    assert_eq!(output.stats[0].total_results, 25);
    assert!((output.stats[0].recall - 25.0 / 40.0).abs() < 1e-12);
    Ok(())
}

#[tokio::test]
async fn metadata_columns_are_copied_verbatim() -> Result<()> {
    let schema = DatasetSchema {
        metadata_columns: vec!["category".to_string(), "supercategory".to_string()],
        ..Default::default()
    };
    let dataset = TableDataset::new(
        "with-metadata",
        schema,
        vec![row([
            ("query", "cat".into()),
            ("query_id", 1.into()),
            ("relevant", 1.into()),
            ("category", "felidae".into()),
        ])],
    );
    let output = runner(ScriptedSearcher::default(), EvalConfig::default())
        .run(Arc::new(dataset))
        .await?;

    assert_eq!(
        output.stats[0].metadata,
        vec![
            ("category".to_string(), "felidae".into()),
            // Absent in the row: carried as null, not dropped.
            ("supercategory".to_string(), FieldValue::Null),
        ]
    );
    Ok(())
}

// An expired run budget finalizes with the completed queries and never
// emits a partial row for the ones still in flight.
#[tokio::test(start_paused = true)]
async fn run_budget_abandons_stalled_queries() -> Result<()> {
    let config = EvalConfig {
        run_budget: Some(Duration::from_millis(200)),
        workers: 4,
        ..Default::default()
    };
    let output = runner(StalledSearcher, config)
        .run(Arc::new(two_query_dataset()))
        .await?;

    assert!(output.stats.is_empty());
    assert!(output.results.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn run_budget_keeps_completed_queries() -> Result<()> {
    // "cat" answers instantly, "dog" never does.
    struct HalfStalled;

    #[async_trait]
    impl Searcher for HalfStalled {
        async fn search(
            &self,
            query: &str,
            _collection: &str,
            _limit: usize,
            _options: &SearchOptions,
        ) -> search_eval::Result<Vec<RankedItem>> {
            if query == "dog" {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(vec![RankedItem::new("c1", 1i64, 1, "score", 0.9)])
        }
    }

    let config = EvalConfig {
        run_budget: Some(Duration::from_millis(200)),
        workers: 4,
        ..Default::default()
    };
    let output = runner(HalfStalled, config)
        .run(Arc::new(two_query_dataset()))
        .await?;

    assert_eq!(output.stats.len(), 1);
    assert_eq!(output.stats[0].query_text, "cat");
    assert_eq!(output.stats[0].total_results, 1);
    Ok(())
}
