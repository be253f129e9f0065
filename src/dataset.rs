//! Dataset capability and query deduplication.
//!
//! A dataset is an ordered sequence of rows, each a mapping of field name to
//! scalar value, plus a schema naming the query-text, query-id, relevance,
//! and metadata columns. Benchmark datasets typically carry one row per
//! (query, candidate item) pair, so the same query text repeats; the engine
//! evaluates each distinct query text exactly once.

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

/// A scalar cell value in a dataset row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl FieldValue {
    /// Truthiness used for relevance labels: 0, 0.0, false, null, and the
    /// empty string are falsy, everything else is truthy.
    pub fn truthy(&self) -> bool {
        match self {
            FieldValue::Null => false,
            FieldValue::Bool(b) => *b,
            FieldValue::Int(i) => *i != 0,
            FieldValue::Float(f) => *f != 0.0,
            FieldValue::Str(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Str(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Str(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// One dataset row.
pub type Row = HashMap<String, FieldValue>;

/// Field names the engine reads from each row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSchema {
    /// Column holding the query text.
    pub query_column: String,
    /// Column holding the query identifier.
    pub query_id_column: String,
    /// Column holding the binary relevance label.
    pub relevance_column: String,
    /// Columns copied verbatim into statistics rows.
    #[serde(default)]
    pub metadata_columns: Vec<String>,
}

impl Default for DatasetSchema {
    fn default() -> Self {
        Self {
            query_column: "query".to_string(),
            query_id_column: "query_id".to_string(),
            relevance_column: "relevant".to_string(),
            metadata_columns: Vec::new(),
        }
    }
}

/// Read-only dataset capability shared by all workers for one run.
pub trait Dataset: Send + Sync {
    /// Field names for query text, query id, relevance, and metadata.
    fn schema(&self) -> &DatasetSchema;

    /// Ordered rows of the dataset.
    fn rows(&self) -> &[Row];
}

/// In-memory dataset backed by a vector of rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDataset {
    /// Dataset name (for diagnostics and saved files).
    pub name: String,
    schema: DatasetSchema,
    rows: Vec<Row>,
}

impl TableDataset {
    /// Create a dataset from rows already in memory.
    pub fn new(name: impl Into<String>, schema: DatasetSchema, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            schema,
            rows,
        }
    }

    /// Append a row.
    pub fn push_row(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Number of rows in the dataset.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get a subset of rows (for quick testing).
    pub fn take(&self, n: usize) -> Self {
        Self {
            name: self.name.clone(),
            schema: self.schema.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Load from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
        let dataset: TableDataset = serde_json::from_str(&content)?;
        Ok(dataset)
    }

    /// Save to a JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| EvalError::io(path, e))?;
        Ok(())
    }
}

impl Dataset for TableDataset {
    fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    fn rows(&self) -> &[Row] {
        &self.rows
    }
}

/// One unique query, derived from the first dataset row carrying its text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    /// Identifier shared by all ground-truth rows for this query.
    pub query_id: FieldValue,
    /// The query text sent to the backend.
    pub query_text: String,
    /// Configured metadata fields, in schema order.
    pub metadata: Vec<(String, FieldValue)>,
}

/// Reduce the dataset to its unique queries, in first-occurrence order.
///
/// Every row must expose the query-text and query-id fields; a row missing
/// either is a `MalformedDataset` error rather than being silently skipped.
/// Metadata columns are optional per row and read as null when absent.
pub fn unique_queries(dataset: &dyn Dataset) -> Result<Vec<QueryRecord>> {
    let schema = dataset.schema();
    let mut seen: HashSet<String> = HashSet::new();
    let mut records = Vec::new();

    for (idx, row) in dataset.rows().iter().enumerate() {
        let query_text = row
            .get(&schema.query_column)
            .ok_or_else(|| EvalError::MalformedDataset {
                row: idx,
                field: schema.query_column.clone(),
            })?
            .to_string();
        let query_id = row
            .get(&schema.query_id_column)
            .ok_or_else(|| EvalError::MalformedDataset {
                row: idx,
                field: schema.query_id_column.clone(),
            })?
            .clone();

        if seen.insert(query_text.clone()) {
            let metadata = schema
                .metadata_columns
                .iter()
                .map(|col| {
                    (
                        col.clone(),
                        row.get(col).cloned().unwrap_or(FieldValue::Null),
                    )
                })
                .collect();
            records.push(QueryRecord {
                query_id,
                query_text,
                metadata,
            });
        }
    }

    Ok(records)
}

/// Count the relevant rows for one query id across the whole dataset.
///
/// This is the recall denominator: it covers every ground-truth row for the
/// query, not just the rows the backend returned. Missing relevance cells
/// count as not relevant.
pub fn relevant_in_dataset(dataset: &dyn Dataset, query_id: &FieldValue) -> usize {
    let schema = dataset.schema();
    dataset
        .rows()
        .iter()
        .filter(|row| row.get(&schema.query_id_column) == Some(query_id))
        .filter(|row| {
            row.get(&schema.relevance_column)
                .map(FieldValue::truthy)
                .unwrap_or(false)
        })
        .count()
}

/// Build a row from (field, value) pairs. Convenience for fixtures and tests.
pub fn row(fields: impl IntoIterator<Item = (&'static str, FieldValue)>) -> Row {
    fields
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Create a small labeled dataset for quick experiments and tests.
///
/// Two unique queries with one row per candidate item, mirroring the shape
/// of real benchmark datasets.
pub fn sample_dataset() -> TableDataset {
    let schema = DatasetSchema {
        metadata_columns: vec!["category".to_string()],
        ..Default::default()
    };

    let rows = vec![
        row([
            ("query", "red fox in snow".into()),
            ("query_id", 1.into()),
            ("relevant", 1.into()),
            ("category", "mammal".into()),
        ]),
        row([
            ("query", "red fox in snow".into()),
            ("query_id", 1.into()),
            ("relevant", 0.into()),
            ("category", "mammal".into()),
        ]),
        row([
            ("query", "barn owl at night".into()),
            ("query_id", 2.into()),
            ("relevant", 1.into()),
            ("category", "bird".into()),
        ]),
        row([
            ("query", "barn owl at night".into()),
            ("query_id", 2.into()),
            ("relevant", 1.into()),
            ("category", "bird".into()),
        ]),
    ];

    TableDataset::new("sample", schema, rows)
}
