//! Per-file metadata profiles and the append-only analysis log.
//!
//! A profile is built once per successfully loaded file and keyed by the
//! file name (last path segment); reloading a file with the same name
//! overwrites the previous profile. Numeric summaries are computed with a
//! single lazy aggregation pass; Polars aggregations skip null cells, so
//! missing values are excluded rather than coerced to zero.

use polars::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

use crate::error::QueryError;

/// Summary statistics for one numeric column, nulls excluded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileProfile {
    pub file_name: String,
    /// Column names in declared order.
    pub columns: Vec<String>,
    /// Inferred type tags, parallel to `columns`.
    pub dtypes: Vec<String>,
    /// Numeric column name -> summary. Columns that are entirely null carry
    /// no summary.
    pub numeric: HashMap<String, ColumnSummary>,
}

impl FileProfile {
    pub fn build(file_name: &str, df: &DataFrame) -> Result<Self, QueryError> {
        let schema = df.schema();
        let mut columns = Vec::with_capacity(schema.len());
        let mut dtypes = Vec::with_capacity(schema.len());
        let mut exprs = Vec::new();

        for (name, dtype) in schema.iter() {
            columns.push(name.to_string());
            dtypes.push(dtype.to_string());
            if dtype.is_numeric() {
                let c = col(name.as_str()).cast(DataType::Float64);
                exprs.push(c.clone().mean().alias(format!("{}::mean", name)));
                exprs.push(c.clone().median().alias(format!("{}::median", name)));
                exprs.push(c.clone().min().alias(format!("{}::min", name)));
                exprs.push(c.max().alias(format!("{}::max", name)));
            }
        }

        let mut numeric = HashMap::new();
        if !exprs.is_empty() {
            let stats = df.clone().lazy().select(exprs).collect()?;
            for (name, dtype) in schema.iter() {
                if !dtype.is_numeric() {
                    continue;
                }
                let summary = (|| {
                    Some(ColumnSummary {
                        mean: scalar_f64(&stats, &format!("{}::mean", name))?,
                        median: scalar_f64(&stats, &format!("{}::median", name))?,
                        min: scalar_f64(&stats, &format!("{}::min", name))?,
                        max: scalar_f64(&stats, &format!("{}::max", name))?,
                    })
                })();
                if let Some(summary) = summary {
                    numeric.insert(name.to_string(), summary);
                }
            }
        }

        Ok(Self {
            file_name: file_name.to_string(),
            columns,
            dtypes,
            numeric,
        })
    }
}

/// Reads the first cell of a single-row aggregation result as f64.
fn scalar_f64(stats: &DataFrame, name: &str) -> Option<f64> {
    match stats.column(name).ok()?.get(0).ok()? {
        AnyValue::Float64(v) => Some(v),
        AnyValue::Float32(v) => Some(v as f64),
        _ => None,
    }
}

/// Profiles keyed by file name; never auto-deleted.
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    profiles: HashMap<String, FileProfile>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a profile, overwriting any prior profile of the same name.
    pub fn insert(&mut self, profile: FileProfile) {
        self.profiles.insert(profile.file_name.clone(), profile);
    }

    pub fn get(&self, file_name: &str) -> Option<&FileProfile> {
        self.profiles.get(file_name)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// One completed analysis: the query, what it resolved to, and its result.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRecord {
    pub file_name: String,
    pub query: String,
    pub operation: String,
    pub columns: Vec<String>,
    pub settings: serde_json::Value,
    pub result: serde_json::Value,
}

/// Append-only, unbounded, not deduplicated.
#[derive(Debug, Default)]
pub struct AnalysisLog {
    records: Vec<AnalysisRecord>,
}

impl AnalysisLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: AnalysisRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[AnalysisRecord] {
        &self.records
    }
}
