//! The session owns the loaded table, its filtered view, the query history,
//! the per-file profiles, the analysis log, and the injected observer, and
//! routes resolved intents to the engines.
//!
//! Single-threaded, synchronous, one operation at a time. Every operation
//! runs to completion; every failure is recoverable and leaves the table,
//! view, and history intact. The filtered view is replaced wholesale by each
//! filter/sort/clear, never patched in place.

use polars::prelude::*;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use crate::chart::{ChartKind, PlotSpec};
use crate::engine::{self, FilterKind};
use crate::error::QueryError;
use crate::history::QueryHistory;
use crate::intent::{self, Intent};
use crate::loader::{self, FileFormat, LoadOptions};
use crate::observer::{NoopObserver, Observer};
use crate::profile::{AnalysisLog, AnalysisRecord, FileProfile, ProfileRegistry};

/// What a free-text query produced.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// Hand this to the chart collaborator along with the current view.
    Plot(PlotSpec),
    Average {
        column: String,
        value: f64,
    },
    Count {
        conditions: HashMap<String, String>,
        matches: usize,
    },
    /// Value/date pairs from the view, rows with nulls dropped.
    When {
        column: String,
        date_column: String,
        table: DataFrame,
    },
    /// No recognized keyword; the caller shows a hint.
    Unknown,
}

impl QueryOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryOutcome::Plot(_) => "plot",
            QueryOutcome::Average { .. } => "average",
            QueryOutcome::Count { .. } => "count",
            QueryOutcome::When { .. } => "when",
            QueryOutcome::Unknown => "unknown",
        }
    }

    fn result_rows(&self) -> usize {
        match self {
            QueryOutcome::Count { matches, .. } => *matches,
            QueryOutcome::When { table, .. } => table.height(),
            QueryOutcome::Average { .. } => 1,
            QueryOutcome::Plot(_) | QueryOutcome::Unknown => 0,
        }
    }
}

pub struct Session {
    source: Option<DataFrame>,
    view: Option<DataFrame>,
    file_name: Option<String>,
    history: QueryHistory,
    profiles: ProfileRegistry,
    analyses: AnalysisLog,
    observer: Box<dyn Observer>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_observer(Box::new(NoopObserver))
    }

    pub fn with_observer(observer: Box<dyn Observer>) -> Self {
        Self {
            source: None,
            view: None,
            file_name: None,
            history: QueryHistory::new(),
            profiles: ProfileRegistry::new(),
            analyses: AnalysisLog::new(),
            observer,
        }
    }

    /// Loads a table from disk, replacing the current table and view and
    /// building (or overwriting) the file's profile. On failure the session
    /// state is untouched.
    pub fn load(&mut self, path: &Path, options: &LoadOptions) -> Result<FileFormat, QueryError> {
        let started = Instant::now();
        let (df, format) = loader::load(path, options)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.profiles.insert(FileProfile::build(&file_name, &df)?);
        self.observer
            .file_loaded(&file_name, df.height(), df.width(), started.elapsed());
        self.view = Some(df.clone());
        self.source = Some(df);
        self.file_name = Some(file_name);
        Ok(format)
    }

    /// Resolves and executes a free-text query against the current view.
    ///
    /// The query is appended to history before dispatch, so malformed and
    /// unknown queries are recorded too. Fails with `NoDataLoaded` (without
    /// touching history) when nothing is loaded yet.
    pub fn run_query(&mut self, query: &str) -> Result<QueryOutcome, QueryError> {
        if self.source.is_none() {
            return Err(QueryError::NoDataLoaded);
        }
        self.history.push(query);
        let started = Instant::now();

        let resolved = {
            let source = self.source.as_ref().ok_or(QueryError::NoDataLoaded)?;
            intent::resolve(query, source.schema())
        };
        let intent = match resolved {
            Ok(intent) => intent,
            Err(e) => {
                self.observer.query_failed(query, &e.to_string());
                return Err(e);
            }
        };

        match self.dispatch(query, &intent) {
            Ok(outcome) => {
                self.observer.query_executed(
                    query,
                    intent.kind(),
                    outcome.result_rows(),
                    started.elapsed(),
                );
                Ok(outcome)
            }
            Err(e) => {
                self.observer.query_failed(query, &e.to_string());
                Err(e)
            }
        }
    }

    fn dispatch(&mut self, query: &str, intent: &Intent) -> Result<QueryOutcome, QueryError> {
        match intent {
            Intent::Unknown => Ok(QueryOutcome::Unknown),

            Intent::Plot { x, y } => {
                let kind = ChartKind::from_query(query);
                self.record_analysis(
                    query,
                    "plot",
                    vec![x.clone(), y.clone()],
                    json!({ "chart": kind.as_str() }),
                    serde_json::Value::Null,
                );
                Ok(QueryOutcome::Plot(PlotSpec {
                    x: x.clone(),
                    y: y.clone(),
                    kind,
                }))
            }

            Intent::Average { column } => {
                let view = self.view.as_ref().ok_or(QueryError::NoDataLoaded)?;
                let value = view
                    .column(column)
                    .map_err(|_| QueryError::ColumnNotFound(column.clone()))?
                    .as_materialized_series()
                    .mean()
                    .unwrap_or(f64::NAN);
                self.record_analysis(
                    query,
                    "average",
                    vec![column.clone()],
                    serde_json::Value::Null,
                    json!({ "mean": value }),
                );
                Ok(QueryOutcome::Average {
                    column: column.clone(),
                    value,
                })
            }

            Intent::Count { conditions } => {
                let view = self.view.as_ref().ok_or(QueryError::NoDataLoaded)?;
                let matches = engine::count_matching(view, conditions)?;
                self.record_analysis(
                    query,
                    "count",
                    conditions.keys().cloned().collect(),
                    json!({ "conditions": conditions }),
                    json!({ "matches": matches }),
                );
                Ok(QueryOutcome::Count {
                    conditions: conditions.clone(),
                    matches,
                })
            }

            Intent::When { column } => {
                let view = self.view.as_ref().ok_or(QueryError::NoDataLoaded)?;
                let date_column = date_column(view.schema())?;
                let table = view
                    .clone()
                    .lazy()
                    .select([col(column.as_str()), col(date_column.as_str())])
                    .drop_nulls(None)
                    .collect()?;
                self.record_analysis(
                    query,
                    "when",
                    vec![column.clone(), date_column.clone()],
                    serde_json::Value::Null,
                    json!({ "rows": table.height() }),
                );
                Ok(QueryOutcome::When {
                    column: column.clone(),
                    date_column,
                    table,
                })
            }
        }
    }

    /// Applies a single filter to the source table; the result replaces the
    /// active view. The filter type is one of greater, less, equal, contains.
    pub fn apply_filter(
        &mut self,
        column: &str,
        filter_type: &str,
        value: &str,
    ) -> Result<&DataFrame, QueryError> {
        let source = self.source.as_ref().ok_or(QueryError::NoDataLoaded)?;
        let kind: FilterKind = filter_type.parse()?;
        let started = Instant::now();
        let filtered = engine::apply_filter(source, column, kind, value)?;
        self.observer
            .data_operation("filter", filtered.height(), started.elapsed());
        Ok(self.view.insert(filtered))
    }

    /// Stable-sorts the current view by a column.
    pub fn sort_by(&mut self, column: &str, ascending: bool) -> Result<&DataFrame, QueryError> {
        let view = self.view.as_ref().ok_or(QueryError::NoDataLoaded)?;
        let started = Instant::now();
        let sorted = engine::sort_by(view, column, ascending)?;
        self.observer
            .data_operation("sort", sorted.height(), started.elapsed());
        Ok(self.view.insert(sorted))
    }

    /// Replaces the view with a full copy of the source.
    pub fn clear_filters(&mut self) -> Result<&DataFrame, QueryError> {
        let source = self.source.as_ref().ok_or(QueryError::NoDataLoaded)?;
        let started = Instant::now();
        let restored = engine::clear(source);
        self.observer
            .data_operation("clear_filters", restored.height(), started.elapsed());
        Ok(self.view.insert(restored))
    }

    /// Counts rows of the current view matching every condition.
    pub fn count_where(&self, conditions: &HashMap<String, String>) -> Result<usize, QueryError> {
        let view = self.view.as_ref().ok_or(QueryError::NoDataLoaded)?;
        engine::count_matching(view, conditions)
    }

    fn record_analysis(
        &mut self,
        query: &str,
        operation: &str,
        columns: Vec<String>,
        settings: serde_json::Value,
        result: serde_json::Value,
    ) {
        self.analyses.record(AnalysisRecord {
            file_name: self.file_name.clone().unwrap_or_default(),
            query: query.to_string(),
            operation: operation.to_string(),
            columns,
            settings,
            result,
        });
    }

    pub fn source(&self) -> Option<&DataFrame> {
        self.source.as_ref()
    }

    pub fn view(&self) -> Option<&DataFrame> {
        self.view.as_ref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn history(&self) -> &QueryHistory {
        &self.history
    }

    pub fn profile(&self, file_name: &str) -> Option<&FileProfile> {
        self.profiles.get(file_name)
    }

    pub fn analyses(&self) -> &[AnalysisRecord] {
        self.analyses.records()
    }
}

/// First column whose name contains "date", else the first temporal column.
fn date_column(schema: &Schema) -> Result<String, QueryError> {
    schema
        .iter()
        .find(|(name, _)| name.to_lowercase().contains("date"))
        .map(|(name, _)| name.to_string())
        .or_else(|| {
            schema
                .iter()
                .find(|(_, dtype)| dtype.is_temporal())
                .map(|(name, _)| name.to_string())
        })
        .ok_or_else(|| QueryError::ColumnNotFound("date".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_operation_requires_loaded_data() {
        let mut session = Session::new();
        assert!(matches!(
            session.run_query("count"),
            Err(QueryError::NoDataLoaded)
        ));
        assert!(matches!(
            session.apply_filter("a", "equal", "1"),
            Err(QueryError::NoDataLoaded)
        ));
        assert!(matches!(
            session.sort_by("a", true),
            Err(QueryError::NoDataLoaded)
        ));
        assert!(matches!(
            session.clear_filters(),
            Err(QueryError::NoDataLoaded)
        ));
        assert!(matches!(
            session.count_where(&HashMap::new()),
            Err(QueryError::NoDataLoaded)
        ));
    }

    #[test]
    fn queries_before_load_do_not_enter_history() {
        let mut session = Session::new();
        let _ = session.run_query("count");
        assert!(session.history().is_empty());
    }

    #[test]
    fn no_data_loaded_wins_over_bad_filter_type() {
        let mut session = Session::new();
        let err = session.apply_filter("a", "between", "1").unwrap_err();
        assert!(matches!(err, QueryError::NoDataLoaded));
    }

    #[test]
    fn date_column_prefers_name_then_dtype() {
        let df = df!(
            "Event" => ["a"],
            "ShipDate" => ["2021-01-01"],
        )
        .unwrap();
        assert_eq!(date_column(df.schema()).unwrap(), "ShipDate");

        let df = df!("Event" => ["a"], "Qty" => [1i64]).unwrap();
        assert!(matches!(
            date_column(df.schema()),
            Err(QueryError::ColumnNotFound(_))
        ));
    }
}
