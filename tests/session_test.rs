use datask::{ChartKind, LoadOptions, QueryError, QueryOutcome, Session};
use std::collections::HashMap;

mod common;

fn loaded_session(dir: &std::path::Path) -> Session {
    let path = common::write_sample_csv(dir);
    let mut session = Session::new();
    session.load(&path, &LoadOptions::default()).unwrap();
    session
}

#[test]
fn load_populates_table_view_and_profile() {
    let dir = tempfile::tempdir().unwrap();
    let session = loaded_session(dir.path());

    let source = session.source().unwrap();
    assert_eq!(source.shape(), (6, 4));
    assert!(session.view().unwrap().equals(source));
    assert_eq!(session.file_name(), Some("sales.csv"));

    let profile = session.profile("sales.csv").unwrap();
    assert_eq!(
        profile.columns,
        vec!["Region", "Status", "Price", "OrderDate"]
    );
    let price = profile.numeric.get("Price").unwrap();
    assert!((price.mean - 884.0 / 6.0).abs() < 1e-9);
    assert_eq!(price.median, 124.5);
    assert_eq!(price.min, 45.0);
    assert_eq!(price.max, 310.0);
}

#[test]
fn unsupported_extension_fails_before_touching_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.parquet");
    std::fs::write(&path, "not really parquet").unwrap();

    let mut session = Session::new();
    let err = session.load(&path, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, QueryError::UnsupportedFileFormat(_)));
    assert!(session.source().is_none());
    assert!(session.profile("data.parquet").is_none());
}

#[test]
fn filter_then_clear_restores_original_rows_and_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = loaded_session(dir.path());

    let filtered = session.apply_filter("Price", "greater", "100").unwrap();
    assert_eq!(filtered.height(), 3); // 150, 200, 310

    let restored = session.clear_filters().unwrap().clone();
    assert!(restored.equals(session.source().unwrap()));
}

#[test]
fn filter_on_text_column_falls_back_to_raw_comparison() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = loaded_session(dir.path());

    // Lexicographic comparison, no type error.
    let filtered = session.apply_filter("Region", "greater", "East").unwrap();
    assert_eq!(filtered.height(), 4); // West x3 + North
}

#[test]
fn contains_filter_is_case_insensitive() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = loaded_session(dir.path());
    let filtered = session.apply_filter("Region", "contains", "west").unwrap();
    assert_eq!(filtered.height(), 3);
}

#[test]
fn invalid_filter_type_leaves_view_intact() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = loaded_session(dir.path());
    let err = session.apply_filter("Price", "between", "1").unwrap_err();
    assert!(matches!(err, QueryError::InvalidFilterType(_)));
    assert_eq!(session.view().unwrap().height(), 6);
}

#[test]
fn sort_is_stable_and_reversible() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = loaded_session(dir.path());

    let sorted = session.sort_by("Status", true).unwrap();
    let prices: Vec<i64> = sorted
        .column("Price")
        .unwrap()
        .i64()
        .unwrap()
        .into_no_null_iter()
        .collect();
    // Active rows keep their source order, then Closed rows keep theirs.
    assert_eq!(prices, vec![150, 80, 200, 310, 99, 45]);

    let descending = session.sort_by("Price", false).unwrap();
    let mut prices: Vec<i64> = descending
        .column("Price")
        .unwrap()
        .i64()
        .unwrap()
        .into_no_null_iter()
        .collect();
    assert_eq!(prices[0], 310);
    prices.sort_unstable();
    assert_eq!(prices, vec![45, 80, 99, 150, 200, 310]);
}

#[test]
fn average_query_computes_mean_over_the_view() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = loaded_session(dir.path());

    let outcome = session.run_query("average of Price").unwrap();
    let QueryOutcome::Average { column, value } = outcome else {
        panic!("expected average outcome");
    };
    assert_eq!(column, "Price");
    assert!((value - 884.0 / 6.0).abs() < 1e-9);

    // Averaging respects the active filtered view.
    session.apply_filter("Region", "equal", "West").unwrap();
    let outcome = session.run_query("average of Price").unwrap();
    let QueryOutcome::Average { value, .. } = outcome else {
        panic!("expected average outcome");
    };
    assert!((value - 660.0 / 3.0).abs() < 1e-9); // 150 + 200 + 310
}

#[test]
fn count_query_matches_spec_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = loaded_session(dir.path());

    let outcome = session
        .run_query("count where Region=West and Status=Active")
        .unwrap();
    let QueryOutcome::Count {
        conditions,
        matches,
    } = outcome
    else {
        panic!("expected count outcome");
    };
    assert_eq!(matches, 3);
    assert_eq!(conditions.get("Region").map(String::as_str), Some("West"));
    assert_eq!(conditions.get("Status").map(String::as_str), Some("Active"));
}

#[test]
fn count_without_conditions_counts_every_row() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = loaded_session(dir.path());
    assert_eq!(session.count_where(&HashMap::new()).unwrap(), 6);

    let outcome = session.run_query("how many").unwrap();
    let QueryOutcome::Count { matches, .. } = outcome else {
        panic!("expected count outcome");
    };
    assert_eq!(matches, 6);
}

#[test]
fn plot_query_resolves_columns_and_chart_kind() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = loaded_session(dir.path());

    let outcome = session.run_query("plot with Region and Price").unwrap();
    let QueryOutcome::Plot(spec) = outcome else {
        panic!("expected plot outcome");
    };
    assert_eq!(spec.x, "Region");
    assert_eq!(spec.y, "Price");
    assert_eq!(spec.kind, ChartKind::Bar);

    let outcome = session
        .run_query("scatter plot with Price and Price")
        .unwrap();
    let QueryOutcome::Plot(spec) = outcome else {
        panic!("expected plot outcome");
    };
    assert_eq!(spec.kind, ChartKind::Scatter);
}

#[test]
fn when_query_pairs_values_with_the_date_column() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = loaded_session(dir.path());

    let outcome = session.run_query("when Status").unwrap();
    let QueryOutcome::When {
        column,
        date_column,
        table,
    } = outcome
    else {
        panic!("expected when outcome");
    };
    assert_eq!(column, "Status");
    assert_eq!(date_column, "OrderDate");
    assert_eq!(table.shape(), (6, 2));
}

#[test]
fn failed_queries_keep_state_intact_and_enter_history() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = loaded_session(dir.path());

    let err = session.run_query("plot with Price").unwrap_err();
    assert!(matches!(err, QueryError::MalformedQuery(_)));
    // Table and view untouched; the failed query is still in history.
    assert_eq!(session.view().unwrap().height(), 6);
    let entries: Vec<&str> = session.history().entries().collect();
    assert_eq!(entries, vec!["plot with Price"]);

    // Immediate retry works.
    assert!(session.run_query("plot with Price and Region").is_ok());
}

#[test]
fn history_keeps_the_last_twenty_queries_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = loaded_session(dir.path());

    for i in 0..25 {
        session.run_query(&format!("count where Price={}", i)).unwrap();
    }
    assert_eq!(session.history().len(), 20);
    let entries: Vec<&str> = session.history().entries().collect();
    assert_eq!(entries[0], "count where Price=5");
    assert_eq!(entries[19], "count where Price=24");
}

#[test]
fn analyses_are_recorded_per_completed_query() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = loaded_session(dir.path());

    session.run_query("average of Price").unwrap();
    session
        .run_query("count where Region=West and Status=Active")
        .unwrap();
    session.run_query("no keywords here").unwrap(); // unknown: not recorded

    let records = session.analyses();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].operation, "average");
    assert_eq!(records[0].columns, vec!["Price"]);
    assert_eq!(records[0].file_name, "sales.csv");
    assert_eq!(records[1].operation, "count");
    assert_eq!(records[1].result["matches"], 3);
}

#[test]
fn reloading_a_file_overwrites_its_profile() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_sample_csv(dir.path());
    let mut session = Session::new();
    session.load(&path, &LoadOptions::default()).unwrap();
    session.load(&path, &LoadOptions::default()).unwrap();
    assert!(session.profile("sales.csv").is_some());
}
