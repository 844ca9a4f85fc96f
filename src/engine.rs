//! Filtering, sorting, and conditional counting over an in-memory table.
//!
//! Every operation takes a table by reference and returns a new one; the
//! source is never mutated. Filter values go through an explicit coercion
//! step keyed on the column's dtype before comparison.

use polars::prelude::*;
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::QueryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Greater,
    Less,
    Equal,
    Contains,
}

impl FilterKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterKind::Greater => "greater",
            FilterKind::Less => "less",
            FilterKind::Equal => "equal",
            FilterKind::Contains => "contains",
        }
    }
}

impl FromStr for FilterKind {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "greater" => Ok(FilterKind::Greater),
            "less" => Ok(FilterKind::Less),
            "equal" => Ok(FilterKind::Equal),
            "contains" => Ok(FilterKind::Contains),
            other => Err(QueryError::InvalidFilterType(other.to_string())),
        }
    }
}

/// A raw filter value after coercion: numeric when the column and the text
/// allow it, text otherwise. Comparison dispatch is keyed on this tag.
#[derive(Debug, Clone, PartialEq)]
enum FilterValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl FilterValue {
    /// Ordering comparisons coerce to the column's own numeric type; equality
    /// attempts float uniformly. Failed parses and non-numeric columns fall
    /// back to text, compared with the column's native ordering.
    fn coerce(raw: &str, dtype: &DataType, kind: FilterKind) -> FilterValue {
        let text = || FilterValue::Text(raw.to_string());
        match kind {
            FilterKind::Greater | FilterKind::Less => {
                if dtype.is_integer() {
                    raw.trim().parse::<i64>().map(FilterValue::Int).unwrap_or_else(|_| text())
                } else if dtype.is_float() {
                    raw.trim().parse::<f64>().map(FilterValue::Float).unwrap_or_else(|_| text())
                } else {
                    text()
                }
            }
            FilterKind::Equal => raw
                .trim()
                .parse::<f64>()
                .map(FilterValue::Float)
                .unwrap_or_else(|_| text()),
            FilterKind::Contains => text(),
        }
    }

    fn into_lit(self) -> Expr {
        match self {
            FilterValue::Int(v) => lit(v),
            FilterValue::Float(v) => lit(v),
            FilterValue::Text(v) => lit(v),
        }
    }
}

/// Keeps the rows of `df` matching a single predicate on `column`.
pub fn apply_filter(
    df: &DataFrame,
    column: &str,
    kind: FilterKind,
    raw_value: &str,
) -> Result<DataFrame, QueryError> {
    let dtype = df
        .schema()
        .get(column)
        .cloned()
        .ok_or_else(|| QueryError::ColumnNotFound(column.to_string()))?;

    let predicate = match kind {
        FilterKind::Greater => {
            col(column).gt(FilterValue::coerce(raw_value, &dtype, kind).into_lit())
        }
        FilterKind::Less => {
            col(column).lt(FilterValue::coerce(raw_value, &dtype, kind).into_lit())
        }
        FilterKind::Equal => {
            col(column).eq(FilterValue::coerce(raw_value, &dtype, kind).into_lit())
        }
        // Case-insensitive substring over the column rendered as text.
        // Null cells produce a null predicate and are excluded, not errors.
        FilterKind::Contains => col(column)
            .cast(DataType::String)
            .str()
            .to_lowercase()
            .str()
            .contains_literal(lit(raw_value.to_lowercase())),
    };

    Ok(df.clone().lazy().filter(predicate).collect()?)
}

/// Stable sort by one column; ties keep their original row order.
pub fn sort_by(df: &DataFrame, column: &str, ascending: bool) -> Result<DataFrame, QueryError> {
    if df.schema().get(column).is_none() {
        return Err(QueryError::ColumnNotFound(column.to_string()));
    }
    let options = SortMultipleOptions {
        descending: vec![!ascending],
        maintain_order: true,
        ..Default::default()
    };
    Ok(df
        .clone()
        .lazy()
        .sort_by_exprs([col(column)], options)
        .collect()?)
}

/// Identity copy of the source; replaces the active view wholesale.
pub fn clear(source: &DataFrame) -> DataFrame {
    source.clone()
}

/// Counts rows matching every (column, literal) pair. Cells are compared as
/// text, exactly and case-sensitively; nulls never match. An empty condition
/// set matches every row.
pub fn count_matching(
    df: &DataFrame,
    conditions: &HashMap<String, String>,
) -> Result<usize, QueryError> {
    let mut clauses = Vec::with_capacity(conditions.len());
    for (column, literal) in conditions {
        if df.schema().get(column).is_none() {
            return Err(QueryError::ColumnNotFound(column.clone()));
        }
        clauses.push(
            col(column.as_str())
                .cast(DataType::String)
                .eq(lit(literal.as_str())),
        );
    }
    let Some(predicate) = clauses.into_iter().reduce(|acc, clause| acc.and(clause)) else {
        return Ok(df.height());
    };
    Ok(df.clone().lazy().filter(predicate).collect()?.height())
}
