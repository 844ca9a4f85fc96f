//! Free-text query classification.
//!
//! A query is mapped to an operation by scanning a fixed, ordered keyword
//! table and taking the first keyword that appears anywhere in the lower-cased
//! text. Operand extraction is keyword-substring based on purpose: no grammar,
//! no tokenizer, so behavior stays deterministic and trivially testable.
//! Ambiguity is resolved by scan order, never by scoring.

use polars::prelude::Schema;
use std::collections::HashMap;

use crate::error::QueryError;

/// A classified query and the operands it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Chart two columns against each other.
    Plot { x: String, y: String },
    /// Mean of a single numeric column.
    Average { column: String },
    /// Count rows matching a flat AND of equality conditions.
    /// Empty conditions match every row.
    Count { conditions: HashMap<String, String> },
    /// List date/value pairs for a column.
    When { column: String },
    /// No recognized keyword.
    Unknown,
}

impl Intent {
    /// Tag used for history, analysis records, and observer notifications.
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::Plot { .. } => "plot",
            Intent::Average { .. } => "average",
            Intent::Count { .. } => "count",
            Intent::When { .. } => "when",
            Intent::Unknown => "unknown",
        }
    }

    /// Columns the intent operates on, in operand order.
    pub fn columns(&self) -> Vec<String> {
        match self {
            Intent::Plot { x, y } => vec![x.clone(), y.clone()],
            Intent::Average { column } | Intent::When { column } => vec![column.clone()],
            Intent::Count { conditions } => conditions.keys().cloned().collect(),
            Intent::Unknown => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    Plot,
    Average,
    Count,
    When,
}

/// Keyword-to-operation table. Scanned in declared order; the first keyword
/// found as a substring of the lower-cased query decides the operation.
const INTENT_KEYWORDS: &[(&str, Keyword)] = &[
    ("graph", Keyword::Plot),
    ("plot", Keyword::Plot),
    ("show", Keyword::Plot),
    ("display", Keyword::Plot),
    ("visualize", Keyword::Plot),
    ("average", Keyword::Average),
    ("mean", Keyword::Average),
    ("avg", Keyword::Average),
    ("count", Keyword::Count),
    ("how many", Keyword::Count),
    ("total", Keyword::Count),
    ("occurred", Keyword::When),
    ("when", Keyword::When),
    ("date", Keyword::When),
    ("time", Keyword::When),
    ("find", Keyword::Count),
];

/// Resolves a column phrase against the table's columns, case-insensitively.
/// Exact match first, then the phrase as a substring of a column name; ties go
/// to the first column in declared order. `None` means "operand missing", not
/// an error; callers decide whether that degrades or fails.
pub fn closest_column<'a>(phrase: &str, columns: &'a [String]) -> Option<&'a str> {
    let phrase = phrase.trim().to_lowercase();
    columns
        .iter()
        .find(|c| c.to_lowercase() == phrase)
        .or_else(|| columns.iter().find(|c| c.to_lowercase().contains(&phrase)))
        .map(String::as_str)
}

/// Classifies `query` and extracts its operands against the table schema.
///
/// Extraction runs on the original-cased text so count literals keep their
/// case; all keyword and column comparisons are case-insensitive.
pub fn resolve(query: &str, schema: &Schema) -> Result<Intent, QueryError> {
    let lowered = query.to_lowercase();
    let keyword = INTENT_KEYWORDS
        .iter()
        .find(|(k, _)| lowered.contains(k))
        .map(|(_, intent)| *intent);

    let columns: Vec<String> = schema.iter_names().map(|n| n.to_string()).collect();

    match keyword {
        None => Ok(Intent::Unknown),
        Some(Keyword::Plot) => resolve_plot(query, &columns),
        Some(Keyword::Average) => resolve_average(query, schema, &columns),
        Some(Keyword::Count) => Ok(Intent::Count {
            conditions: parse_conditions(query, &columns),
        }),
        Some(Keyword::When) => resolve_when(query, &columns),
    }
}

/// "plot with X and Y": requires "with"; the text after it must split on
/// "and" into exactly two resolvable column phrases.
fn resolve_plot(query: &str, columns: &[String]) -> Result<Intent, QueryError> {
    let rest = text_after(query, "with").ok_or_else(|| {
        QueryError::MalformedQuery(
            "plot query must contain 'with' followed by two column names".to_string(),
        )
    })?;
    let parts = split_on_word(rest, "and");
    if parts.len() != 2 {
        return Err(QueryError::MalformedQuery(
            "plot query must name exactly two columns separated by 'and'".to_string(),
        ));
    }
    let x = resolve_column(parts[0], columns)?;
    let y = resolve_column(parts[1], columns)?;
    Ok(Intent::Plot { x, y })
}

/// "average of X": the text after the last "of" names the column.
fn resolve_average(query: &str, schema: &Schema, columns: &[String]) -> Result<Intent, QueryError> {
    let rest = text_after_last(query, "of").ok_or_else(|| {
        QueryError::MalformedQuery(
            "average query must contain 'of' followed by a column name".to_string(),
        )
    })?;
    let column = resolve_column(rest, columns)?;
    let numeric = schema.get(&column).is_some_and(|dtype| dtype.is_numeric());
    if !numeric {
        return Err(QueryError::UnsupportedColumnType(column));
    }
    Ok(Intent::Average { column })
}

/// "count where A=x and B=y": conditions after "where", clauses split on
/// "and", each clause split on "=". Unparseable clauses (no "=", wrong part
/// count, or no column match) are dropped silently; the result may be empty.
fn parse_conditions(query: &str, columns: &[String]) -> HashMap<String, String> {
    let mut conditions = HashMap::new();
    let Some(tail) = text_after(query, "where") else {
        return conditions;
    };
    for clause in split_on_word(tail, "and") {
        let parts: Vec<&str> = clause.split('=').collect();
        if parts.len() != 2 {
            continue;
        }
        if let Some(column) = closest_column(parts[0], columns) {
            conditions.insert(column.to_string(), parts[1].trim().to_string());
        }
    }
    conditions
}

/// "when X": requires the word "when"; the text after it names the column.
/// Queries classified here via "date"/"time"/"occurred" alone are malformed.
fn resolve_when(query: &str, columns: &[String]) -> Result<Intent, QueryError> {
    let rest = text_after(query, "when").ok_or_else(|| {
        QueryError::MalformedQuery(
            "timing query must contain 'when' followed by a column name".to_string(),
        )
    })?;
    let column = resolve_column(rest, columns)?;
    Ok(Intent::When { column })
}

fn resolve_column(phrase: &str, columns: &[String]) -> Result<String, QueryError> {
    closest_column(phrase, columns)
        .map(str::to_string)
        .ok_or_else(|| QueryError::ColumnNotFound(phrase.trim().to_string()))
}

/// Byte offset of the first case-insensitive occurrence of `word` in `text`.
/// `word` must be ASCII (all connector words are), so the offset is always a
/// valid char boundary in `text`.
fn find_word(text: &str, word: &str) -> Option<usize> {
    let haystack = text.as_bytes();
    let needle = word.as_bytes();
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .find(|&i| haystack[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

fn find_word_last(text: &str, word: &str) -> Option<usize> {
    let haystack = text.as_bytes();
    let needle = word.as_bytes();
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .rev()
        .find(|&i| haystack[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

/// Text following the first occurrence of `word`, or None when absent.
fn text_after<'a>(text: &'a str, word: &str) -> Option<&'a str> {
    find_word(text, word).map(|i| &text[i + word.len()..])
}

/// Text following the last occurrence of `word`, or None when absent.
fn text_after_last<'a>(text: &'a str, word: &str) -> Option<&'a str> {
    find_word_last(text, word).map(|i| &text[i + word.len()..])
}

/// Splits on every case-insensitive occurrence of `word`, keeping the
/// segments between them.
fn split_on_word<'a>(text: &'a str, word: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(i) = find_word(rest, word) {
        parts.push(&rest[..i]);
        rest = &rest[i + word.len()..];
    }
    parts.push(rest);
    parts
}
