//! Serialization of the filtered view to CSV, JSON, or an HTML table.
//!
//! Spreadsheet export is deliberately not offered; requesting an unknown
//! format name is an `UnsupportedFileFormat` error.

use polars::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::QueryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Html,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Html => "html",
        }
    }

    /// Default output file name for the format.
    pub fn default_file_name(self) -> &'static str {
        match self {
            Self::Csv => "export_data.csv",
            Self::Json => "export_data.json",
            Self::Html => "table_output.html",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            other => Err(QueryError::UnsupportedFileFormat(other.to_string())),
        }
    }
}

/// Writes `df` to `path` in the requested format and returns the path.
/// For HTML, a previously rendered chart artifact can be linked in.
pub fn export(
    df: &DataFrame,
    format: ExportFormat,
    path: &Path,
    chart: Option<&Path>,
) -> Result<PathBuf, QueryError> {
    let mut df = df.clone();
    match format {
        ExportFormat::Csv => {
            let file = File::create(path)?;
            CsvWriter::new(file).include_header(true).finish(&mut df)?;
        }
        ExportFormat::Json => {
            let file = File::create(path)?;
            JsonWriter::new(file)
                .with_json_format(JsonFormat::Json)
                .finish(&mut df)?;
        }
        ExportFormat::Html => write_html(&df, path, chart)?,
    }
    Ok(path.to_path_buf())
}

fn write_html(df: &DataFrame, path: &Path, chart: Option<&Path>) -> Result<(), QueryError> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);

    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html><head><meta charset=\"utf-8\"></head><body>")?;
    writeln!(out, "<table border=\"1\">")?;
    writeln!(out, "<thead><tr>")?;
    for column in df.get_columns() {
        writeln!(out, "<th>{}</th>", html_escape(column.name()))?;
    }
    writeln!(out, "</tr></thead>")?;
    writeln!(out, "<tbody>")?;
    for row in 0..df.height() {
        writeln!(out, "<tr>")?;
        for column in df.get_columns() {
            let cell = match column.get(row)? {
                AnyValue::Null => String::new(),
                AnyValue::String(s) => s.to_string(),
                AnyValue::StringOwned(s) => s.to_string(),
                value => value.to_string(),
            };
            writeln!(out, "<td>{}</td>", html_escape(&cell))?;
        }
        writeln!(out, "</tr>")?;
    }
    writeln!(out, "</tbody></table>")?;
    if let Some(chart) = chart {
        writeln!(
            out,
            "<img src=\"{}\" alt=\"chart\">",
            html_escape(&chart.display().to_string())
        )?;
    }
    writeln!(out, "</body></html>")?;
    Ok(())
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
