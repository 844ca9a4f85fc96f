//! File loading: extension dispatch, CSV via Polars, Excel via calamine.
//!
//! Only CSV and spreadsheet extensions are recognized; anything else fails
//! with `UnsupportedFileFormat` before any file I/O happens. Excel sheets are
//! read eagerly and converted column by column with per-column type
//! inference (integer, float, boolean, text, date, datetime).

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use std::path::Path;

use crate::error::QueryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Excel,
}

impl FileFormat {
    /// Detects the format from the path extension. Unknown or missing
    /// extensions are a hard failure, not a fallback.
    pub fn from_path(path: &Path) -> Result<Self, QueryError> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| QueryError::UnsupportedFileFormat(path.display().to_string()))
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "xls" | "xlsx" | "xlsm" | "xlsb" => Some(Self::Excel),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Excel => "excel",
        }
    }
}

/// Options for reading a file.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// CSV field separator; defaults to comma.
    pub delimiter: Option<u8>,
    /// Whether the first row holds column names.
    pub has_header: bool,
    /// Excel sheet selector: 0-based index or sheet name. First sheet when
    /// unset.
    pub sheet: Option<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            has_header: true,
            sheet: None,
        }
    }
}

/// Loads a table from a CSV or Excel file.
pub fn load(path: &Path, options: &LoadOptions) -> Result<(DataFrame, FileFormat), QueryError> {
    let format = FileFormat::from_path(path)?;
    let df = match format {
        FileFormat::Csv => load_csv(path, options)?,
        FileFormat::Excel => load_excel(path, options.sheet.as_deref())?,
    };
    Ok((df, format))
}

fn load_csv(path: &Path, options: &LoadOptions) -> Result<DataFrame, QueryError> {
    let pl_path = PlPathRef::from_local_path(path).into_owned();
    let mut reader = LazyCsvReader::new(pl_path)
        .with_has_header(options.has_header)
        .with_try_parse_dates(true);
    if let Some(delimiter) = options.delimiter {
        reader = reader.with_separator(delimiter);
    }
    Ok(reader.finish()?.collect()?)
}

/// Reads one worksheet eagerly (xls, xlsx, xlsm, xlsb). The first row is the
/// header; remaining rows become typed columns.
fn load_excel(path: &Path, sheet: Option<&str>) -> Result<DataFrame, QueryError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| QueryError::Excel(e.to_string()))?;
    if workbook.sheet_names().is_empty() {
        return Err(QueryError::Excel("file has no worksheets".to_string()));
    }

    let range = match sheet {
        Some(selector) => {
            if let Ok(index) = selector.parse::<usize>() {
                workbook
                    .worksheet_range_at(index)
                    .ok_or_else(|| QueryError::Excel(format!("no sheet at index {}", index)))?
                    .map_err(|e| QueryError::Excel(e.to_string()))?
            } else {
                workbook
                    .worksheet_range(selector)
                    .map_err(|e| QueryError::Excel(e.to_string()))?
            }
        }
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| QueryError::Excel("no first sheet".to_string()))?
            .map_err(|e| QueryError::Excel(e.to_string()))?,
    };

    let rows: Vec<Vec<Data>> = range.rows().map(|r| r.to_vec()).collect();
    if rows.is_empty() {
        return Ok(DataFrame::new(vec![])?);
    }

    let headers: Vec<String> = rows[0]
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let name = calamine::DataType::as_string(cell).unwrap_or_else(|| cell.to_string());
            if name.is_empty() {
                format!("column_{}", i + 1)
            } else {
                name
            }
        })
        .collect();

    let mut series = Vec::with_capacity(headers.len());
    for (index, header) in headers.iter().enumerate() {
        let cells: Vec<Option<&Data>> = rows[1..].iter().map(|row| row.get(index)).collect();
        let kind = infer_column_kind(&cells);
        series.push(column_to_series(header, &cells, kind)?.into());
    }
    Ok(DataFrame::new(series)?)
}

/// Inferred scalar type of one Excel column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Int,
    Float,
    Bool,
    Text,
    Date,
    Datetime,
}

/// Infers the column type from its cells. Any string cell makes the column
/// text unless every non-empty cell parses as an ISO date/datetime. Floats
/// that are all whole numbers become integers (Excel stores integers as
/// floats).
fn infer_column_kind(cells: &[Option<&Data>]) -> CellKind {
    use calamine::DataType as CellValue;

    let mut saw_int = false;
    let mut saw_float = false;
    let mut saw_bool = false;
    let mut saw_datetime = false;
    for cell in cells.iter().flatten() {
        if CellValue::is_string(*cell) {
            return text_or_temporal(cells);
        }
        saw_int |= CellValue::is_int(*cell);
        saw_float |= CellValue::is_float(*cell);
        saw_bool |= CellValue::is_bool(*cell);
        if CellValue::is_datetime(*cell) || CellValue::is_datetime_iso(*cell) {
            saw_datetime = true;
            saw_float = true;
        }
    }

    if saw_int {
        CellKind::Int
    } else if saw_datetime {
        date_or_datetime(cells)
    } else if saw_float {
        let all_whole = cells.iter().flatten().all(|cell| {
            CellValue::as_f64(*cell).is_none_or(|f| f.is_finite() && (f - f.trunc()).abs() < 1e-10)
        });
        if all_whole {
            CellKind::Int
        } else {
            CellKind::Float
        }
    } else if saw_bool {
        CellKind::Bool
    } else {
        CellKind::Text
    }
}

/// A string column stays text unless every non-empty cell parses as a
/// date/datetime and at least one does.
fn text_or_temporal(cells: &[Option<&Data>]) -> CellKind {
    use calamine::DataType as CellValue;
    let mut parsed_any = false;
    for cell in cells.iter().flatten() {
        if CellValue::is_empty(*cell) {
            continue;
        }
        if cell_datetime(cell).is_some() {
            parsed_any = true;
        } else {
            return CellKind::Text;
        }
    }
    if parsed_any {
        date_or_datetime(cells)
    } else {
        CellKind::Text
    }
}

/// Date when every parseable cell is at midnight, otherwise datetime.
fn date_or_datetime(cells: &[Option<&Data>]) -> CellKind {
    let midnight = NaiveTime::MIN;
    let all_midnight = cells
        .iter()
        .flatten()
        .filter_map(|c| cell_datetime(c))
        .all(|dt| dt.time() == midnight);
    if all_midnight {
        CellKind::Date
    } else {
        CellKind::Datetime
    }
}

/// Converts a cell to NaiveDateTime: Excel serial date, ISO datetime cell, or
/// a string in one of the accepted ISO-style formats.
fn cell_datetime(cell: &Data) -> Option<NaiveDateTime> {
    use calamine::DataType as CellValue;
    if let Some(dt) = cell.as_datetime() {
        return Some(dt);
    }
    let s = cell.get_datetime_iso().or_else(|| CellValue::get_string(cell))?;
    parse_datetime_str(s)
}

fn parse_datetime_str(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Builds a typed Polars Series from one column of cells.
fn column_to_series(
    name: &str,
    cells: &[Option<&Data>],
    kind: CellKind,
) -> Result<Series, QueryError> {
    use calamine::DataType as CellValue;

    let series = match kind {
        CellKind::Int => {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|c| c.and_then(|cell| CellValue::as_i64(cell)))
                .collect();
            Series::new(name.into(), values)
        }
        CellKind::Float => {
            let values: Vec<Option<f64>> = cells
                .iter()
                .map(|c| c.and_then(|cell| CellValue::as_f64(cell)))
                .collect();
            Series::new(name.into(), values)
        }
        CellKind::Bool => {
            let values: Vec<Option<bool>> = cells
                .iter()
                .map(|c| c.and_then(|cell| CellValue::get_bool(cell)))
                .collect();
            Series::new(name.into(), values)
        }
        CellKind::Text => {
            let values: Vec<Option<String>> = cells
                .iter()
                .map(|c| c.and_then(|cell| CellValue::as_string(cell)))
                .collect();
            Series::new(name.into(), values)
        }
        CellKind::Date => {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
                .ok_or_else(|| QueryError::Excel("invalid epoch".to_string()))?;
            let values: Vec<Option<i32>> = cells
                .iter()
                .map(|c| {
                    c.and_then(cell_datetime)
                        .map(|dt| (dt.date() - epoch).num_days() as i32)
                })
                .collect();
            Series::new(name.into(), values).cast(&DataType::Date)?
        }
        CellKind::Datetime => {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|c| c.and_then(cell_datetime).map(|dt| dt.and_utc().timestamp_micros()))
                .collect();
            Series::new(name.into(), values)
                .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
        }
    };
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn recognizes_csv_and_excel_extensions_only() {
        assert_eq!(
            FileFormat::from_path(&PathBuf::from("data.csv")).unwrap(),
            FileFormat::Csv
        );
        assert_eq!(
            FileFormat::from_path(&PathBuf::from("Data.XLSX")).unwrap(),
            FileFormat::Excel
        );
        assert_eq!(
            FileFormat::from_path(&PathBuf::from("old.xls")).unwrap(),
            FileFormat::Excel
        );
        for bad in ["data.parquet", "data.json", "data", "data.txt"] {
            let err = FileFormat::from_path(&PathBuf::from(bad)).unwrap_err();
            assert!(matches!(err, QueryError::UnsupportedFileFormat(_)), "{}", bad);
        }
    }

    fn refs(cells: &[Data]) -> Vec<Option<&Data>> {
        cells.iter().map(Some).collect()
    }

    #[test]
    fn infers_int_for_integer_cells() {
        let cells = [Data::Int(1), Data::Int(2), Data::Empty];
        assert_eq!(infer_column_kind(&refs(&cells)), CellKind::Int);
    }

    #[test]
    fn infers_int_for_whole_floats() {
        let cells = [Data::Float(1.0), Data::Float(42.0)];
        assert_eq!(infer_column_kind(&refs(&cells)), CellKind::Int);
    }

    #[test]
    fn infers_float_for_fractional_values() {
        let cells = [Data::Float(1.5), Data::Float(2.0)];
        assert_eq!(infer_column_kind(&refs(&cells)), CellKind::Float);
    }

    #[test]
    fn any_plain_string_makes_the_column_text() {
        let cells = [Data::Float(1.0), Data::String("x".to_string())];
        assert_eq!(infer_column_kind(&refs(&cells)), CellKind::Text);
    }

    #[test]
    fn iso_date_strings_become_dates() {
        let cells = [
            Data::String("2021-01-01".to_string()),
            Data::String("2021-02-15".to_string()),
            Data::Empty,
        ];
        assert_eq!(infer_column_kind(&refs(&cells)), CellKind::Date);
    }

    #[test]
    fn iso_datetime_strings_become_datetimes() {
        let cells = [
            Data::String("2021-01-01 08:30:00".to_string()),
            Data::String("2021-02-15 17:45:10".to_string()),
        ];
        assert_eq!(infer_column_kind(&refs(&cells)), CellKind::Datetime);
    }

    #[test]
    fn mixed_date_and_plain_strings_stay_text() {
        let cells = [
            Data::String("2021-01-01".to_string()),
            Data::String("not a date".to_string()),
        ];
        assert_eq!(infer_column_kind(&refs(&cells)), CellKind::Text);
    }

    #[test]
    fn builds_typed_series_with_nulls_for_missing_cells() {
        let cells = [Data::Int(5), Data::Empty, Data::Int(7)];
        let refs = refs(&cells);
        let series = column_to_series("n", &refs, CellKind::Int).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.null_count(), 1);
        assert_eq!(series.i64().unwrap().get(0), Some(5));
    }

    #[test]
    fn date_series_has_date_dtype() {
        let cells = [
            Data::String("2021-01-01".to_string()),
            Data::String("2021-06-30".to_string()),
        ];
        let refs = refs(&cells);
        let series = column_to_series("d", &refs, CellKind::Date).unwrap();
        assert_eq!(series.dtype(), &DataType::Date);
    }
}
