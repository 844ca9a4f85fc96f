//! Error taxonomy for the query core.
//!
//! Every variant is a recoverable condition reported synchronously to the
//! caller; the session's table, view, and history remain intact after any of
//! them. The binary converts these into `color_eyre::Report` at the top level.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("no data loaded")]
    NoDataLoaded,

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("unknown filter type: '{0}' (expected greater, less, equal, or contains)")]
    InvalidFilterType(String),

    #[error("{0}")]
    MalformedQuery(String),

    #[error("column '{0}' is not numeric")]
    UnsupportedColumnType(String),

    #[error("unsupported file format: {0} (expected .csv, .xls, .xlsx, .xlsm, or .xlsb)")]
    UnsupportedFileFormat(String),

    #[error("chart rendering failed: {0}")]
    Chart(String),

    #[error("Excel: {0}")]
    Excel(String),

    #[error(transparent)]
    Polars(#[from] polars::prelude::PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_input() {
        let err = QueryError::InvalidFilterType("between".to_string());
        assert!(err.to_string().contains("between"));
        assert!(err.to_string().contains("contains"));

        let err = QueryError::ColumnNotFound("Revenue".to_string());
        assert!(err.to_string().contains("Revenue"));

        let err = QueryError::UnsupportedFileFormat("data.parquet".to_string());
        assert!(err.to_string().contains("data.parquet"));
        assert!(err.to_string().contains(".csv"));
    }
}
