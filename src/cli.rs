//! Command-line arguments.

use clap::Parser;
use std::path::PathBuf;

#[derive(Clone, Parser, Debug)]
#[command(
    name = "datask",
    version,
    about = "Ask questions of CSV and Excel files in plain text"
)]
pub struct Args {
    /// Path to the data file to open (.csv, .xls, .xlsx, .xlsm, .xlsb)
    pub path: PathBuf,

    /// Run a single query and exit instead of starting the interactive prompt
    #[arg(long = "query", short = 'q', value_name = "TEXT")]
    pub query: Option<String>,

    /// Excel sheet to load: 0-based index (e.g. 0) or sheet name (e.g. "Sales")
    #[arg(long = "sheet", value_name = "SHEET")]
    pub sheet: Option<String>,

    /// Delimiter to use when reading a CSV file
    #[arg(long = "delimiter")]
    pub delimiter: Option<u8>,

    /// Specify that the file has no header row
    #[arg(long = "no-header", action)]
    pub no_header: bool,

    /// Directory where charts and exports are written (default: current directory)
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Write logs to this file
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Log at INFO level instead of WARN
    #[arg(long = "verbose", action)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_invocation() {
        let args = Args::parse_from(["datask", "data.csv"]);
        assert_eq!(args.path, PathBuf::from("data.csv"));
        assert!(args.query.is_none());
        assert!(!args.no_header);
    }

    #[test]
    fn parses_one_shot_query() {
        let args = Args::parse_from(["datask", "data.xlsx", "--sheet", "Sales", "-q", "count"]);
        assert_eq!(args.sheet.as_deref(), Some("Sales"));
        assert_eq!(args.query.as_deref(), Some("count"));
    }
}
