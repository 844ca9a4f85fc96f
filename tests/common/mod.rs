use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Writes the shared sample table as CSV into `dir` and returns its path.
///
/// West/Active appears exactly 3 times, which the count-query tests rely on.
pub fn write_sample_csv(dir: &Path) -> PathBuf {
    let mut df = df!(
        "Region" => ["West", "East", "West", "North", "West", "East"],
        "Status" => ["Active", "Active", "Active", "Closed", "Active", "Closed"],
        "Price" => [150i64, 80, 200, 99, 310, 45],
        "OrderDate" => [
            "2021-01-05",
            "2021-01-07",
            "2021-02-01",
            "2021-02-10",
            "2021-03-15",
            "2021-03-20",
        ],
    )
    .unwrap();
    let path = dir.join("sales.csv");
    let mut file = File::create(&path).unwrap();
    CsvWriter::new(&mut file).finish(&mut df).unwrap();
    path
}
