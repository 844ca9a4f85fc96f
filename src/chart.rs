//! Chart rendering for plot queries (plotters bitmap backend).
//!
//! The session resolves a plot query to two columns and a chart kind; this
//! module turns the filtered view into a PNG artifact. The core never
//! inspects the rendered output.

use plotters::element::Pie;
use plotters::prelude::*;
use polars::prelude::*;
use std::path::Path;

use crate::error::QueryError;

/// Chart flavor requested by the query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartKind {
    #[default]
    Bar,
    Line,
    Scatter,
    Pie,
}

impl ChartKind {
    /// Scans the query for a chart-kind word; bar is the default.
    pub fn from_query(query: &str) -> Self {
        let lowered = query.to_lowercase();
        if lowered.contains("line") {
            Self::Line
        } else if lowered.contains("scatter") {
            Self::Scatter
        } else if lowered.contains("pie") {
            Self::Pie
        } else {
            Self::Bar
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::Line => "line",
            Self::Scatter => "scatter",
            Self::Pie => "pie",
        }
    }
}

/// A resolved plot request: x column, y column, and chart kind.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSpec {
    pub x: String,
    pub y: String,
    pub kind: ChartKind,
}

const SERIES_COLORS: [RGBColor; 6] = [CYAN, MAGENTA, GREEN, YELLOW, BLUE, RED];

fn chart_err<E: std::fmt::Display>(e: E) -> QueryError {
    QueryError::Chart(e.to_string())
}

/// Renders the chart described by `spec` over `df` to a PNG file.
pub fn render_png(
    df: &DataFrame,
    spec: &PlotSpec,
    path: &Path,
    (width, height): (u32, u32),
) -> Result<(), QueryError> {
    let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    match spec.kind {
        ChartKind::Bar => draw_bars(&root, spec, &labeled_points(df, spec)?)?,
        ChartKind::Pie => draw_pie(&root, &labeled_points(df, spec)?, (width, height))?,
        ChartKind::Line | ChartKind::Scatter => draw_xy(&root, spec, df)?,
    }

    root.present().map_err(chart_err)?;
    Ok(())
}

/// (x label, y value) pairs for bar and pie charts; rows with a null y are
/// dropped.
fn labeled_points(df: &DataFrame, spec: &PlotSpec) -> Result<Vec<(String, f64)>, QueryError> {
    let labels = text_values(df, &spec.x)?;
    let ys = numeric_values(df, &spec.y)?;
    let points: Vec<(String, f64)> = labels
        .into_iter()
        .zip(ys)
        .filter_map(|(label, y)| y.map(|y| (label, y)))
        .collect();
    if points.is_empty() {
        return Err(QueryError::Chart("no data to plot".to_string()));
    }
    Ok(points)
}

fn draw_bars(
    root: &DrawingArea<BitMapBackend, plotters::coord::Shift>,
    spec: &PlotSpec,
    points: &[(String, f64)],
) -> Result<(), QueryError> {
    let y_max = points.iter().map(|(_, y)| *y).fold(f64::MIN, f64::max);
    let y_min = points.iter().map(|(_, y)| *y).fold(0.0, f64::min);
    let n = points.len();

    let mut chart = ChartBuilder::on(root)
        .margin(30)
        .caption(format!("{} by {}", spec.y, spec.x), ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..n as f64, y_min..pad_upper(y_max))
        .map_err(chart_err)?;

    let labels: Vec<&str> = points.iter().map(|(l, _)| l.as_str()).collect();
    chart
        .configure_mesh()
        .x_desc(spec.x.as_str())
        .y_desc(spec.y.as_str())
        .x_labels(n.min(12))
        .x_label_formatter(&|v| {
            labels
                .get(v.floor() as usize)
                .map(|l| l.to_string())
                .unwrap_or_default()
        })
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(points.iter().enumerate().map(|(i, (_, y))| {
            let x0 = i as f64 + 0.15;
            let x1 = i as f64 + 0.85;
            Rectangle::new([(x0, 0.0), (x1, *y)], SERIES_COLORS[0].filled())
        }))
        .map_err(chart_err)?;
    Ok(())
}

fn draw_xy(
    root: &DrawingArea<BitMapBackend, plotters::coord::Shift>,
    spec: &PlotSpec,
    df: &DataFrame,
) -> Result<(), QueryError> {
    let ys = numeric_values(df, &spec.y)?;
    // Numeric x when the column allows it, row order otherwise. Rows missing
    // either coordinate are dropped.
    let coords: Vec<(f64, f64)> = match numeric_values(df, &spec.x) {
        Ok(xs) => xs
            .into_iter()
            .zip(ys)
            .filter_map(|(x, y)| Some((x?, y?)))
            .collect(),
        Err(_) => ys
            .into_iter()
            .enumerate()
            .filter_map(|(i, y)| y.map(|y| (i as f64, y)))
            .collect(),
    };
    if coords.is_empty() {
        return Err(QueryError::Chart("no data to plot".to_string()));
    }

    let (x_min, x_max) = bounds(coords.iter().map(|(x, _)| *x));
    let (y_min, y_max) = bounds(coords.iter().map(|(_, y)| *y));

    let mut chart = ChartBuilder::on(root)
        .margin(30)
        .caption(
            match spec.kind {
                ChartKind::Line => format!("{} over {}", spec.y, spec.x),
                _ => format!("{} vs {}", spec.y, spec.x),
            },
            ("sans-serif", 20),
        )
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_min..pad_upper(x_max), y_min..pad_upper(y_max))
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .x_desc(spec.x.as_str())
        .y_desc(spec.y.as_str())
        .draw()
        .map_err(chart_err)?;

    match spec.kind {
        ChartKind::Line => {
            chart
                .draw_series(LineSeries::new(coords, &SERIES_COLORS[0]))
                .map_err(chart_err)?;
        }
        _ => {
            chart
                .draw_series(
                    coords
                        .into_iter()
                        .map(|c| Circle::new(c, 3, SERIES_COLORS[0].filled())),
                )
                .map_err(chart_err)?;
        }
    }
    Ok(())
}

fn draw_pie(
    root: &DrawingArea<BitMapBackend, plotters::coord::Shift>,
    points: &[(String, f64)],
    (width, height): (u32, u32),
) -> Result<(), QueryError> {
    // Pie slices must be positive; drop the rest.
    let slices: Vec<(String, f64)> = points.iter().filter(|(_, y)| *y > 0.0).cloned().collect();
    if slices.is_empty() {
        return Err(QueryError::Chart(
            "pie chart needs positive values".to_string(),
        ));
    }
    let sizes: Vec<f64> = slices.iter().map(|(_, y)| *y).collect();
    let labels: Vec<String> = slices.iter().map(|(l, _)| l.clone()).collect();
    let colors: Vec<RGBColor> = (0..slices.len())
        .map(|i| SERIES_COLORS[i % SERIES_COLORS.len()])
        .collect();

    let center = (width as i32 / 2, height as i32 / 2);
    let radius = (width.min(height) as f64) * 0.35;
    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
    pie.label_style(("sans-serif", 16).into_font().color(&BLACK));
    root.draw(&pie).map_err(chart_err)?;
    Ok(())
}

fn pad_upper(v: f64) -> f64 {
    if v > 0.0 {
        v * 1.05
    } else {
        v + 1.0
    }
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        if v.is_finite() {
            min = min.min(v);
            max = max.max(v);
        }
    }
    if max >= min {
        (min, max)
    } else {
        (0.0, 1.0)
    }
}

/// Column as f64 values (temporal columns through their physical value).
/// Fails for columns with no numeric reading.
fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, QueryError> {
    let column = df
        .column(name)
        .map_err(|_| QueryError::ColumnNotFound(name.to_string()))?;
    let casted = if column.dtype().is_temporal() {
        column.cast(&DataType::Int64)?.cast(&DataType::Float64)?
    } else if column.dtype().is_numeric() {
        column.cast(&DataType::Float64)?
    } else {
        return Err(QueryError::UnsupportedColumnType(name.to_string()));
    };
    Ok(casted.f64()?.iter().collect())
}

/// Column rendered as display text, null cells as empty strings.
fn text_values(df: &DataFrame, name: &str) -> Result<Vec<String>, QueryError> {
    let column = df
        .column(name)
        .map_err(|_| QueryError::ColumnNotFound(name.to_string()))?;
    let casted = column.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_chart_kind_with_bar_default() {
        assert_eq!(ChartKind::from_query("plot with a and b"), ChartKind::Bar);
        assert_eq!(
            ChartKind::from_query("line plot with a and b"),
            ChartKind::Line
        );
        assert_eq!(
            ChartKind::from_query("show a SCATTER with a and b"),
            ChartKind::Scatter
        );
        assert_eq!(
            ChartKind::from_query("pie graph with a and b"),
            ChartKind::Pie
        );
    }

    #[test]
    fn numeric_values_reject_text_columns() {
        let df = df!("Name" => ["a", "b"]).unwrap();
        let err = numeric_values(&df, "Name").unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedColumnType(_)));
    }

    #[test]
    fn numeric_values_keep_nulls() {
        let df = df!("Price" => [Some(1i64), None, Some(3)]).unwrap();
        assert_eq!(
            numeric_values(&df, "Price").unwrap(),
            vec![Some(1.0), None, Some(3.0)]
        );
    }

    #[test]
    fn text_values_render_numbers() {
        let df = df!("Price" => [1i64, 2]).unwrap();
        assert_eq!(text_values(&df, "Price").unwrap(), vec!["1", "2"]);
    }

    #[test]
    fn labeled_points_drop_null_y_rows() {
        let df = df!(
            "Region" => ["a", "b", "c"],
            "Sales" => [Some(1i64), None, Some(3)],
        )
        .unwrap();
        let spec = PlotSpec {
            x: "Region".to_string(),
            y: "Sales".to_string(),
            kind: ChartKind::Bar,
        };
        let points = labeled_points(&df, &spec).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], ("a".to_string(), 1.0));
    }

    #[test]
    fn bounds_ignore_non_finite_values() {
        let (min, max) = bounds([1.0, f64::NAN, 3.0].into_iter());
        assert_eq!((min, max), (1.0, 3.0));
        let (min, max) = bounds(std::iter::empty());
        assert_eq!((min, max), (0.0, 1.0));
    }
}
