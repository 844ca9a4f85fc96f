//! datask: load a tabular file and interrogate it with short free-text
//! queries ("plot with A and B", "average of C", "count where D=E").
//!
//! The core is the intent resolver ([`intent`]) and the filter/aggregate
//! engine ([`engine`]); [`session::Session`] owns the table, the filtered
//! view, query history, and per-file profiles, and routes resolved intents
//! to the engines. Loading, charting, export, and instrumentation live at
//! the edges ([`loader`], [`chart`], [`export`], [`observer`]).

pub mod chart;
pub mod cli;
pub mod engine;
pub mod error;
pub mod export;
pub mod history;
pub mod intent;
pub mod loader;
pub mod observer;
pub mod profile;
pub mod session;

pub use chart::{ChartKind, PlotSpec};
pub use cli::Args;
pub use engine::FilterKind;
pub use error::QueryError;
pub use export::ExportFormat;
pub use history::QueryHistory;
pub use intent::Intent;
pub use loader::{FileFormat, LoadOptions};
pub use observer::{NoopObserver, Observer, TracingObserver};
pub use profile::{AnalysisRecord, FileProfile};
pub use session::{QueryOutcome, Session};
