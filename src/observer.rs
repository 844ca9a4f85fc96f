//! Injected instrumentation.
//!
//! The session and engines report to an `Observer` passed in explicitly;
//! there is no process-wide logger. Notifications are fire-and-forget and
//! never influence control flow or query outcomes.

use color_eyre::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Receives operational notifications from the session. All methods default
/// to doing nothing, so implementations override only what they care about.
pub trait Observer {
    fn file_loaded(&self, _file_name: &str, _rows: usize, _columns: usize, _elapsed: Duration) {}

    fn query_executed(&self, _query: &str, _intent: &str, _rows: usize, _elapsed: Duration) {}

    fn query_failed(&self, _query: &str, _message: &str) {}

    fn data_operation(&self, _operation: &str, _rows_affected: usize, _elapsed: Duration) {}
}

/// Observer that ignores everything. Default for embedders that bring no
/// instrumentation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Observer that forwards notifications to the `tracing` ecosystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn file_loaded(&self, file_name: &str, rows: usize, columns: usize, elapsed: Duration) {
        tracing::info!(
            file = file_name,
            rows,
            columns,
            elapsed_ms = elapsed.as_millis() as u64,
            "file loaded"
        );
    }

    fn query_executed(&self, query: &str, intent: &str, rows: usize, elapsed: Duration) {
        tracing::info!(
            query,
            intent,
            rows,
            elapsed_ms = elapsed.as_millis() as u64,
            "query executed"
        );
    }

    fn query_failed(&self, query: &str, message: &str) {
        tracing::warn!(query, message, "query failed");
    }

    fn data_operation(&self, operation: &str, rows_affected: usize, elapsed: Duration) {
        tracing::info!(
            operation,
            rows_affected,
            elapsed_ms = elapsed.as_millis() as u64,
            "data operation"
        );
    }
}

/// Initializes tracing with a file writer. `verbose` raises the default
/// level from WARN to INFO; `RUST_LOG` overrides either.
pub fn init_logging(log_file: Option<PathBuf>, verbose: bool) -> Result<()> {
    let Some(log_path) = log_file else {
        return Ok(());
    };
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let default_level = if verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let writer_path = log_path.clone();
    let file_layer = fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(move || {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&writer_path)
                .expect("failed to open log file")
        })
        .with_filter(env_filter);

    tracing_subscriber::registry().with(file_layer).try_init()?;
    Ok(())
}
