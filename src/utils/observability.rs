use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

use crate::Error;
use crate::Result;

/// Installs the global tracing subscriber: a non-blocking fmt layer writing
/// to `<log_dir>/agent.log`, filtered by `RUST_LOG` (default `info`).
///
/// Keep the returned guard alive for the lifetime of the process, dropping
/// it flushes and stops the writer.
pub fn init_observability(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .map_err(|e| Error::Fatal(format!("create log dir {}: {}", log_dir.display(), e)))?;
    let file_appender = tracing_appender::rolling::never(log_dir, "agent.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(filter);
    tracing_subscriber::registry()
        .with(base_subscriber)
        .try_init()
        .map_err(|e| Error::Fatal(format!("install tracing subscriber: {e}")))?;

    Ok(guard)
}
