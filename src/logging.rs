use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

/// Route tracing output to a daily log file under `dir`.
///
/// The terminal belongs to the TUI, so nothing is written to stdout or
/// stderr. `RUST_LOG` overrides the configured level. Keep the returned
/// guard alive until exit or buffered lines are lost.
pub fn init_logging(config: &LogConfig, dir: &Path) -> Result<WorkerGuard> {
  std::fs::create_dir_all(dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(dir, "grocer.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(writer).with_ansi(false).with_target(true))
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  tracing::info!(level = %config.level, "logging initialized");
  Ok(guard)
}
