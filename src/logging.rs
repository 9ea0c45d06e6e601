use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const FILTER_ENV: &str = "HOLOCRON_LOG";
const DEFAULT_FILTER: &str = "holocron=info";

/// Directory holding the log file.
pub fn log_dir() -> Option<PathBuf> {
  dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .map(|p| p.join("holocron"))
}

fn filter() -> EnvFilter {
  EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the file subscriber. Stdout belongs to the terminal UI, so
/// nothing is written there. Keep the guard alive until exit or buffered
/// lines are lost.
pub fn init() -> Result<WorkerGuard> {
  let dir = log_dir().ok_or_else(|| eyre!("Could not determine a data directory for logs"))?;
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::never(&dir, "holocron.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(filter())
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;

  Ok(guard)
}
