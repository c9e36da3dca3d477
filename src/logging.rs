//! Tracing setup. The terminal belongs to the UI, so logs go to a file.

use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Overrides `logging.level` when set, e.g. `STOCKROOM_LOG=stockroom=debug`
pub const LOG_ENV: &str = "STOCKROOM_LOG";

/// Install the global subscriber.
///
/// The returned guard flushes buffered lines on drop; keep it alive for the
/// lifetime of the app.
pub fn init(logging: &LoggingConfig) -> Result<WorkerGuard> {
  let path = match &logging.file {
    Some(path) => path.clone(),
    None => default_log_path()?,
  };
  let (directory, file_name) = split_path(&path)?;

  std::fs::create_dir_all(directory)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", directory.display(), e))?;

  let appender = tracing_appender::rolling::never(directory, file_name);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&logging.level));

  fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;

  Ok(guard)
}

fn default_log_path() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("stockroom").join("stockroom.log"))
}

fn split_path(path: &Path) -> Result<(&Path, &std::ffi::OsStr)> {
  let file_name = path
    .file_name()
    .ok_or_else(|| eyre!("Log path has no file name: {}", path.display()))?;
  let directory = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };
  Ok((directory, file_name))
}
