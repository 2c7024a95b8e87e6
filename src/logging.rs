//! Run log: every message goes to the output file and to stderr.
//!
//! The output file is truncated at start. Verbosity follows `RUST_LOG`,
//! defaulting to `info`.

use std::fs::File;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the file writer alive. Dropping it flushes the log.
pub struct LoggingGuard {
  _file_guard: WorkerGuard,
}

/// Open (and truncate) the output file.
pub fn open_output(path: &Path) -> io::Result<File> {
  File::create(path)
}

/// Install the global subscriber writing to `file` and stderr.
pub fn init_logging(file: File) -> LoggingGuard {
  let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file);

  let file_layer = tracing_subscriber::fmt::layer()
    .with_writer(non_blocking_file)
    .with_ansi(false)
    .with_target(false);

  let stderr_layer = tracing_subscriber::fmt::layer()
    .with_writer(io::stderr)
    .with_target(false)
    .compact();

  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::registry()
    .with(env_filter)
    .with(file_layer)
    .with(stderr_layer)
    .init();

  LoggingGuard {
    _file_guard: file_guard,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;

  // init_logging installs a process-wide subscriber, so only the file
  // handling is exercised here.

  #[test]
  fn test_output_is_truncated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gwc.out");
    fs::write(&path, "previous run").unwrap();

    open_output(&path).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "");
  }

  #[test]
  fn test_output_in_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("gwc.out");

    assert!(open_output(&path).is_err());
  }
}
