//! Subscriber setup for the binary. The library itself only emits events.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "winkel.log";

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. Keep the returned guard alive
/// until exit or buffered lines are lost.
pub fn init(config: &LoggingConfig) -> WorkerGuard {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

  let (writer, guard, ansi) = match &config.directory {
    Some(dir) => {
      let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX));
      (writer, guard, false)
    }
    None => {
      let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
      (writer, guard, true)
    }
  };

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(writer).with_ansi(ansi))
    .init();

  guard
}
