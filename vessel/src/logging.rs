//! Structured logging setup, grounded on the teacher's own
//! `register_to_tracing` helper: a `tracing-subscriber` registry with an
//! `EnvFilter` layer plus either a non-blocking file writer or stderr.

use std::path::Path;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global `tracing` subscriber. Pass `log_dir` to write
/// structured logs to a rolling file under that directory (named after
/// the container's `workdir_name`); `None` logs to stderr instead.
///
/// Safe to call more than once — only the first call takes effect.
pub fn init_logging(log_dir: Option<&Path>, workdir_name: &str) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, format!("{workdir_name}.log"));
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init();
            None
        }
    }
}
