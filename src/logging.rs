//! Tracing subscriber setup for hosts embedding the optimizer.
//!
//! The optimizer itself only emits `tracing` events; installing a
//! subscriber is left to the host. [`init_logging`] is a convenience that
//! reads [`LoggingConfig`].

use crate::config::LoggingConfig;
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static TRACE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Install a global subscriber for `config`.
///
/// A second call, or a call after the host installed its own subscriber,
/// leaves the existing one in place. Fails only if the log file cannot be
/// opened.
pub fn init_logging(config: &LoggingConfig) -> std::io::Result<()> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let json = config.format == "json";

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = match &config.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let _ = TRACE_GUARD.set(guard);

            let base = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(non_blocking);
            if json {
                Box::new(base.json().finish())
            } else {
                Box::new(base.compact().finish())
            }
        }
        None => {
            let base = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr);
            if json {
                Box::new(base.json().finish())
            } else {
                Box::new(base.compact().finish())
            }
        }
    };

    let _ = tracing::subscriber::set_global_default(subscriber);
    Ok(())
}
