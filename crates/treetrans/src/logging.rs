//! Subscriber setup for binaries embedding the library.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::error::LoggingError;

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Installs the global subscriber.
///
/// `RUST_LOG` overrides the default `info` filter. Records emitted through
/// the `log` facade are forwarded into the same subscriber.
pub fn init_logging(format: LogFormat) -> Result<(), LoggingError> {
    if LOGGER_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(LoggingError::AlreadyInitialized);
    }

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .map_err(|e| LoggingError::Filter(e.to_string()))?;

    tracing_log::LogTracer::init().map_err(|e| LoggingError::Install(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format {
        LogFormat::Pretty => tracing::subscriber::set_global_default(
            registry.with(tracing_subscriber::fmt::layer().with_target(false)),
        ),
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(tracing_subscriber::fmt::layer().json().with_current_span(true)),
        ),
    };
    result.map_err(|e| LoggingError::Install(e.to_string()))
}
