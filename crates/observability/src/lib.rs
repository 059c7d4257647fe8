//! Tracing setup shared by every replyradar binary.
//!
//! One call to [`init_tracing`] installs a registry with:
//! - an `EnvFilter` (`RUST_LOG` wins; otherwise `replyradar=<level>,warn`)
//! - a stderr layer, human-readable or JSON
//! - an optional daily-rolling JSON file layer written off-thread
//!
//! Keep the returned [`TracingGuard`] alive until exit or buffered file
//! lines are lost.

use std::path::Path;

use replyradar_core::LoggingConfig;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

pub const LOG_FILE_PREFIX: &str = "replyradar.log";

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("Invalid log filter {directive:?}: {source}")]
    Filter {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("Failed to create log directory {path}: {source}")]
    LogDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("A global tracing subscriber is already installed")]
    AlreadyInstalled(#[from] TryInitError),
}

/// Flushes the file writer on drop.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug, Default)]
pub struct TracingGuard {
    _file: Option<WorkerGuard>,
}

/// Filter directive used when `RUST_LOG` is unset.
///
/// A bare level (`debug`) applies to replyradar's own crates with everything
/// else at `warn`. Anything containing `=` or `,` is taken as a full directive.
pub fn default_directive(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("replyradar={level},warn")
    }
}

fn build_filter(level: &str) -> Result<EnvFilter, ObservabilityError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directive = default_directive(level);
    EnvFilter::try_new(&directive)
        .map_err(|source| ObservabilityError::Filter { directive, source })
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn file_layer(dir: &Path) -> Result<(BoxedLayer, WorkerGuard), ObservabilityError> {
    std::fs::create_dir_all(dir).map_err(|source| ObservabilityError::LogDir {
        path: dir.display().to_string(),
        source,
    })?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = fmt::layer().json().with_ansi(false).with_writer(writer).boxed();
    Ok((layer, guard))
}

/// Install the global subscriber described by `config`.
pub fn init_tracing(config: &LoggingConfig) -> Result<TracingGuard, ObservabilityError> {
    let filter = build_filter(&config.level)?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    layers.push(if config.json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_target(true).with_writer(std::io::stderr).boxed()
    });

    let mut guard = TracingGuard::default();
    if let Some(dir) = &config.file_dir {
        let (layer, worker) = file_layer(dir)?;
        layers.push(layer);
        guard._file = Some(worker);
    }

    tracing_subscriber::registry().with(layers).with(filter).try_init()?;

    tracing::debug!(
        level = %config.level,
        json = config.json,
        file_dir = ?config.file_dir,
        "tracing initialized"
    );
    Ok(guard)
}
