//! `tracing` subscriber construction from a [`LogConfig`].
//!
//! The loader installs a bootstrap subscriber for the duration of a load so
//! its own diagnostics are visible before the service configures logging.
//! Services then call [`init`] with the `[log]` table they just loaded.

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use thiserror::Error;
use tracing::Level;
use tracing::subscriber::{DefaultGuard, NoSubscriber};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogConfig, LogEncoding};
use crate::constants::{DEFAULT_LOG_LEVEL, DEFAULT_LOG_OUTPUT};
use crate::env::Env;

type BoxedSubscriber = Box<dyn tracing::Subscriber + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum LogInitError {
    #[error("invalid log level {level:?}, expected one of trace|debug|info|warn|error")]
    InvalidLevel { level: String },

    #[error("failed to open log output {path}: {source}")]
    OpenOutput { path: PathBuf, source: io::Error },

    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled,
}

/// Install the subscriber described by `cfg` as the process-wide default.
pub fn init(cfg: &LogConfig, env: &Env) -> Result<(), LogInitError> {
    let subscriber = build(cfg, env)?;
    tracing::subscriber::set_global_default(subscriber).map_err(|_| LogInitError::AlreadyInstalled)
}

/// Install the subscriber described by `cfg` for the current thread until
/// the returned guard is dropped.
pub fn scoped(cfg: &LogConfig, env: &Env) -> Result<DefaultGuard, LogInitError> {
    let subscriber = build(cfg, env)?;
    Ok(tracing::subscriber::set_default(subscriber))
}

/// Whether any subscriber (global or thread default) is currently active.
pub fn subscriber_installed() -> bool {
    tracing::dispatcher::get_default(|dispatch| !dispatch.is::<NoSubscriber>())
}

/// Build a subscriber without installing it.
///
/// `RUST_LOG` takes precedence over `cfg.level` when set.
pub fn build(cfg: &LogConfig, env: &Env) -> Result<BoxedSubscriber, LogInitError> {
    let filter = filter(cfg, env)?;
    let writer = writer(&cfg.output)?;
    let with_source = !cfg.disable_stacktrace;

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match cfg.encoding {
        LogEncoding::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_file(with_source)
            .with_line_number(with_source)
            .with_writer(writer)
            .boxed(),
        LogEncoding::Console => fmt::layer()
            .with_ansi(false)
            .with_file(with_source)
            .with_line_number(with_source)
            .with_writer(writer)
            .boxed(),
    };

    Ok(Box::new(tracing_subscriber::registry().with(layer).with(filter)))
}

fn filter(cfg: &LogConfig, env: &Env) -> Result<EnvFilter, LogInitError> {
    let level = if cfg.level.is_empty() {
        DEFAULT_LOG_LEVEL
    } else {
        cfg.level.as_str()
    };
    let level = Level::from_str(level).map_err(|_| LogInitError::InvalidLevel {
        level: level.to_string(),
    })?;

    let from_env = env
        .var(EnvFilter::DEFAULT_ENV)
        .ok()
        .filter(|directives| !directives.is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok());
    Ok(from_env.unwrap_or_else(|| EnvFilter::default().add_directive(level.into())))
}

fn writer(output: &str) -> Result<BoxMakeWriter, LogInitError> {
    let output = if output.is_empty() { DEFAULT_LOG_OUTPUT } else { output };
    match output {
        "stdout" => Ok(BoxMakeWriter::new(io::stdout)),
        "stderr" => Ok(BoxMakeWriter::new(io::stderr)),
        path => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LogInitError::OpenOutput {
                    path: PathBuf::from(path),
                    source,
                })?;
            Ok(BoxMakeWriter::new(Mutex::new(file)))
        }
    }
}
