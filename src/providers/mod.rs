//! Configuration providers and the chain that tries them in order.
//!
//! A [`Provider`] produces the raw bytes of one configuration source. It
//! answers every fetch with an [`Outcome`]: the bytes, a request to be
//! skipped, or a failure. The [`ProviderChain`] walks providers in order and
//! stops at the first success.

pub mod chain;
pub mod file;
pub mod nacos;
pub mod text;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::env::Env;

pub use chain::{Attempt, AttemptResult, ChainError, ProviderChain};
pub use file::FileProvider;
pub use nacos::{ChangeEvent, NacosProvider, WatchHandle};
pub use text::TextProvider;

/// Errors a provider reports through [`Outcome::Fail`].
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("got empty config from {origin}")]
    EmptyConfig { origin: String },

    #[error("empty config file path: no --config given and no default path configured")]
    EmptyConfigFile,

    #[error("read config from local file failed, file={}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no nacos config env vars found, abort loading. {0}")]
    MissingEnv(String),

    #[error("read config from nacos failed: {0}")]
    Remote(String),

    #[error("nacos config listener registration failed: {0}")]
    Listen(String),
}

/// Result of a single provider invocation.
#[derive(Debug)]
pub enum Outcome {
    /// Raw configuration bytes; halts the chain.
    Success(Vec<u8>),
    /// The source is not applicable here. Logged at info, never an error.
    Skip(String),
    /// The source was expected to work but did not.
    Fail(ProviderError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

/// Shared inputs handed to every provider in a chain.
#[derive(Debug, Clone, Copy)]
pub struct ProviderContext<'a> {
    config_file: Option<&'a Path>,
    env: &'a Env,
}

impl<'a> ProviderContext<'a> {
    pub fn new(config_file: Option<&'a Path>, env: &'a Env) -> Self {
        Self { config_file, env }
    }

    /// Config file path resolved from the command line, if any.
    ///
    /// An empty path is reported as `None`.
    pub fn config_file(&self) -> Option<&'a Path> {
        self.config_file.filter(|p| !p.as_os_str().is_empty())
    }

    pub fn env(&self) -> &'a Env {
        self.env
    }
}

/// A strategy for obtaining raw configuration bytes from one source.
///
/// Implementations are invoked at most once per load and must not retry
/// internally across the whole chain; the chain decides what happens next.
pub trait Provider: Send + Sync {
    /// Name used in log lines and diagnostics.
    fn name(&self) -> &str;

    /// Try to produce configuration bytes.
    fn fetch(&self, ctx: &ProviderContext<'_>) -> Outcome;
}
