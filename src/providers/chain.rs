//! Ordered fallback across providers.

use std::fmt;

use thiserror::Error;

use super::{Outcome, Provider, ProviderContext, ProviderError};

/// Why the chain produced no configuration.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("error no config provider usable")]
    NoProviderUsable,

    #[error("no config provider succeeded ({} tried), last: {}", .attempts.len(), describe_last(.attempts))]
    Exhausted { attempts: Vec<Attempt> },
}

impl ChainError {
    /// The final attempt made before the chain gave up.
    pub fn last_attempt(&self) -> Option<&Attempt> {
        match self {
            ChainError::NoProviderUsable => None,
            ChainError::Exhausted { attempts } => attempts.last(),
        }
    }
}

fn describe_last(attempts: &[Attempt]) -> String {
    attempts
        .last()
        .map(ToString::to_string)
        .unwrap_or_else(|| "none".to_string())
}

/// A provider invocation that did not yield configuration.
#[derive(Debug)]
pub struct Attempt {
    pub provider: String,
    pub result: AttemptResult,
}

#[derive(Debug)]
pub enum AttemptResult {
    Skipped(String),
    Failed(ProviderError),
}

impl Attempt {
    pub fn is_skip(&self) -> bool {
        matches!(self.result, AttemptResult::Skipped(_))
    }
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            AttemptResult::Skipped(reason) => {
                write!(f, "provider {} skipped: {reason}", self.provider)
            }
            AttemptResult::Failed(err) => write!(f, "provider {} failed: {err}", self.provider),
        }
    }
}

/// Providers tried in insertion order until one succeeds.
#[derive(Default)]
pub struct ProviderChain {
    providers: Vec<Box<dyn Provider>>,
}

impl ProviderChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, provider: impl Provider + 'static) {
        self.providers.push(Box::new(provider));
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Fetch raw configuration from the first provider that succeeds.
    ///
    /// Skips and failures are logged and the next provider is tried; a
    /// failing provider never stops the chain.
    pub fn fetch(&self, ctx: &ProviderContext<'_>) -> Result<Vec<u8>, ChainError> {
        if self.providers.is_empty() {
            return Err(ChainError::NoProviderUsable);
        }

        let mut attempts = Vec::new();
        for provider in &self.providers {
            let name = provider.name();
            match provider.fetch(ctx) {
                Outcome::Success(content) => {
                    tracing::debug!(provider = name, bytes = content.len(), "config provider succeeded");
                    return Ok(content);
                }
                Outcome::Skip(reason) => {
                    tracing::info!(provider = name, reason = %reason, "config provider skipped");
                    attempts.push(Attempt {
                        provider: name.to_string(),
                        result: AttemptResult::Skipped(reason),
                    });
                }
                Outcome::Fail(err) => {
                    tracing::error!(provider = name, error = %err, "try get config via provider failed");
                    attempts.push(Attempt {
                        provider: name.to_string(),
                        result: AttemptResult::Failed(err),
                    });
                }
            }
        }

        Err(ChainError::Exhausted { attempts })
    }
}

impl fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderChain")
            .field("providers", &self.names())
            .finish()
    }
}
