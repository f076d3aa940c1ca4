//! Nacos remote configuration provider.
//!
//! Connection coordinates come from the `NACOS_*` environment variables. When
//! a change listener is configured the provider registers it before the
//! initial fetch and hands the running subscription to the caller's
//! [`WatchHandle`].

mod client;
mod watch;

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use tracing::Level;

use crate::constants::{DEFAULT_NACOS_LOG_LEVEL, ENV_NACOS_LOG_LEVEL};
use crate::env::Env;

use super::{Outcome, Provider, ProviderContext, ProviderError};

pub use client::NacosSettings;
pub use watch::{ChangeEvent, ChangeListener, ConfigWatch, WatchHandle};

use client::NacosClient;
use watch::ClientLogLevel;

/// Fetches configuration from a Nacos server.
#[derive(Default)]
pub struct NacosProvider {
    listener: Option<ChangeListener>,
    watch_slot: Option<Arc<Mutex<Option<ConfigWatch>>>>,
    /// Verbosity of the client's own diagnostics; falls back to
    /// `NACOS_LOG_LEVEL`, then `error`.
    log_level: Option<String>,
}

impl NacosProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that subscribes `listener` to live changes.
    ///
    /// The returned handle owns the subscription once a fetch succeeds.
    pub fn with_listener(
        listener: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> (Self, WatchHandle) {
        let (handle, slot) = WatchHandle::new();
        let provider = Self {
            listener: Some(Arc::new(listener)),
            watch_slot: Some(slot),
            log_level: None,
        };
        (provider, handle)
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    fn client_log_level(&self, env: &Env) -> ClientLogLevel {
        let raw = self
            .log_level
            .clone()
            .filter(|l| !l.is_empty())
            .or_else(|| env.var(ENV_NACOS_LOG_LEVEL).ok().filter(|l| !l.is_empty()))
            .unwrap_or_else(|| DEFAULT_NACOS_LOG_LEVEL.to_string());
        let level = Level::from_str(&raw).unwrap_or_else(|_| {
            tracing::warn!(level = %raw, "unknown nacos log level, using {DEFAULT_NACOS_LOG_LEVEL}");
            Level::ERROR
        });
        ClientLogLevel(level)
    }
}

impl Provider for NacosProvider {
    fn name(&self) -> &str {
        "nacos"
    }

    fn fetch(&self, ctx: &ProviderContext<'_>) -> Outcome {
        tracing::info!("begin create nacos client");
        let settings = match NacosSettings::from_env(ctx.env()) {
            Ok(settings) => settings,
            Err(e) => return Outcome::Fail(e),
        };
        let client = match NacosClient::new(settings) {
            Ok(client) => client,
            Err(e) => return Outcome::Fail(e),
        };

        let mut watch = match (&self.listener, &self.watch_slot) {
            (Some(listener), Some(_)) => {
                tracing::info!("begin setup nacos config change listener");
                match ConfigWatch::start(
                    client.clone(),
                    Arc::clone(listener),
                    self.client_log_level(ctx.env()),
                ) {
                    Ok(watch) => Some(watch),
                    Err(e) => return Outcome::Fail(ProviderError::Listen(e.to_string())),
                }
            }
            _ => None,
        };

        tracing::info!("begin get config via nacos api");
        let content = match client.get_config() {
            Ok(content) => content,
            Err(e) => return Outcome::Fail(e),
        };
        if content.is_empty() {
            return Outcome::Fail(ProviderError::EmptyConfig {
                origin: self.name().to_string(),
            });
        }

        if let (Some(mut watch), Some(slot)) = (watch.take(), &self.watch_slot) {
            watch.arm(&content);
            watch::install(slot, watch);
        }

        tracing::info!(data_id = %client.settings().data_id, "read config from nacos success");
        Outcome::Success(content.into_bytes())
    }
}
