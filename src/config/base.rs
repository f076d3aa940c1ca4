//! Common fields every service configuration embeds.

use serde::{Deserialize, Serialize};

use crate::constants::ENV_OTLP_GRPC_ENDPOINT;
use crate::env::Env;

/// Telemetry toggles and logging settings shared by all services.
///
/// Embed it in a service config with `#[serde(flatten)]` so its keys sit at
/// the top level of the document:
///
/// ```toml
/// tracing = true
/// otlp_grpc_endpoint = "otel-collector:4317"
///
/// [log]
/// level = "debug"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Base {
    /// OpenTelemetry tracing.
    pub tracing: bool,
    /// Runtime profiling endpoints.
    pub profile: bool,
    /// Prometheus metrics.
    pub metric: bool,
    pub metric_go: bool,
    pub metric_process: bool,

    pub otlp_grpc_endpoint: String,

    pub log: LogConfig,
}

impl Base {
    /// Fill `otlp_grpc_endpoint` from `OTLP_GRPC_ENDPOINT` when the source left
    /// it empty. An explicit value always wins.
    pub fn init_otlp_grpc_endpoint_from_env(&mut self, env: &Env) {
        if !self.otlp_grpc_endpoint.is_empty() {
            return;
        }
        if let Ok(endpoint) = env.var(ENV_OTLP_GRPC_ENDPOINT) {
            if !endpoint.is_empty() {
                self.otlp_grpc_endpoint = endpoint;
            }
        }
    }
}

/// Output encoding for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogEncoding {
    #[default]
    Json,
    Console,
}

/// Logging settings carried in the `[log]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Empty, or one of trace|debug|info|warn|error.
    pub level: String,
    /// `stdout`, `stderr`, or a file path. Empty means stderr.
    pub output: String,
    pub encoding: LogEncoding,
    /// Leave source file and line out of log lines.
    pub disable_stacktrace: bool,
}
