//! Crate-wide constants.
//!
//! Centralises environment variable names, flag names and default values so
//! the loader, the providers and the demo binary agree on them.

/// Crate version, reported by the demo binary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Target triple this build was compiled for (set by `build.rs`).
pub const TARGET: &str = env!("TARGET");

/// Service name used when the caller does not configure one.
pub const UNDEFINED_SERVICE: &str = "undefined";

// ── Environment variable names ──────────────────────────────────────

pub const ENV_NACOS_HOST: &str = "NACOS_HOST";
pub const ENV_NACOS_PORT: &str = "NACOS_PORT";
pub const ENV_NACOS_NAMESPACE: &str = "NACOS_NAMESPACE";
pub const ENV_NACOS_GROUP: &str = "NACOS_GROUP";
pub const ENV_NACOS_DATA_ID: &str = "NACOS_DATAID";
pub const ENV_NACOS_LOG_LEVEL: &str = "NACOS_LOG_LEVEL";

pub const ENV_OTLP_GRPC_ENDPOINT: &str = "OTLP_GRPC_ENDPOINT";

/// Non-empty value switches the loader into dump mode, same as `--dump`.
pub const ENV_DUMP_DEMO_CONFIG: &str = "XXX_DUMP_DEMO_CFG";

// ── Flags ───────────────────────────────────────────────────────────

pub const FLAG_CONFIG_FILE: &str = "config";
pub const FLAG_DUMP_CONFIG: &str = "dump";
pub const FLAG_VERSION: &str = "version";
pub const FLAG_HELP: &str = "help";

// ── Defaults ────────────────────────────────────────────────────────

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_OUTPUT: &str = "stderr";

/// The Nacos client logs routine polling at info, so keep it quiet by default.
pub const DEFAULT_NACOS_LOG_LEVEL: &str = "error";

/// Port used when `NACOS_PORT` is present but not a number.
pub const DEFAULT_NACOS_PORT: u16 = 80;

pub const NACOS_CONTEXT_PATH: &str = "/nacos";

/// Fixed request timeout for the Nacos open API.
pub const NACOS_TIMEOUT_MS: u64 = 5000;

/// How long the server may hold a listener long-poll before answering.
pub const NACOS_LONG_POLL_TIMEOUT_MS: u64 = 30000;

// ── Exit codes ──────────────────────────────────────────────────────

pub const EXIT_OK: i32 = 0;
pub const EXIT_DUMP_FAILED: i32 = 2;
