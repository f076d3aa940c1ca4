//! confload: demo service showing the config loader end to end.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! ergonomic error propagation and user-facing messages.

use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use validator::Validate;

use confload::config::{Base, Loader};
use confload::constants;
use confload::dump::validate_config;
use confload::env::Env;
use confload::logging;
use confload::providers::{ChangeEvent, FileProvider, NacosProvider, TextProvider};

const DEFAULT_CONFIG: &[u8] = include_bytes!("../assets/default.toml");

/// Configuration of the demo service.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
struct DemoConfig {
    #[serde(flatten)]
    base: Base,

    #[validate(nested)]
    http: HttpConfig,
}

confload::embed_base!(DemoConfig, base);

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
struct HttpConfig {
    #[validate(length(min = 1, message = "listen address must not be empty"))]
    listen: String,
    #[validate(range(min = 1, max = 65535))]
    port: u32,
    #[validate(range(min = 1))]
    read_timeout_ms: u64,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let watch_requested = Arc::new(AtomicBool::new(false));
    let watch_flag = Arc::clone(&watch_requested);

    let (nacos, watch) = NacosProvider::with_listener(on_config_change);

    let loader = Loader::<DemoConfig>::builder()
        .service_name(env!("CARGO_PKG_NAME"))
        .service_version(constants::VERSION)
        .short_description("Loads its configuration from a local file, Nacos or built-in defaults.")
        .provider(FileProvider::with_optional_default("config.toml"))
        .provider(nacos)
        .provider(TextProvider::from_static(DEFAULT_CONFIG))
        .register_flags(
            |cmd| {
                cmd.arg(
                    Arg::new("watch")
                        .long("watch")
                        .action(ArgAction::SetTrue)
                        .help("keep running and print Nacos config changes"),
                )
            },
            move |matches| watch_flag.store(matches.get_flag("watch"), Ordering::SeqCst),
        )
        .inspect(|cfg: &DemoConfig| validate_config(cfg).context("invalid demo config"))
        .build();

    let mut cfg = DemoConfig::default();
    loader.load(&mut cfg)?;

    logging::init(&cfg.base.log, &Env::real()).context("failed to initialize logging")?;
    print_summary(loader.identity().banner(), &cfg);

    if watch_requested.load(Ordering::SeqCst) {
        if !watch.is_active() {
            anyhow::bail!("--watch needs the config to come from Nacos");
        }
        eprintln!("{}", "watching Nacos for changes, Ctrl-C to quit".dimmed());
        while watch.is_active() {
            thread::park();
        }
    }
    Ok(())
}

fn on_config_change(event: &ChangeEvent) {
    tracing::info!(
        namespace = %event.namespace,
        group = %event.group,
        data_id = %event.data_id,
        bytes = event.data.len(),
        "nacos config changed"
    );
    println!(
        "{} {}/{}/{} ({} bytes)",
        "config changed:".yellow().bold(),
        event.namespace,
        event.group,
        event.data_id,
        event.data.len()
    );
}

fn print_summary(banner: String, cfg: &DemoConfig) {
    let on_off = |enabled: bool| if enabled { "on".green() } else { "off".dimmed() };

    println!("{}", banner.bold());
    println!("{}   {}:{}", "listen:".dimmed(), cfg.http.listen, cfg.http.port);
    println!("{}  {}", "tracing:".dimmed(), on_off(cfg.base.tracing));
    println!("{}   {}", "metric:".dimmed(), on_off(cfg.base.metric));
    println!("{}  {}", "profile:".dimmed(), on_off(cfg.base.profile));
    if !cfg.base.otlp_grpc_endpoint.is_empty() {
        println!("{}     {}", "otlp:".dimmed(), cfg.base.otlp_grpc_endpoint);
    }
}
