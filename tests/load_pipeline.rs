//! End-to-end load scenarios through the public API.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use clap::{Arg, ArgMatches};
use confload::codec::{UnmarshalError, json_unmarshal};
use confload::config::{Base, Completion, LoadError, Loader, LoaderBuilder, ServiceConfig};
use confload::env::Env;
use confload::flags::ParsedFlags;
use confload::providers::{
    ChainError, FileProvider, NacosProvider, Outcome, Provider, ProviderContext, TextProvider,
};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct AppConfig {
    #[serde(flatten)]
    base: Base,
    db: Db,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct Db {
    dsn: String,
    pool: u32,
}

confload::embed_base!(AppConfig, base);

#[derive(Debug, Default, Serialize, Deserialize)]
struct Bare {
    name: String,
}

impl ServiceConfig for Bare {
    fn base(&self) -> Option<&Base> {
        None
    }

    fn base_mut(&mut self) -> Option<&mut Base> {
        None
    }
}

/// Provider that records how often it was asked.
struct Counting {
    calls: Arc<AtomicUsize>,
    outcome: fn() -> Outcome,
}

impl Provider for Counting {
    fn name(&self) -> &str {
        "counting"
    }

    fn fetch(&self, _ctx: &ProviderContext<'_>) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.outcome)()
    }
}

fn builder<C: ServiceConfig>() -> LoaderBuilder<C> {
    Loader::<C>::builder()
        .service_name("billing")
        .service_version("1.2.3")
        .args(["billing"])
        .env(Env::empty())
        .install_default_subscriber(false)
}

struct Output {
    result: Result<Completion, LoadError>,
    out: String,
    err: String,
}

fn load<C: ServiceConfig>(loader: &Loader<C>, cfg: &mut C) -> Output {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let result = loader.load_with(cfg, &mut out, &mut err);
    Output {
        result,
        out: String::from_utf8(out).unwrap(),
        err: String::from_utf8(err).unwrap(),
    }
}

#[test]
fn text_provider_sets_tracing() {
    let loader = builder::<AppConfig>()
        .provider(TextProvider::new("tracing = true\n"))
        .build();
    let mut cfg = AppConfig::default();
    let output = load(&loader, &mut cfg);
    assert_eq!(output.result.unwrap(), Completion::Loaded);
    assert!(cfg.base.tracing);
}

#[test]
fn empty_text_falls_through_to_next_provider() {
    let loader = builder::<AppConfig>()
        .provider(TextProvider::new(""))
        .provider(TextProvider::new("[db]\npool = 4\n"))
        .build();
    let mut cfg = AppConfig::default();
    load(&loader, &mut cfg).result.unwrap();
    assert_eq!(cfg.db.pool, 4);
}

#[test]
fn config_without_base_fails_before_any_io() {
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = builder::<Bare>()
        .provider(Counting {
            calls: Arc::clone(&calls),
            outcome: || Outcome::Success(b"name = \"x\"".to_vec()),
        })
        .build();
    let output = load(&loader, &mut Bare::default());
    assert!(matches!(output.result, Err(LoadError::Structural { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn chain_stops_at_first_success() {
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let third = Arc::new(AtomicUsize::new(0));
    let loader = builder::<AppConfig>()
        .provider(Counting {
            calls: Arc::clone(&first),
            outcome: || Outcome::Skip("not here".to_string()),
        })
        .provider(Counting {
            calls: Arc::clone(&second),
            outcome: || Outcome::Success(b"[db]\ndsn = \"mem\"\n".to_vec()),
        })
        .provider(Counting {
            calls: Arc::clone(&third),
            outcome: || Outcome::Success(b"[db]\ndsn = \"never\"\n".to_vec()),
        })
        .build();
    let mut cfg = AppConfig::default();
    load(&loader, &mut cfg).result.unwrap();
    assert_eq!(cfg.db.dsn, "mem");
    assert_eq!(
        [first.load(Ordering::SeqCst), second.load(Ordering::SeqCst), third.load(Ordering::SeqCst)],
        [1, 1, 0]
    );
}

#[test]
fn explicit_config_flag_beats_default_path() {
    let dir = tempfile::tempdir().unwrap();
    let explicit = dir.path().join("explicit.toml");
    let default = dir.path().join("default.toml");
    fs::write(&explicit, "[db]\ndsn = \"explicit\"\n").unwrap();
    fs::write(&default, "[db]\ndsn = \"default\"\n").unwrap();

    let loader = builder::<AppConfig>()
        .args(["billing".to_string(), "-c".to_string(), explicit.display().to_string()])
        .provider(FileProvider::with_optional_default(&default))
        .build();
    let mut cfg = AppConfig::default();
    load(&loader, &mut cfg).result.unwrap();
    assert_eq!(cfg.db.dsn, "explicit");
}

#[test]
fn missing_default_file_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let loader = builder::<AppConfig>()
        .provider(FileProvider::with_optional_default(dir.path().join("absent.toml")))
        .provider(NacosProvider::new())
        .provider(TextProvider::new("metric = true\n"))
        .build();
    let mut cfg = AppConfig::default();
    load(&loader, &mut cfg).result.unwrap();
    assert!(cfg.base.metric);
}

#[test]
fn all_providers_failing_surfaces_last_attempt() {
    let loader = builder::<AppConfig>()
        .provider(FileProvider::default())
        .provider(TextProvider::new(""))
        .build();
    let output = load(&loader, &mut AppConfig::default());
    match output.result {
        Err(LoadError::Provider(err @ ChainError::Exhausted { .. })) => {
            assert_eq!(err.last_attempt().map(|a| a.provider.as_str()), Some("text"));
        }
        other => panic!("expected exhausted chain, got {other:?}"),
    }
}

#[test]
fn empty_chain_is_not_usable() {
    let loader = builder::<AppConfig>().build();
    let output = load(&loader, &mut AppConfig::default());
    assert!(matches!(
        output.result,
        Err(LoadError::Provider(ChainError::NoProviderUsable))
    ));
}

#[test]
fn dump_flag_with_failing_providers_prints_defaults() {
    let loader = builder::<AppConfig>()
        .args(["billing", "--dump"])
        .provider(TextProvider::new(""))
        .build();
    let mut cfg = AppConfig::default();
    let output = load(&loader, &mut cfg);
    assert_eq!(output.result.unwrap(), Completion::Exit(0));

    let (banner, body) = output.out.split_once('\n').unwrap();
    assert_eq!(banner, format!("# {}", loader.identity().banner()));
    assert!(banner.starts_with("# billing version 1.2.3 ("));
    assert!(output.err.contains("config dump success"));

    let parsed: AppConfig = toml::from_str(body).unwrap();
    assert_eq!(parsed, AppConfig::default());
}

#[derive(Debug, Serialize, Deserialize)]
struct Listener {
    #[serde(flatten)]
    base: Base,
    listen: String,
}

confload::embed_base!(Listener, base);

#[test]
fn dump_without_content_keeps_required_fields() {
    let loader = builder::<Listener>()
        .args(["billing", "--dump"])
        .provider(TextProvider::new(""))
        .build();
    let mut cfg = Listener {
        base: Base::default(),
        listen: String::new(),
    };
    let output = load(&loader, &mut cfg);
    assert_eq!(output.result.unwrap(), Completion::Exit(0));
    assert!(output.out.contains("listen = \"\""));
}

#[test]
fn dump_without_content_shows_prefilled_values() {
    let loader = builder::<Listener>()
        .args(["billing", "--dump"])
        .provider(TextProvider::new(""))
        .build();
    let mut cfg = Listener {
        base: Base::default(),
        listen: "0.0.0.0:8080".to_string(),
    };
    let output = load(&loader, &mut cfg);
    assert_eq!(output.result.unwrap(), Completion::Exit(0));
    assert_eq!(cfg.listen, "0.0.0.0:8080");
    assert!(output.out.contains("listen = \"0.0.0.0:8080\""));
}

#[test]
fn dump_reflects_loaded_values() {
    let loader = builder::<AppConfig>()
        .env(Env::from_vars([("XXX_DUMP_DEMO_CFG", "yes")]))
        .provider(TextProvider::new("[db]\ndsn = \"postgres://db\"\npool = 9\n"))
        .build();
    let output = load(&loader, &mut AppConfig::default());
    assert_eq!(output.result.unwrap(), Completion::Exit(0));
    assert!(output.out.contains("dsn = \"postgres://db\""));
    assert!(output.out.contains("pool = 9"));
}

#[test]
fn parse_error_is_fatal_even_in_dump_mode() {
    let loader = builder::<AppConfig>()
        .args(["billing", "--dump"])
        .provider(TextProvider::new("[db]\npool = \"many\"\n"))
        .build();
    let output = load(&loader, &mut AppConfig::default());
    match output.result {
        Err(LoadError::Parse(err)) => {
            assert_eq!(err.position().map(|p| p.row), Some(2));
        }
        other => panic!("expected parse error, got {other:?}"),
    }
    assert!(output.out.is_empty());
}

#[test]
fn otlp_endpoint_comes_from_env_only_when_unset() {
    let env = Env::from_vars([("OTLP_GRPC_ENDPOINT", "collector:4317")]);

    let loader = builder::<AppConfig>()
        .env(env.clone())
        .provider(TextProvider::new("tracing = true\n"))
        .build();
    let mut cfg = AppConfig::default();
    load(&loader, &mut cfg).result.unwrap();
    assert_eq!(cfg.base.otlp_grpc_endpoint, "collector:4317");

    let loader = builder::<AppConfig>()
        .env(env)
        .provider(TextProvider::new("otlp_grpc_endpoint = \"local:4317\"\n"))
        .build();
    let mut cfg = AppConfig::default();
    load(&loader, &mut cfg).result.unwrap();
    assert_eq!(cfg.base.otlp_grpc_endpoint, "local:4317");
}

#[test]
fn help_prints_usage_and_exits() {
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = builder::<AppConfig>()
        .args(["billing", "-h"])
        .short_description("Billing service")
        .provider(Counting {
            calls: Arc::clone(&calls),
            outcome: || Outcome::Success(Vec::new()),
        })
        .build();
    let output = load(&loader, &mut AppConfig::default());
    assert_eq!(output.result.unwrap(), Completion::Exit(0));
    assert!(output.err.contains("billing [OPTIONS]"));
    assert!(output.err.contains("Billing service"));
    assert!(output.err.contains("--config"));
    assert!(output.out.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn version_prints_banner_and_exits() {
    let loader = builder::<AppConfig>().args(["billing", "--version"]).build();
    let output = load(&loader, &mut AppConfig::default());
    assert_eq!(output.result.unwrap(), Completion::Exit(0));
    assert_eq!(output.out.trim_end(), loader.identity().banner());
    assert!(output.out.starts_with("billing version 1.2.3 ("));
}

#[test]
fn inspect_failure_is_wrapped() {
    let loader = builder::<AppConfig>()
        .provider(TextProvider::new("[db]\npool = 0\n"))
        .inspect(|cfg: &AppConfig| {
            anyhow::ensure!(cfg.db.pool > 0, "db.pool must be positive");
            Ok(())
        })
        .build();
    let output = load(&loader, &mut AppConfig::default());
    let err = output.result.unwrap_err();
    assert!(matches!(err, LoadError::Validation(_)));
    assert_eq!(
        err.to_string(),
        "inspect config failed with error: db.pool must be positive"
    );
}

#[test]
fn custom_unmarshaler_is_used() {
    let loader = builder::<AppConfig>()
        .provider(TextProvider::new(r#"{"db": {"dsn": "json://db", "pool": 2}}"#))
        .unmarshaler(|content: &[u8], cfg: &mut AppConfig| -> Result<(), UnmarshalError> {
            json_unmarshal(content, cfg)
        })
        .build();
    let mut cfg = AppConfig::default();
    load(&loader, &mut cfg).result.unwrap();
    assert_eq!(
        cfg.db,
        Db {
            dsn: "json://db".to_string(),
            pool: 2
        }
    );
}

#[test]
fn registered_flags_are_parsed_alongside_defaults() {
    let listen = Arc::new(Mutex::new(String::new()));
    let sink = Arc::clone(&listen);
    let loader = builder::<AppConfig>()
        .args(["billing", "--listen", ":9090"])
        .register_flags(
            |cmd| cmd.arg(Arg::new("listen").long("listen")),
            move |matches: &ArgMatches| {
                if let Some(value) = matches.get_one::<String>("listen") {
                    *sink.lock().unwrap() = value.clone();
                }
            },
        )
        .provider(TextProvider::new("tracing = false\n"))
        .build();
    load(&loader, &mut AppConfig::default()).result.unwrap();
    assert_eq!(*listen.lock().unwrap(), ":9090");
}

#[test]
fn custom_flag_parser_supplies_config_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("svc.toml");
    fs::write(&path, "profile = true\n").unwrap();

    let flag_path = path.clone();
    let loader = builder::<AppConfig>()
        .flag_parser(move || ParsedFlags {
            config_file: Some(flag_path.clone()),
            ..Default::default()
        })
        .provider(FileProvider::default())
        .build();
    let mut cfg = AppConfig::default();
    load(&loader, &mut cfg).result.unwrap();
    assert!(cfg.base.profile);
}

#[test]
fn loader_is_reusable() {
    let loader = builder::<AppConfig>()
        .provider(TextProvider::new("[db]\npool = 3\n"))
        .build();
    for _ in 0..2 {
        let mut cfg = AppConfig::default();
        load(&loader, &mut cfg).result.unwrap();
        assert_eq!(cfg.db.pool, 3);
    }
}
