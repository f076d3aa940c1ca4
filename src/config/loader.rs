//! The load pipeline.
//!
//! Steps run in a fixed order for every load:
//! 1. Structural check (the config type must embed [`Base`](super::Base))
//! 2. Command-line flags (help and version end the load here)
//! 3. Bootstrap logging
//! 4. Unmarshaler selection
//! 5. Provider chain fetch
//! 6. Unmarshal
//! 7. Environment overrides
//! 8. Before-inspect hook
//! 9. Dump (ends the load when requested)
//! 10. Inspect hook

use std::any::type_name;
use std::ffi::OsString;
use std::fmt;
use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use clap::{ArgMatches, Command};
use thiserror::Error;

use super::{LogConfig, LogEncoding, ServiceConfig};
use crate::codec::{Unmarshaler, UnmarshalError, marshal_indent, toml_unmarshal};
use crate::constants::{ENV_DUMP_DEMO_CONFIG, EXIT_DUMP_FAILED, EXIT_OK};
use crate::dump;
use crate::env::Env;
use crate::flags::{self, ParsedFlags, ReadFlags, RegisterFlags};
use crate::logging;
use crate::providers::{ChainError, Provider, ProviderChain, ProviderContext};
use crate::version::ServiceIdentity;

/// Hook that may reject a loaded configuration.
pub type InspectHook<C> = Arc<dyn Fn(&C) -> anyhow::Result<()> + Send + Sync>;

/// Hook that observes the configuration before it is dumped or inspected.
pub type BeforeInspectHook<C> = Arc<dyn Fn(&C) + Send + Sync>;

/// Replacement for the default command-line parser.
pub type FlagParser = Arc<dyn Fn() -> ParsedFlags + Send + Sync>;

/// Errors that end a load.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(
        "no embedded Base found in {type_name}, embed confload::config::Base in your config struct and implement ServiceConfig"
    )]
    Structural { type_name: &'static str },

    #[error("failed to parse command line: {0}")]
    Flags(#[from] clap::Error),

    #[error(transparent)]
    Provider(#[from] ChainError),

    #[error("unmarshal config failed: {0}")]
    Parse(#[from] UnmarshalError),

    #[error("inspect config failed with error: {0:#}")]
    Validation(anyhow::Error),
}

/// How a load ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The configuration is ready to use.
    Loaded,
    /// Help, version or a dump was served; the process should exit with this code.
    Exit(i32),
}

/// Loads a service configuration through a provider chain.
///
/// Built once with [`Loader::builder`] and reusable across loads.
pub struct Loader<C> {
    identity: ServiceIdentity,
    usage: String,
    short_description: String,
    chain: ProviderChain,
    unmarshaler: Option<Unmarshaler<C>>,
    inspect: Option<InspectHook<C>>,
    before_inspect: Option<BeforeInspectHook<C>>,
    dump_marshalled_config: bool,
    register_flags: Option<RegisterFlags>,
    read_flags: Option<ReadFlags>,
    flag_parser: Option<FlagParser>,
    args: Option<Vec<OsString>>,
    env: Env,
    install_default_subscriber: bool,
}

impl<C> fmt::Debug for Loader<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("identity", &self.identity)
            .field("chain", &self.chain)
            .field("custom_unmarshaler", &self.unmarshaler.is_some())
            .field("inspect", &self.inspect.is_some())
            .field("dump_marshalled_config", &self.dump_marshalled_config)
            .finish_non_exhaustive()
    }
}

impl<C: ServiceConfig> Loader<C> {
    pub fn builder() -> LoaderBuilder<C> {
        LoaderBuilder::default()
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    /// Load into `cfg`, exiting the process when help, version or a dump was
    /// requested.
    pub fn load(&self, cfg: &mut C) -> Result<(), LoadError> {
        match self.load_with(cfg, &mut io::stdout(), &mut io::stderr())? {
            Completion::Loaded => Ok(()),
            Completion::Exit(code) => process::exit(code),
        }
    }

    /// Load into `cfg`, writing user-facing output to `out` and `err`.
    ///
    /// Never exits the process; [`Completion::Exit`] carries the code instead.
    pub fn load_with(
        &self,
        cfg: &mut C,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<Completion, LoadError> {
        if cfg.base_mut().is_none() {
            return Err(LoadError::Structural {
                type_name: type_name::<C>(),
            });
        }

        let flags = self.parse_flags()?;
        if flags.show_help {
            let _ = writeln!(err, "{}", flags.usage.trim_end());
            return Ok(Completion::Exit(EXIT_OK));
        }
        if flags.show_version {
            let _ = writeln!(out, "{}", self.identity.banner());
            return Ok(Completion::Exit(EXIT_OK));
        }

        let _log_guard = self.bootstrap_logging(err);
        let span = tracing::info_span!(
            "config_load",
            service = %self.identity.name,
            version = %self.identity.version,
        );
        let _entered = span.enter();

        let unmarshal: Unmarshaler<C> = match &self.unmarshaler {
            Some(custom) => {
                tracing::info!("using custom unmarshaler");
                Arc::clone(custom)
            }
            None => {
                tracing::info!("using default TOML unmarshaler");
                Arc::new(|content: &[u8], cfg: &mut C| toml_unmarshal(content, cfg))
            }
        };

        let dump_mode = flags.dump_config || self.env.is_set(ENV_DUMP_DEMO_CONFIG);

        let ctx = ProviderContext::new(flags.config_file.as_deref(), &self.env);
        let content = match self.chain.fetch(&ctx) {
            Ok(content) => content,
            Err(e) if dump_mode => {
                tracing::warn!(error = %e, "no config content available, dumping defaults");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        unmarshal(content.as_slice(), &mut *cfg)?;
        cfg.apply_env_overrides(&self.env);
        tracing::info!(config = ?cfg, "config loaded successfully");

        if let Some(hook) = &self.before_inspect {
            hook(&*cfg);
        }

        if dump_mode {
            tracing::info!("begin dump demo config");
            return Ok(match dump::dump_demo(&*cfg, &self.identity, out, err) {
                Ok(()) => Completion::Exit(EXIT_OK),
                Err(e) => {
                    let _ = writeln!(err, "{e}");
                    Completion::Exit(EXIT_DUMP_FAILED)
                }
            });
        }

        if self.dump_marshalled_config {
            match marshal_indent(&*cfg) {
                Ok(text) => {
                    let _ = writeln!(
                        err,
                        "--------- begin dump toml encoded config --------- :\n{text}"
                    );
                }
                Err(e) => tracing::error!(error = %e, config = ?cfg, "toml encode failed"),
            }
        }

        if let Some(inspect) = &self.inspect {
            inspect(&*cfg).map_err(LoadError::Validation)?;
        }
        Ok(Completion::Loaded)
    }

    fn parse_flags(&self) -> Result<ParsedFlags, LoadError> {
        if let Some(parser) = &self.flag_parser {
            return Ok(parser());
        }

        let mut cmd = flags::command(&self.identity.name, &self.usage, &self.short_description);
        if let Some(register) = &self.register_flags {
            cmd = register(cmd);
        }
        let parsed = match &self.args {
            Some(args) => flags::parse_from(cmd, args.iter().cloned(), self.read_flags.as_ref()),
            None => flags::parse_from(cmd, std::env::args_os(), self.read_flags.as_ref()),
        };
        Ok(parsed?)
    }

    fn bootstrap_logging(&self, err: &mut dyn Write) -> Option<tracing::subscriber::DefaultGuard> {
        if !self.install_default_subscriber || logging::subscriber_installed() {
            return None;
        }
        let bootstrap = LogConfig {
            encoding: LogEncoding::Json,
            ..Default::default()
        };
        match logging::scoped(&bootstrap, &self.env) {
            Ok(guard) => Some(guard),
            Err(e) => {
                let _ = writeln!(err, "Warning: failed to set up config loader logging: {e}");
                None
            }
        }
    }
}

/// Builder for [`Loader`].
pub struct LoaderBuilder<C> {
    service_name: String,
    service_version: String,
    usage: Option<String>,
    short_description: String,
    chain: ProviderChain,
    unmarshaler: Option<Unmarshaler<C>>,
    inspect: Option<InspectHook<C>>,
    before_inspect: Option<BeforeInspectHook<C>>,
    dump_marshalled_config: bool,
    register_flags: Option<RegisterFlags>,
    read_flags: Option<ReadFlags>,
    flag_parser: Option<FlagParser>,
    args: Option<Vec<OsString>>,
    env: Env,
    install_default_subscriber: bool,
}

impl<C> Default for LoaderBuilder<C> {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            service_version: String::new(),
            usage: None,
            short_description: String::new(),
            chain: ProviderChain::new(),
            unmarshaler: None,
            inspect: None,
            before_inspect: None,
            dump_marshalled_config: false,
            register_flags: None,
            read_flags: None,
            flag_parser: None,
            args: None,
            env: Env::real(),
            install_default_subscriber: true,
        }
    }
}

impl<C: ServiceConfig> LoaderBuilder<C> {
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    pub fn service_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Usage line shown by `--help`. Defaults to `<service> [OPTIONS]`.
    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    pub fn short_description(mut self, description: impl Into<String>) -> Self {
        self.short_description = description.into();
        self
    }

    /// Append a provider to the chain. Providers are tried in the order added.
    pub fn provider(mut self, provider: impl Provider + 'static) -> Self {
        self.chain.push(provider);
        self
    }

    /// Replace the whole chain.
    pub fn providers(mut self, chain: ProviderChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn unmarshaler(
        mut self,
        unmarshal: impl Fn(&[u8], &mut C) -> Result<(), UnmarshalError> + Send + Sync + 'static,
    ) -> Self {
        self.unmarshaler = Some(Arc::new(unmarshal));
        self
    }

    pub fn inspect(
        mut self,
        inspect: impl Fn(&C) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.inspect = Some(Arc::new(inspect));
        self
    }

    pub fn before_inspect(mut self, hook: impl Fn(&C) + Send + Sync + 'static) -> Self {
        self.before_inspect = Some(Arc::new(hook));
        self
    }

    /// Print the final configuration as TOML to stderr after loading.
    pub fn dump_marshalled_config(mut self, enabled: bool) -> Self {
        self.dump_marshalled_config = enabled;
        self
    }

    /// Add flags to the default parser and read them back after parsing.
    pub fn register_flags(
        mut self,
        register: impl Fn(Command) -> Command + Send + Sync + 'static,
        read: impl Fn(&ArgMatches) + Send + Sync + 'static,
    ) -> Self {
        self.register_flags = Some(Arc::new(register));
        self.read_flags = Some(Arc::new(read));
        self
    }

    /// Replace the default flag parser.
    pub fn flag_parser(mut self, parser: impl Fn() -> ParsedFlags + Send + Sync + 'static) -> Self {
        self.flag_parser = Some(Arc::new(parser));
        self
    }

    /// Parse these arguments (binary name first) instead of the process's.
    pub fn args<I, T>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    pub fn env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }

    /// Whether the loader sets up its own JSON-to-stderr logging for the
    /// duration of a load when no subscriber is active. Enabled by default.
    pub fn install_default_subscriber(mut self, enabled: bool) -> Self {
        self.install_default_subscriber = enabled;
        self
    }

    pub fn build(self) -> Loader<C> {
        let identity = ServiceIdentity::new(self.service_name, self.service_version);
        let usage = self
            .usage
            .unwrap_or_else(|| format!("{} [OPTIONS]", identity.name));
        Loader {
            identity,
            usage,
            short_description: self.short_description,
            chain: self.chain,
            unmarshaler: self.unmarshaler,
            inspect: self.inspect,
            before_inspect: self.before_inspect,
            dump_marshalled_config: self.dump_marshalled_config,
            register_flags: self.register_flags,
            read_flags: self.read_flags,
            flag_parser: self.flag_parser,
            args: self.args,
            env: self.env,
            install_default_subscriber: self.install_default_subscriber,
        }
    }
}
