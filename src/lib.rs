//! confload: service configuration loader (library crate).
//!
//! A service describes its configuration as a serde structure embedding
//! [`config::Base`], assembles a [`config::Loader`] with an ordered chain of
//! [`providers`] (local file, Nacos, embedded text) and calls
//! [`config::Loader::load`] once at startup.
//!
//! ```no_run
//! use confload::config::{Base, Loader};
//! use confload::providers::{FileProvider, NacosProvider, TextProvider};
//!
//! let loader = Loader::<Base>::builder()
//!     .service_name("billing")
//!     .service_version(env!("CARGO_PKG_VERSION"))
//!     .provider(FileProvider::with_optional_default("config.toml"))
//!     .provider(NacosProvider::new())
//!     .provider(TextProvider::from_static(b"tracing = false\n"))
//!     .build();
//!
//! let mut cfg = Base::default();
//! loader.load(&mut cfg)?;
//! # Ok::<(), confload::config::LoadError>(())
//! ```

pub mod codec;
pub mod config;
pub mod constants;
pub mod dump;
pub mod env;
pub mod flags;
pub mod logging;
pub mod providers;
pub mod version;
