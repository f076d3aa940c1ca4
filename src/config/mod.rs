//! Typed configuration and the load pipeline.
//!
//! A service describes its configuration as a serde structure that embeds
//! [`Base`] and implements [`ServiceConfig`]. [`Loader`] drives the provider
//! chain, unmarshals the result into that structure and runs the post-load
//! steps (environment overrides, hooks, dump).

pub mod base;
pub mod loader;

use std::fmt::Debug;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::env::Env;

pub use base::{Base, LogConfig, LogEncoding};
pub use loader::{Completion, LoadError, Loader, LoaderBuilder};

/// Capabilities the loader needs from a caller's configuration type.
pub trait ServiceConfig: Serialize + DeserializeOwned + Debug + 'static {
    /// The embedded common fields, or `None` when the type does not carry them.
    fn base(&self) -> Option<&Base>;

    fn base_mut(&mut self) -> Option<&mut Base>;

    /// Fill values the source left unset from the environment. Runs once per
    /// load, right after unmarshaling.
    fn apply_env_overrides(&mut self, env: &Env) {
        if let Some(base) = self.base_mut() {
            base.init_otlp_grpc_endpoint_from_env(env);
        }
    }
}

impl ServiceConfig for Base {
    fn base(&self) -> Option<&Base> {
        Some(self)
    }

    fn base_mut(&mut self) -> Option<&mut Base> {
        Some(self)
    }
}

/// Implement [`ServiceConfig`] for a struct whose `Base` lives in `$field`.
///
/// ```
/// use confload::config::Base;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// #[serde(default)]
/// struct AppConfig {
///     #[serde(flatten)]
///     base: Base,
///     listen: String,
/// }
///
/// confload::embed_base!(AppConfig, base);
/// ```
#[macro_export]
macro_rules! embed_base {
    ($ty:ty, $field:ident) => {
        impl $crate::config::ServiceConfig for $ty {
            fn base(&self) -> Option<&$crate::config::Base> {
                Some(&self.$field)
            }

            fn base_mut(&mut self) -> Option<&mut $crate::config::Base> {
                Some(&mut self.$field)
            }
        }
    };
}
