//! Service identity reported by `--version` and the dump banner.

use std::fmt;

use crate::constants::{TARGET, UNDEFINED_SERVICE};

/// Name and version a service reports about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    pub name: String,
    pub version: String,
}

impl Default for ServiceIdentity {
    fn default() -> Self {
        Self {
            name: UNDEFINED_SERVICE.to_string(),
            version: UNDEFINED_SERVICE.to_string(),
        }
    }
}

impl ServiceIdentity {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let name = name.into();
        let version = version.into();
        Self {
            name: if name.is_empty() { UNDEFINED_SERVICE.to_string() } else { name },
            version: if version.is_empty() { UNDEFINED_SERVICE.to_string() } else { version },
        }
    }

    /// Version plus build target, e.g. `version 1.2.0 (x86_64-unknown-linux-gnu)`.
    pub fn info(&self) -> String {
        format!("version {} ({TARGET})", self.version)
    }

    /// `<name> <info>`, the line printed by `--version`.
    pub fn banner(&self) -> String {
        format!("{} {}", self.name, self.info())
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.banner())
    }
}
