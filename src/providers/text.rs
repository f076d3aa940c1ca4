//! In-memory configuration text.

use std::borrow::Cow;

use super::{Outcome, Provider, ProviderContext, ProviderError};

/// Returns a pre-supplied buffer verbatim.
///
/// Handy as the last link of a chain with a compile-time default
/// (`TextProvider::from_static(include_bytes!("default.toml"))`) and in tests.
#[derive(Debug, Clone, Default)]
pub struct TextProvider {
    config_text: Cow<'static, [u8]>,
}

impl TextProvider {
    pub fn new(config_text: impl Into<Vec<u8>>) -> Self {
        Self {
            config_text: Cow::Owned(config_text.into()),
        }
    }

    pub fn from_static(config_text: &'static [u8]) -> Self {
        Self {
            config_text: Cow::Borrowed(config_text),
        }
    }
}

impl Provider for TextProvider {
    fn name(&self) -> &str {
        "text"
    }

    fn fetch(&self, _ctx: &ProviderContext<'_>) -> Outcome {
        if self.config_text.is_empty() {
            return Outcome::Fail(ProviderError::EmptyConfig {
                origin: self.name().to_string(),
            });
        }
        Outcome::Success(self.config_text.to_vec())
    }
}
