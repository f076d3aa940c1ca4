//! Local file provider.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{Outcome, Provider, ProviderContext, ProviderError};

/// Reads configuration from a file on disk.
///
/// The path given on the command line wins over `default_config_path`.
#[derive(Debug, Clone, Default)]
pub struct FileProvider {
    pub default_config_path: Option<PathBuf>,
    /// Skip instead of failing when neither path is set.
    pub skip_if_path_empty: bool,
    /// Skip instead of failing when the default path does not exist.
    pub skip_if_default_not_exist: bool,
}

impl FileProvider {
    /// Provider that falls back to `path`, skipping quietly when it is absent.
    pub fn with_optional_default(path: impl Into<PathBuf>) -> Self {
        Self {
            default_config_path: Some(path.into()),
            skip_if_path_empty: true,
            skip_if_default_not_exist: true,
        }
    }

    fn default_path(&self) -> Option<&Path> {
        self.default_config_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    fn skip_reason(&self, prefix: &str, ctx: &ProviderContext<'_>) -> String {
        format!(
            "{prefix} config_file={} default_config_path={}",
            ctx.config_file().map(|p| p.display().to_string()).unwrap_or_default(),
            self.default_path().map(|p| p.display().to_string()).unwrap_or_default(),
        )
    }
}

impl Provider for FileProvider {
    fn name(&self) -> &str {
        "file"
    }

    fn fetch(&self, ctx: &ProviderContext<'_>) -> Outcome {
        let (path, using_default) = match (ctx.config_file(), self.default_path()) {
            (Some(explicit), _) => (explicit, false),
            (None, Some(default)) => (default, true),
            (None, None) => {
                if self.skip_if_path_empty {
                    return Outcome::Skip(self.skip_reason("no config file path", ctx));
                }
                return Outcome::Fail(ProviderError::EmptyConfigFile);
            }
        };

        if using_default && self.skip_if_default_not_exist {
            if let Err(e) = fs::metadata(path) {
                if e.kind() == ErrorKind::NotFound {
                    return Outcome::Skip(self.skip_reason("default config not exists", ctx));
                }
            }
        }

        let content = match fs::read(path) {
            Ok(content) => content,
            Err(source) => {
                return Outcome::Fail(ProviderError::ReadFile {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        if content.is_empty() {
            return Outcome::Fail(ProviderError::EmptyConfig {
                origin: format!("file {}", path.display()),
            });
        }

        tracing::info!(config_file = %path.display(), "read config from local file success");
        Outcome::Success(content)
    }
}
