//! Unmarshalers from raw configuration bytes into typed structures, and the
//! indented TOML rendering used for dumps.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Pluggable conversion from raw bytes into the caller's structure.
pub type Unmarshaler<C> = Arc<dyn Fn(&[u8], &mut C) -> Result<(), UnmarshalError> + Send + Sync>;

/// Where in the source text a decode error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// 1-based line.
    pub row: usize,
    /// 1-based column, in characters.
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row={} col={}", self.row, self.column)
    }
}

#[derive(Error, Debug)]
pub enum UnmarshalError {
    #[error("config is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error(
        "decode error, {}: {message}\n--------------------------------\n{snippet}\n--------------------------------",
        .position.map(|p| p.to_string()).unwrap_or_else(|| "position unknown".to_string())
    )]
    Toml {
        position: Option<Position>,
        message: String,
        /// The decoder's rendering of the offending source region.
        snippet: String,
    },

    #[error("json decode error: {source}")]
    Json { source: serde_json::Error },

    #[error("yaml decode error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl UnmarshalError {
    pub fn position(&self) -> Option<Position> {
        match self {
            UnmarshalError::Toml { position, .. } => *position,
            UnmarshalError::Json { source } => Some(Position {
                row: source.line(),
                column: source.column(),
            }),
            UnmarshalError::Yaml(err) => err.location().map(|loc| Position {
                row: loc.line(),
                column: loc.column(),
            }),
            UnmarshalError::Utf8(_) => None,
        }
    }
}

/// Default unmarshaler: the whole payload is a TOML document.
///
/// A blank payload leaves `cfg` untouched, so a dump without any config
/// source shows whatever the caller put in it. Otherwise the document
/// replaces `cfg`; keys it omits take the type's serde defaults.
pub fn toml_unmarshal<C: DeserializeOwned>(content: &[u8], cfg: &mut C) -> Result<(), UnmarshalError> {
    let text = std::str::from_utf8(content)?;
    if text.trim().is_empty() {
        return Ok(());
    }
    *cfg = toml::from_str(text).map_err(|e| toml_error(text, e))?;
    Ok(())
}

pub fn json_unmarshal<C: DeserializeOwned>(content: &[u8], cfg: &mut C) -> Result<(), UnmarshalError> {
    *cfg = serde_json::from_slice(content).map_err(|source| UnmarshalError::Json { source })?;
    Ok(())
}

pub fn yaml_unmarshal<C: DeserializeOwned>(content: &[u8], cfg: &mut C) -> Result<(), UnmarshalError> {
    *cfg = serde_yaml_ng::from_slice(content)?;
    Ok(())
}

/// Render `cfg` as pretty TOML: arrays one element per line, every nested
/// struct under its own `[table]` header. Keys inside sub-tables start at
/// column 0; tables are not indented by depth.
pub fn marshal_indent<C: Serialize + ?Sized>(cfg: &C) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(cfg)
}

fn toml_error(text: &str, err: toml::de::Error) -> UnmarshalError {
    UnmarshalError::Toml {
        position: err.span().map(|span| position_of(text, span.start)),
        message: err.message().to_string(),
        snippet: err.to_string().trim_end().to_string(),
    }
}

fn position_of(text: &str, offset: usize) -> Position {
    let offset = offset.min(text.len());
    let before = text.get(..offset).unwrap_or(text);
    let row = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() + 1;
    Position { row, column }
}
