//! Dump and validation helpers.

use std::io::{self, Write};

use serde::Serialize;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::codec::marshal_indent;
use crate::version::ServiceIdentity;

#[derive(Error, Debug)]
pub enum DumpError {
    #[error("toml marshal failed with error: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("failed to write config dump: {0}")]
    Io(#[from] io::Error),
}

/// Write `cfg` as a commented, indented TOML document.
///
/// `out` receives `# <name> version <v> (<target>)` followed by the
/// document; `err` receives the completion note. Nothing is written to `out`
/// when serialization fails.
pub fn dump_demo<C: Serialize + ?Sized>(
    cfg: &C,
    identity: &ServiceIdentity,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<(), DumpError> {
    let text = marshal_indent(cfg)?;
    writeln!(out, "# {}", identity.banner())?;
    writeln!(out, "{text}")?;
    out.flush()?;
    writeln!(err, "config dump success")?;
    Ok(())
}

/// Run the declarative field rules of `cfg`.
pub fn validate_config<C: Validate>(cfg: &C) -> Result<(), ValidationErrors> {
    cfg.validate()
}
