//! Default command-line flag parser.
//!
//! Recognises `-c/--config <path>`, `--dump`, `-v/--version` and `-h/--help`.
//! Help and version are reported back to the loader instead of being acted
//! on by clap, so the loader decides how the process ends.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::constants::{FLAG_CONFIG_FILE, FLAG_DUMP_CONFIG, FLAG_HELP, FLAG_VERSION};

/// Extends the default [`Command`] with caller-defined flags.
pub type RegisterFlags = Arc<dyn Fn(Command) -> Command + Send + Sync>;

/// Receives the parsed matches so the caller can read its own flags.
pub type ReadFlags = Arc<dyn Fn(&ArgMatches) + Send + Sync>;

/// What the loader needs to know from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFlags {
    pub config_file: Option<PathBuf>,
    pub dump_config: bool,
    pub show_help: bool,
    pub show_version: bool,
    /// Rendered help text, printed when `show_help` is set.
    pub usage: String,
}

/// Build the default command.
pub fn command(name: &str, usage: &str, short_description: &str) -> Command {
    let mut cmd = Command::new(name.to_string())
        .override_usage(usage.to_string())
        .disable_help_flag(true)
        .disable_version_flag(true)
        .arg(
            Arg::new(FLAG_CONFIG_FILE)
                .short('c')
                .long(FLAG_CONFIG_FILE)
                .value_name("PATH")
                .help("config file path"),
        )
        .arg(
            Arg::new(FLAG_DUMP_CONFIG)
                .long(FLAG_DUMP_CONFIG)
                .action(ArgAction::SetTrue)
                .help("dump config to toml"),
        )
        .arg(
            Arg::new(FLAG_VERSION)
                .short('v')
                .long(FLAG_VERSION)
                .action(ArgAction::SetTrue)
                .help("display the current version of this CLI"),
        )
        .arg(
            Arg::new(FLAG_HELP)
                .short('h')
                .long(FLAG_HELP)
                .action(ArgAction::SetTrue)
                .help("show help"),
        );
    if !short_description.is_empty() {
        cmd = cmd.about(short_description.to_string());
    }
    cmd
}

/// Parse `args` (including the binary name) against `cmd`.
pub fn parse_from<I, T>(
    mut cmd: Command,
    args: I,
    read: Option<&ReadFlags>,
) -> Result<ParsedFlags, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let usage = cmd.render_help().to_string();
    let matches = cmd.try_get_matches_from(args)?;
    if let Some(read) = read {
        read(&matches);
    }

    Ok(ParsedFlags {
        config_file: matches
            .get_one::<String>(FLAG_CONFIG_FILE)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from),
        dump_config: matches.get_flag(FLAG_DUMP_CONFIG),
        show_help: matches.get_flag(FLAG_HELP),
        show_version: matches.get_flag(FLAG_VERSION),
        usage,
    })
}
