//! Command-line surface

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::ffi::OsString;
use std::path::PathBuf;

/// Parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Args {
    pub(crate) file: PathBuf,
    pub(crate) verbose: bool,
    pub(crate) dry_run: bool,
    pub(crate) destination: Option<PathBuf>,
    pub(crate) config: Option<PathBuf>,
    pub(crate) json: bool,
}

impl Args {
    pub(crate) fn parse() -> Self {
        Self::from_matches(command().get_matches())
    }

    pub(crate) fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        command().try_get_matches_from(args).map(Self::from_matches)
    }

    fn from_matches(mut matches: ArgMatches) -> Self {
        Self {
            file: matches.remove_one::<PathBuf>("file").unwrap_or_default(),
            verbose: matches.get_flag("verbose"),
            dry_run: matches.get_flag("dry-run"),
            destination: matches.remove_one::<PathBuf>("destination"),
            config: matches.remove_one::<PathBuf>("config"),
            json: matches.get_flag("json"),
        }
    }
}

pub(crate) fn command() -> Command {
    Command::new("dylibpack")
        .version(dylibpack_core::VERSION)
        .about(
            "Copies non-system libraries used by your executable and patches them to work as a standalone bundle",
        )
        .arg(
            Arg::new("file")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("File to patch (the root, main binary)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Display more library information and output of install_name_tool"),
        )
        .arg(
            Arg::new("dry-run")
                .short('n')
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Just show the dependency tree but do not do any patching"),
        )
        .arg(
            Arg::new("destination")
                .short('d')
                .long("destination")
                .value_parser(value_parser!(PathBuf))
                .help("Destination directory where the binaries will be placed and loaded [default: ../libs]"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print a machine-readable summary instead of the listing"),
        )
}
