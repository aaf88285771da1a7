//! CLI argument parsing and validation module
//!
//! Handles the command-line interface using clap:
//! - explicit configuration file override
//! - debug logging switch
//! - single-cycle mode for smoke-testing a deployment

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, Command};

/// Parsed command-line options
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    /// Explicit configuration file, overriding the user/system discovery
    pub config: Option<PathBuf>,
    /// Force debug logging regardless of the configuration
    pub debug: bool,
    /// Run exactly one poll cycle and exit
    pub once: bool,
}

fn command() -> Command {
    Command::new("delegatewatch")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Watch a Zimbra audit log for DelegateAuth requests and send email alerts")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .help("Path to the configuration file"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .help("Enable debug logging regardless of configuration")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("once")
                .long("once")
                .help("Run a single poll cycle and exit")
                .action(ArgAction::SetTrue),
        )
}

/// Parse command line arguments and return the options
pub fn parse_args() -> Result<CliOptions> {
    let matches = command().get_matches();

    let config = match matches.get_one::<String>("config") {
        Some(path_str) => {
            let path = PathBuf::from(path_str);
            if !path.exists() {
                return Err(anyhow!("configuration file does not exist: {}", path_str));
            }
            Some(path)
        }
        None => None,
    };

    Ok(CliOptions {
        config,
        debug: matches.get_flag("debug"),
        once: matches.get_flag("once"),
    })
}
