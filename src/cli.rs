//! Command-line interface definition using clap
//!
//! Also parses the interactive commands read from stdin while a session
//! runs.

use car_simulator::framer::Concept;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

// =============================================================================
// CLI Definition
// =============================================================================

/// Serial ECU simulator answering diagnostic telegrams
#[derive(Parser, Debug, Default)]
#[command(name = "car-sim")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose debug output
    #[arg(short, long)]
    pub verbose: bool,

    /// Config file (default: car-sim.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Serial port to use (overrides config)
    #[arg(long, value_name = "PORT")]
    pub port: Option<String>,

    /// Protocol concept: fast, kwp2000s or ds2 (overrides config)
    #[arg(long, value_name = "CONCEPT")]
    pub concept: Option<Concept>,

    /// Response definition file (overrides config)
    #[arg(long, value_name = "FILE")]
    pub responses: Option<PathBuf>,

    /// Print status and reports as JSON
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the simulator (default)
    Run,

    /// List available serial ports
    Ports,

    /// Load a response file and report entries and warnings
    Check {
        /// Response file (default: from config)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Write the effective configuration to the config file
    InitConfig,
}

// =============================================================================
// Interactive commands
// =============================================================================

/// Command typed on stdin while the simulator runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// `None` toggles the flag
    Moving(Option<bool>),
    VariableValues(Option<bool>),
    IgnitionOk(Option<bool>),
    Status,
    Start,
    Stop,
    Reload,
    Help,
    Quit,
}

pub const HOST_HELP: &str = "\
commands:
  moving [on|off]      toggle or set the moving flag
  variable [on|off]    toggle or set sweeping values
  ignition [on|off]    toggle or set ignition ok
  status               print engine status
  start | stop         control the session
  reload               reload the response file (session must be stopped)
  quit                 stop and exit";

impl FromStr for HostCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err("empty command".into());
        };
        let value = match words.next() {
            None => None,
            Some("on" | "1" | "true") => Some(true),
            Some("off" | "0" | "false") => Some(false),
            Some(other) => return Err(format!("expected on/off, got '{}'", other)),
        };

        let flag = |f: fn(Option<bool>) -> HostCommand| -> Result<HostCommand, String> {
            Ok(f(value))
        };
        let plain = |c: HostCommand| -> Result<HostCommand, String> {
            match value {
                None => Ok(c),
                Some(_) => Err(format!("'{}' takes no argument", verb)),
            }
        };

        match verb.to_ascii_lowercase().as_str() {
            "moving" | "m" => flag(Self::Moving),
            "variable" | "v" => flag(Self::VariableValues),
            "ignition" | "i" => flag(Self::IgnitionOk),
            "status" | "s" => plain(Self::Status),
            "start" => plain(Self::Start),
            "stop" => plain(Self::Stop),
            "reload" | "r" => plain(Self::Reload),
            "help" | "?" => plain(Self::Help),
            "quit" | "exit" | "q" => plain(Self::Quit),
            other => Err(format!("unknown command '{}', try 'help'", other)),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
