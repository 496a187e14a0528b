//! Configuration management for the G-code runner.
//!
//! Handles:
//! - Command-line argument parsing
//! - Machine profile and parameter file locations

use anyhow::{Result, bail};
use clap::Parser;
use std::path::PathBuf;

use crate::profile::QUEUE_DEPTH_RANGE;

/// Command-line arguments for the G-code runner
#[derive(Debug, Parser)]
#[command(name = "gcode-canon")]
#[command(about = "Canonical G-code interpreter driving a simulated machine")]
#[command(version)]
pub struct Args {
    /// Part program to run
    #[arg(help = "G-code program file")]
    pub program: PathBuf,

    #[arg(long, help = "Machine profile TOML (overrides the user profile)")]
    pub machine: Option<PathBuf>,

    #[arg(
        long,
        default_value = "parameters.csv",
        help = "Parameter store CSV, loaded if present and saved on exit"
    )]
    pub parameters: PathBuf,

    /// Overrides the profile's lookahead depth
    #[arg(long, help = "Motion queue depth (2 to 255)")]
    pub queue_depth: Option<usize>,

    #[arg(long, help = "Print executed moves as JSON lines")]
    pub json: bool,

    #[arg(long, help = "Do not write the parameter store back")]
    pub no_save: bool,

    /// Log level for the runner
    #[arg(
        long,
        default_value = "info",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    pub log_level: String,
}

/// Combined configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    pub program: PathBuf,
    /// Explicit profile; `None` falls back to the user profile, then the
    /// built-in one
    pub machine: Option<PathBuf>,
    pub parameters: PathBuf,
    pub queue_depth: Option<usize>,
    pub json: bool,
    pub save_parameters: bool,
    pub log_level: String,
}

impl Config {
    /// Create configuration from command-line arguments
    pub fn from_args_and_env() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Create configuration from explicit arguments (useful for testing)
    pub fn from_args(args: Args) -> Result<Self> {
        if let Some(depth) = args.queue_depth
            && !QUEUE_DEPTH_RANGE.contains(&depth)
        {
            bail!("Queue depth {} outside 2..=255", depth);
        }

        Ok(Config {
            program: args.program,
            machine: args.machine,
            parameters: args.parameters,
            queue_depth: args.queue_depth,
            json: args.json,
            save_parameters: !args.no_save,
            log_level: args.log_level,
        })
    }
}
