//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{
    FunctionsCommand, HistoryCommand, ImportCommand, ListCommand, RunCommand, ValidateCommand,
};
use std::ffi::OsString;

/// Typed function pipelines
#[derive(Debug, Parser, Clone)]
#[command(name = "fnpipe")]
#[command(version = "0.1.0")]
#[command(about = "Bind typed functions to variables and run them as pipelines", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Database path (defaults to the local data directory)
    #[arg(long, global = true)]
    pub db: Option<String>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a pipeline
    Run(RunCommand),

    /// Check pipelines against their functions and variables
    Validate(ValidateCommand),

    /// Save a workspace's functions and pipelines
    Import(ImportCommand),

    /// List saved pipelines
    List(ListCommand),

    /// List saved functions
    Functions(FunctionsCommand),

    /// Show run history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
