//! CLI command definitions

use clap::Args;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Workspace YAML file; the saved pipelines are used when omitted
    #[arg(short, long)]
    pub file: Option<String>,

    /// Pipeline to run (required when there is more than one)
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Variable overrides for this run (name=value)
    #[arg(long = "var", value_parser = parse_key_value)]
    pub variables: Vec<(String, String)>,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Validate the pipelines of a workspace file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Workspace YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Save the functions and pipelines of a workspace file
#[derive(Debug, Args, Clone)]
pub struct ImportCommand {
    /// Workspace YAML file
    #[arg(short, long)]
    pub file: String,
}

/// List saved pipelines
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List saved functions
#[derive(Debug, Args, Clone)]
pub struct FunctionsCommand {
    /// Show function bodies
    #[arg(long)]
    pub body: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Pipeline name to filter by
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show the full report of one run
    #[arg(long)]
    pub run_id: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
