use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gqlbench",
    version,
    about = "Execution-based benchmark for natural-language-to-graph-query generation"
)]
pub struct Cli {
    /// Emit JSON log lines on stderr (filter with GQLBENCH_LOG)
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate predictions, then evaluate them (phases per config)
    Run(RunArgs),
    /// Generation phase only
    Predict(RunArgs),
    /// Evaluate an existing prediction file
    Evaluate(RunArgs),
    /// Write a sample config
    Init(InitArgs),
    Version,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    #[arg(long, default_value = "gqlbench.yaml")]
    pub config: PathBuf,

    /// Reject unknown config keys instead of warning
    #[arg(long)]
    pub strict_config: bool,

    /// Override prediction.max_workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Override evaluation.graph
    #[arg(long)]
    pub graph: Option<String>,

    /// Override evaluation.output_dir
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct InitArgs {
    #[arg(long, default_value = "gqlbench.yaml")]
    pub config: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}
