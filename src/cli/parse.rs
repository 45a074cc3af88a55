//! CLI parse: clap types for stepgen. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stepgen CLI - task-structured image generation runs
#[derive(Parser)]
#[command(name = "stepgen")]
#[command(about = "Plan and inspect task-structured image generation runs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print every file a run would write, without generating anything
    Plan {
        /// Prompt file, one prompt per line
        #[arg(long)]
        prompts: PathBuf,
        /// Comma separated image ordinals where a new task starts
        #[arg(long)]
        boundaries: Option<String>,
        /// Externally driven step index
        #[arg(long)]
        step: Option<usize>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Summarize the task directories already on disk
    Inspect {
        /// Task root to scan (defaults to the configured one)
        #[arg(long)]
        root: Option<PathBuf>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the effective run configuration
    Config,
}
