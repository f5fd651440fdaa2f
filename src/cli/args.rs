//! CLI argument definitions
//!
//! All Clap derive structs for `umbra` command-line parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::schedule::ContactTime;

// ============================================================================
// Root CLI
// ============================================================================

/// Drives a camera through a total solar eclipse.
#[derive(Parser, Debug)]
#[command(name = "umbra", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "UMBRA_COLOR")]
    pub color: ColorChoice,

    /// Log output format.
    #[arg(long, default_value = "human", global = true, env = "UMBRA_LOG_FORMAT")]
    pub log_format: OutputFormat,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the eclipse sequence on the real clock.
    Run(RunArgs),

    /// Rehearse the whole sequence on a simulated clock.
    Rehearse(RehearseArgs),

    /// Print the contact schedule and derived boundaries.
    Schedule(ScheduleArgs),

    /// Validate configuration files.
    Validate(ValidateArgs),

    /// Generate shell completion scripts.
    Completions(CompletionsArgs),

    /// Display version information.
    Version(VersionArgs),
}

// ============================================================================
// Run / Rehearse
// ============================================================================

/// Arguments for `run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to YAML configuration file.
    #[arg(short, long, env = "UMBRA_CONFIG")]
    pub config: PathBuf,

    /// Log camera commands instead of running them.
    #[arg(long)]
    pub dry_run: bool,

    /// Print notifications without speaking them.
    #[arg(long, env = "UMBRA_NO_SPEECH")]
    pub no_speech: bool,

    /// Write JSONL events to this file instead of stderr.
    #[arg(long, env = "UMBRA_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,

    /// Expose Prometheus metrics on 127.0.0.1:<port>.
    #[arg(long, env = "UMBRA_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Disable the progress bar.
    #[arg(long)]
    pub no_progress: bool,
}

/// Arguments for `rehearse`.
#[derive(Args, Debug)]
pub struct RehearseArgs {
    /// Path to YAML configuration file.
    #[arg(short, long, env = "UMBRA_CONFIG")]
    pub config: PathBuf,

    /// Time of day (UTC) to start from; defaults to one minute before C1.
    #[arg(long, value_parser = parse_contact_time)]
    pub from: Option<ContactTime>,

    /// Simulated time each capture takes.
    #[arg(long, default_value = "300ms", value_parser = humantime::parse_duration)]
    pub latency: Duration,

    /// Write JSONL events to this file.
    #[arg(long)]
    pub events_file: Option<PathBuf>,

    /// Summary output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

fn parse_contact_time(s: &str) -> Result<ContactTime, String> {
    s.parse()
}

// ============================================================================
// Schedule / Validate
// ============================================================================

/// Arguments for `schedule`.
#[derive(Args, Debug)]
pub struct ScheduleArgs {
    /// Path to YAML configuration file.
    #[arg(short, long, env = "UMBRA_CONFIG")]
    pub config: PathBuf,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Enable strict validation (warnings become errors).
    #[arg(long)]
    pub strict: bool,
}

// ============================================================================
// Completions / Version
// ============================================================================

/// Arguments for shell completion generation.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script.
    pub shell: Shell,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

/// Shell type for completion generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell.
    Bash,
    /// Zsh shell.
    Zsh,
    /// Fish shell.
    Fish,
    /// `PowerShell`.
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish shell.
    Elvish,
}

// ============================================================================
// Tests
// ============================================================================
