//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// recur - run a command under a retry policy
#[derive(Parser, Debug)]
#[command(name = "recur")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to recur.yaml config file
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command, retrying transient failures
    Run(RunArgs),

    /// Print the backoff schedule of a policy
    Delays(DelaysArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Policy selection and overrides shared by commands that build a policy
#[derive(Args, Debug, Clone, Default)]
pub struct PolicyArgs {
    /// Named policy from the `retry.operations` section of the config
    #[arg(long)]
    pub policy: Option<String>,

    /// Maximum number of retries after the first attempt
    #[arg(long, allow_hyphen_values = true)]
    pub max_retries: Option<i64>,

    /// Maximum delay between attempts in milliseconds
    #[arg(long, allow_hyphen_values = true)]
    pub max_delay_ms: Option<i64>,

    /// Backoff coefficient in milliseconds
    #[arg(long, allow_hyphen_values = true)]
    pub base_delay_ms: Option<i64>,

    /// Disable random jitter
    #[arg(long)]
    pub no_jitter: bool,
}

// Run command
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub policy: PolicyArgs,

    /// Exit codes that indicate a transient failure (default: any non-zero code)
    #[arg(long = "retry-on-exit", value_delimiter = ',')]
    pub retry_on_exit: Vec<i32>,

    /// Case-insensitive stderr substrings that indicate a transient failure
    #[arg(long = "retry-on-output")]
    pub retry_on_output: Vec<String>,

    /// Run the command on the blocking path instead of the async one
    #[arg(long)]
    pub blocking: bool,

    /// Command to run, followed by its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

// Delays command
#[derive(Args, Debug)]
pub struct DelaysArgs {
    #[command(flatten)]
    pub policy: PolicyArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// Config commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate the configuration file
    Validate,
}
