//! Command-line surface: one subcommand per `Engine` operation that makes
//! sense to drive from a terminal, plus the usual config utilities.

use clap::{Parser, Subcommand};

/// deep-research — an LLM orchestrator that plans, delegates to sub-agents,
/// and writes a cited markdown report.
#[derive(Debug, Parser)]
#[command(name = "dr", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a research query end to end and print the report (default).
    Research {
        /// The research question.
        query: String,
        /// Optional clarification the user gave in response to a follow-up.
        #[arg(long)]
        clarification: Option<String>,
        /// Override every role's model with this one provider/model pair.
        #[arg(long)]
        model: Option<String>,
        /// Print the raw event stream as NDJSON to stderr while running.
        #[arg(long)]
        events: bool,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}
