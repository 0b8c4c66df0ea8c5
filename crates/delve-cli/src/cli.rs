use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "delve")]
#[command(version, about = "Delve - deep research, find-all and search from the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (defaults to ~/.delve/delve.db)
    #[arg(long, global = true, env = "DELVE_DB_PATH")]
    pub db_path: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Chat with the assistant
    Chat(ChatArgs),

    /// Deep research runs
    Research {
        #[command(subcommand)]
        command: ResearchCommands,
    },

    /// Build a dataset from the web
    Findall {
        #[command(subcommand)]
        command: FindAllCommands,
    },

    /// One-shot web search
    Search(SearchArgs),
}

#[derive(Args)]
pub struct ChatArgs {
    /// Message to send; omit to start an interactive session
    pub message: Option<String>,

    /// Chat model
    #[arg(short, long)]
    pub model: Option<String>,
}

#[derive(Subcommand)]
pub enum ResearchCommands {
    /// Submit a research query and wait for the result
    Start {
        /// Research question
        query: String,

        /// Processor tier (lite, base, core, pro, ultra)
        #[arg(short, long)]
        processor: Option<String>,
    },

    /// Continue polling a run left unfinished
    Resume {
        /// Run ID
        run_id: String,
    },

    /// List past runs, newest first
    List {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show a single run
    Show {
        /// Run ID
        run_id: String,
    },
}

#[derive(Subcommand)]
pub enum FindAllCommands {
    /// Generate an extraction spec from an objective
    Generate {
        /// What to find, in natural language
        objective: String,

        /// Write the generated spec to this file
        #[arg(short, long)]
        output: Option<String>,

        /// Execute the spec right after generating it
        #[arg(long)]
        execute: bool,
    },

    /// Execute a spec file
    Execute {
        /// Path to a JSON spec, as written by `findall generate`
        spec_file: String,
    },
}

#[derive(Args)]
pub struct SearchArgs {
    /// What to search for
    pub objective: String,

    /// Keyword queries (repeatable or comma-separated, max 5)
    #[arg(short, long = "query")]
    pub queries: Vec<String>,

    /// Maximum number of results
    #[arg(long)]
    pub max_results: Option<u32>,

    /// Maximum characters per result excerpt
    #[arg(long)]
    pub max_chars: Option<u32>,
}
