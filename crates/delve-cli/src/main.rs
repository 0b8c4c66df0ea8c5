mod cli;
mod commands;
mod config;
mod error;
mod output;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use config::CliConfig;
use delve_storage::paths;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let _guard = init_logging(cli.verbose);

    if let Err(err) = run(cli).await {
        error::handle_error(err);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = CliConfig::load();
    let format = cli.format;

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
        Commands::Chat(args) => commands::chat::run(&config, args, format).await,
        Commands::Research { command } => {
            commands::research::run(&config, cli.db_path.as_deref(), command, format).await
        }
        Commands::Findall { command } => commands::findall::run(&config, command, format).await,
        Commands::Search(args) => commands::search::run(&config, args, format).await,
    }
}

/// Log to a daily rolling file in ~/.delve/logs so terminal output stays clean.
fn init_logging(verbose: bool) -> Option<WorkerGuard> {
    let log_dir = paths::ensure_logs_dir().ok()?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "delve.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .init();

    Some(guard)
}
