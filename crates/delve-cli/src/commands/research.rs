use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::Cell;
use delve_ai::{AiError, PollProgress, RunOutcome, RunPoller, TaskClient};
use delve_storage::{RunRecord, RunRecordStatus, Storage, paths};
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::ResearchCommands;
use crate::commands::utils::{format_timestamp, preview_text};
use crate::config::CliConfig;
use crate::output::progress::spinner;
use crate::output::table::{new_table, print_table};
use crate::output::{OutputFormat, json::print_json};

pub async fn run(
    config: &CliConfig,
    db_path: Option<&str>,
    command: ResearchCommands,
    format: OutputFormat,
) -> Result<()> {
    match command {
        ResearchCommands::Start { query, processor } => {
            start(config, db_path, &query, processor.as_deref(), format).await
        }
        ResearchCommands::Resume { run_id } => resume(config, db_path, &run_id, format).await,
        ResearchCommands::List { limit } => list(db_path, limit, format),
        ResearchCommands::Show { run_id } => show(db_path, &run_id, format),
    }
}

fn open_storage(db_path: Option<&str>) -> Result<Storage> {
    let path = match db_path {
        Some(path) => PathBuf::from(path),
        None => paths::database_path()?,
    };
    Storage::new(&path).with_context(|| format!("Failed to open database at {}", path.display()))
}

async fn start(
    config: &CliConfig,
    db_path: Option<&str>,
    query: &str,
    processor: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let processor = config.processor(processor)?;
    let client: Arc<dyn TaskClient> = Arc::new(config.client()?);
    let storage = open_storage(db_path)?;

    let pb = (!format.is_json()).then(|| spinner("Submitting research run..."));
    let mut poller = build_poller(config, client, &storage, pb.clone())?;
    let signal = cancel_on_ctrl_c(&poller);

    let outcome = poller.run(query, processor).await;
    signal.abort();
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    report_outcome(outcome?, format)
}

async fn resume(
    config: &CliConfig,
    db_path: Option<&str>,
    run_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let storage = open_storage(db_path)?;
    if let Some(record) = storage.run_history.get(run_id)
        && record.status.is_terminal()
    {
        return print_record(&record, format);
    }

    let client: Arc<dyn TaskClient> = Arc::new(config.client()?);
    let pb = (!format.is_json()).then(|| spinner("Resuming research run..."));
    let mut poller = build_poller(config, client, &storage, pb.clone())?;
    let signal = cancel_on_ctrl_c(&poller);

    let outcome = poller.resume(run_id).await;
    signal.abort();
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    report_outcome(outcome?, format)
}

fn build_poller(
    config: &CliConfig,
    client: Arc<dyn TaskClient>,
    storage: &Storage,
    pb: Option<ProgressBar>,
) -> Result<RunPoller> {
    let poller = RunPoller::new(client)
        .with_history(storage.run_history.clone())
        .with_config(config.poller_config()?)
        .on_progress(move |progress| {
            if let Some(pb) = &pb {
                pb.set_message(progress_message(progress));
            }
        });
    Ok(poller)
}

/// Cancel the poller on Ctrl-C. Abort the returned handle once polling ends.
fn cancel_on_ctrl_c(poller: &RunPoller) -> tokio::task::JoinHandle<()> {
    let token = poller.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, cancelling research run");
            token.cancel();
        }
    })
}

fn progress_message(progress: &PollProgress) -> String {
    let mut message = format!(
        "Researching {} [{}] check {}/{}",
        progress.run_id, progress.status, progress.attempt, progress.max_attempts
    );
    if progress.transient_error.is_some() {
        message.push_str(" (retrying after a network error)");
    }
    message
}

fn report_outcome(outcome: RunOutcome, format: OutputFormat) -> Result<()> {
    if format.is_json() {
        print_json(&outcome)?;
    } else {
        match &outcome {
            RunOutcome::Completed { run_id, result } => {
                println!("{} {}\n", "Run".dimmed(), run_id.dimmed());
                println!("{result}");
            }
            other => eprintln!("{}", other.user_message().yellow()),
        }
    }

    match outcome {
        RunOutcome::Cancelled { .. } => Ok(()),
        other => {
            other.into_result()?;
            Ok(())
        }
    }
}

fn list(db_path: Option<&str>, limit: usize, format: OutputFormat) -> Result<()> {
    let storage = open_storage(db_path)?;
    let records = storage.run_history.recent(limit);

    if format.is_json() {
        return print_json(&records);
    }

    if records.is_empty() {
        println!("No research runs yet.");
        return Ok(());
    }

    let mut table = new_table(vec!["Run ID", "Status", "Query", "Processor", "Created"]);
    for record in records {
        table.add_row(vec![
            Cell::new(&record.run_id),
            Cell::new(record.status),
            Cell::new(preview_text(&record.query, 60)),
            Cell::new(record.processor.as_deref().unwrap_or("-")),
            Cell::new(format_timestamp(Some(record.timestamp))),
        ]);
    }

    print_table(table)
}

fn show(db_path: Option<&str>, run_id: &str, format: OutputFormat) -> Result<()> {
    let storage = open_storage(db_path)?;
    let record = storage
        .run_history
        .get(run_id)
        .ok_or_else(|| AiError::NotFound(run_id.to_string()))?;

    print_record(&record, format)
}

fn print_record(record: &RunRecord, format: OutputFormat) -> Result<()> {
    if format.is_json() {
        return print_json(record);
    }

    println!("Run: {}", record.run_id);
    println!("Query: {}", record.query);
    println!("Status: {}", status_label(record.status));
    if let Some(processor) = &record.processor {
        println!("Processor: {processor}");
    }
    println!("Created: {}", format_timestamp(Some(record.timestamp)));
    println!("Completed: {}", format_timestamp(record.completed_at));

    match &record.result {
        Some(result) => println!("\n{result}"),
        None if record.status == RunRecordStatus::Running => println!(
            "\nStill running. Continue polling with: delve research resume {}",
            record.run_id
        ),
        None => {}
    }

    Ok(())
}

fn status_label(status: RunRecordStatus) -> String {
    match status {
        RunRecordStatus::Completed => status.to_string().green().to_string(),
        RunRecordStatus::Running => status.to_string().cyan().to_string(),
        RunRecordStatus::Failed | RunRecordStatus::TimedOut => status.to_string().red().to_string(),
    }
}
