use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::Cell;
use delve_ai::{ExtractionResult, ExtractionSpec, FindAllCoordinator, FindAllError};
use serde_json::json;
use std::path::Path;

use crate::cli::FindAllCommands;
use crate::commands::utils::format_value;
use crate::config::CliConfig;
use crate::output::progress::with_spinner;
use crate::output::table::{new_table, print_table};
use crate::output::{OutputFormat, json::print_json};

pub async fn run(config: &CliConfig, command: FindAllCommands, format: OutputFormat) -> Result<()> {
    let coordinator = FindAllCoordinator::new(config.client()?);

    match command {
        FindAllCommands::Generate {
            objective,
            output,
            execute: false,
        } => generate(&coordinator, &objective, output.as_deref(), format).await,
        FindAllCommands::Generate {
            objective,
            output,
            execute: true,
        } => generate_and_execute(&coordinator, &objective, output.as_deref(), format).await,
        FindAllCommands::Execute { spec_file } => {
            execute(&coordinator, Path::new(&spec_file), format).await
        }
    }
}

async fn generate(
    coordinator: &FindAllCoordinator,
    objective: &str,
    output: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let spec = with_spinner(
        !format.is_json(),
        "Generating extraction spec...",
        coordinator.generate_spec(objective),
    )
    .await?;

    if let Some(path) = output {
        write_spec(Path::new(path), &spec)?;
    }

    if format.is_json() {
        return print_json(&spec);
    }

    println!("{}", "Columns".bold());
    for column in spec.columns() {
        match &column.description {
            Some(description) => println!("  {} - {}", column.name, description.dimmed()),
            None => println!("  {}", column.name),
        }
    }

    match output {
        Some(path) => {
            println!("\nSpec saved to {path}. Edit it if needed, then run:");
            println!("  {} delve findall execute {path}", "$".dimmed());
        }
        None => println!("\n{}", serde_json::to_string_pretty(&spec)?),
    }
    Ok(())
}

async fn generate_and_execute(
    coordinator: &FindAllCoordinator,
    objective: &str,
    output: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let result = with_spinner(
        !format.is_json(),
        "Generating and executing extraction spec...",
        coordinator.generate_and_execute(objective),
    )
    .await;

    match result {
        Ok(run) => {
            if let Some(path) = output {
                write_spec(Path::new(path), &run.spec)?;
            }
            if format.is_json() {
                return print_json(&run);
            }
            print_entities(&run.spec, &run.results)
        }
        Err(FindAllError::Generate(err)) => Err(err.into()),
        Err(FindAllError::Execute { spec, source }) => {
            // Keep the generated spec so it can be retried without regenerating.
            match output {
                Some(path) => {
                    write_spec(Path::new(path), &spec)?;
                    eprintln!(
                        "{} spec saved to {path}; retry with `delve findall execute {path}`",
                        "Execution failed:".yellow()
                    );
                }
                None => {
                    eprintln!("{}", "Execution failed. Generated spec:".yellow());
                    eprintln!("{}", serde_json::to_string_pretty(&spec)?);
                }
            }
            Err(source.into())
        }
    }
}

async fn execute(coordinator: &FindAllCoordinator, path: &Path, format: OutputFormat) -> Result<()> {
    let spec = read_spec(path)?;
    let results = with_spinner(
        !format.is_json(),
        "Executing extraction spec...",
        coordinator.execute_spec(&spec),
    )
    .await?;

    if format.is_json() {
        return print_json(&json!({ "spec": spec, "results": results }));
    }
    print_entities(&spec, &results)
}

fn read_spec(path: &Path) -> Result<ExtractionSpec> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read spec file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse spec file {}", path.display()))
}

fn write_spec(path: &Path, spec: &ExtractionSpec) -> Result<()> {
    let content = serde_json::to_string_pretty(spec)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write spec file {}", path.display()))
}

fn print_entities(spec: &ExtractionSpec, results: &ExtractionResult) -> Result<()> {
    if results.is_empty() {
        println!("No entities found.");
        return Ok(());
    }

    let columns = spec.column_names().collect::<Vec<_>>();
    let mut table = new_table(columns.clone());
    for entity in &results.entities {
        table.add_row(
            columns
                .iter()
                .map(|name| Cell::new(format_value(entity.get(*name))))
                .collect::<Vec<_>>(),
        );
    }
    print_table(table)?;

    println!("{} entities", results.len());
    Ok(())
}
