use anyhow::Result;
use colored::Colorize;

use crate::cli::SearchArgs;
use crate::commands::utils::preview_text;
use crate::config::CliConfig;
use crate::output::progress::with_spinner;
use crate::output::{OutputFormat, json::print_json};

const EXCERPT_PREVIEW_CHARS: usize = 300;

pub async fn run(config: &CliConfig, args: SearchArgs, format: OutputFormat) -> Result<()> {
    let client = config.client()?;

    let mut request = config.search_request(&args.objective).with_queries(&args.queries);
    if let Some(max_results) = args.max_results {
        request = request.with_max_results(max_results);
    }
    if let Some(max_chars) = args.max_chars {
        request = request.with_max_chars_per_result(max_chars);
    }

    let results = with_spinner(!format.is_json(), "Searching...", client.search(&request)).await?;

    if format.is_json() {
        return print_json(&results);
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (index, result) in results.iter().enumerate() {
        let title = if result.title.is_empty() {
            result.url.as_str()
        } else {
            result.title.as_str()
        };
        println!("{}. {}", index + 1, title.bold());
        println!("   {}", result.url.dimmed());
        if !result.excerpt.is_empty() {
            println!("   {}", preview_text(&result.excerpt, EXCERPT_PREVIEW_CHARS));
        }
        println!();
    }

    Ok(())
}
