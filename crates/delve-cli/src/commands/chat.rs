use anyhow::Result;
use colored::Colorize;
use delve_ai::{AiError, ChatSession};
use serde_json::json;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::ChatArgs;
use crate::config::CliConfig;
use crate::output::progress::with_spinner;
use crate::output::{OutputFormat, json::print_json};

pub async fn run(config: &CliConfig, args: ChatArgs, format: OutputFormat) -> Result<()> {
    let mut session = ChatSession::new(config.client()?);
    if let Some(model) = args.model {
        session = session.with_model(model);
    }

    match args.message {
        Some(message) => send_once(&mut session, &message, format).await,
        None => interactive(&mut session).await,
    }
}

async fn send_once(session: &mut ChatSession, message: &str, format: OutputFormat) -> Result<()> {
    let reply = with_spinner(!format.is_json(), "Thinking...", session.send(message)).await?;

    if format.is_json() {
        return print_json(&json!({
            "model": session.model(),
            "messages": session.history(),
        }));
    }

    println!("{reply}");
    Ok(())
}

async fn interactive(session: &mut ChatSession) -> Result<()> {
    println!(
        "{} {}",
        "Delve chat".bold(),
        "(type 'exit' or 'quit' to leave)".dimmed()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".cyan().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "exit" | "quit") {
            break;
        }

        match with_spinner(true, "Thinking...", session.send(input)).await {
            Ok(reply) => println!("\n{reply}\n"),
            // A bad credential fails every turn; stop instead of looping.
            Err(err @ AiError::Auth(_)) => return Err(err.into()),
            Err(err) => eprintln!("{} {}\n", "Error:".red().bold(), err),
        }
    }

    Ok(())
}
