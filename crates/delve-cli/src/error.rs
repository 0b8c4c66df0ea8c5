use colored::Colorize;
use delve_ai::AiError;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    match err.downcast_ref::<AiError>() {
        Some(AiError::Auth(_)) => {
            eprintln!("\n{}", "Suggestion:".yellow().bold());
            eprintln!("  Set your API key with:");
            eprintln!("  {} export PARALLEL_API_KEY=<value>", "$".dimmed());
            eprintln!("  or add it under [api] in ~/.config/delve/config.toml");
        }
        Some(AiError::Timeout { run_id, .. }) => {
            eprintln!("\n{}", "Suggestion:".yellow().bold());
            eprintln!("  Try again with a shorter query, or keep waiting with:");
            eprintln!("  {} delve research resume {}", "$".dimmed(), run_id);
        }
        Some(AiError::NotFound(_)) => {
            eprintln!("\n{}", "Suggestion:".yellow().bold());
            eprintln!("  List known runs with:");
            eprintln!("  {} delve research list", "$".dimmed());
        }
        Some(AiError::Transport(_)) => {
            eprintln!("\n{}", "Suggestion:".yellow().bold());
            eprintln!("  Check your internet connection and try again.");
        }
        _ => {
            let msg = err.to_string().to_lowercase();
            if msg.contains("connection refused") || msg.contains("network") {
                eprintln!("\n{}", "Suggestion:".yellow().bold());
                eprintln!("  Check your internet connection and try again.");
            }
        }
    }

    std::process::exit(1);
}
