use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.blue} {msg} ({elapsed})")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Await `future` behind a spinner. The spinner is skipped for JSON output.
pub async fn with_spinner<F: Future>(show: bool, message: &str, future: F) -> F::Output {
    let pb = show.then(|| spinner(message));
    let output = future.await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    output
}
