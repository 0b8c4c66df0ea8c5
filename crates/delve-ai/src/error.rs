//! Error types for the AI module

use reqwest::Response;
use thiserror::Error;

/// Maximum number of response body bytes kept in an error.
const MAX_ERROR_BODY: usize = 512;

/// AI module error types
#[derive(Error, Debug)]
pub enum AiError {
    /// Missing or rejected credential. Never retried.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The remote API answered with a non-success status.
    #[error("Parallel API error ({status}): {body}")]
    Remote { status: u16, body: String },

    /// Network-level failure before a response was received.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Run not found: {0}")]
    NotFound(String),

    #[error("Run {run_id} timed out after {attempts} status checks")]
    Timeout { run_id: String, attempts: u32 },

    #[error("Run {0} failed")]
    RunFailed(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Invalid extraction spec: {0}")]
    InvalidSpec(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AiError {
    /// Whether the failure may clear up on its own.
    ///
    /// Network failures, rate limiting and server-side errors qualify; the
    /// run poller absorbs these within its attempt budget.
    pub fn is_transient(&self) -> bool {
        match self {
            AiError::Transport(_) => true,
            AiError::Remote { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn missing_api_key() -> Self {
        AiError::Auth("API key is required. Set PARALLEL_API_KEY or add it to the config file".into())
    }
}

/// Convert a non-success response into an error, keeping a bounded body.
pub(crate) async fn response_to_error(response: Response) -> AiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let body = truncate_body(body);

    match status {
        401 | 403 => AiError::Auth(format!("remote rejected the credential ({status}): {body}")),
        _ => AiError::Remote { status, body },
    }
}

fn truncate_body(body: String) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body;
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &body[..end])
}

/// Result type alias for AI operations
pub type Result<T> = std::result::Result<T, AiError>;
