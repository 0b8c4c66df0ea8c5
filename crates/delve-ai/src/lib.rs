//! Delve AI - client for the Parallel AI research API
//!
//! This crate provides:
//! - A transport client for chat, task runs, find-all and web search
//! - The deep research run poller (bounded polling, cancellation, history)
//! - Normalization of heterogeneous run outputs into display text
//! - The two-phase find-all extraction coordinator

pub mod chat;
pub mod client;
pub mod error;
pub mod findall;
mod http_client;
pub mod research;
pub mod search;
pub mod task;

// Re-export commonly used types
pub use chat::{ChatMessage, ChatRole, ChatSession, DEFAULT_CHAT_MODEL};
pub use client::{DEFAULT_BASE_URL, ParallelClient};
pub use error::{AiError, Result};
pub use findall::{
    Entity, ExtractionColumn, ExtractionResult, ExtractionSpec, FindAllCoordinator, FindAllError,
    FindAllRun,
};
pub use research::{
    PollProgress, PollState, PollerConfig, RunHistory, RunOutcome, RunPoller, normalize,
    normalize_output,
};
pub use search::{SearchRequest, SearchResult};
pub use task::{Processor, RemoteRun, RemoteRunStatus, TaskClient};
