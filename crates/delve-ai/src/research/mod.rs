//! Deep research runs: polling, normalization and local history.

pub mod history;
pub mod normalize;
pub mod poller;

#[cfg(test)]
pub(crate) mod testing;

pub use history::RunHistory;
pub use normalize::{normalize, normalize_output};
pub use poller::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL, PollProgress, PollState, PollerConfig, RunOutcome,
    RunPoller,
};
