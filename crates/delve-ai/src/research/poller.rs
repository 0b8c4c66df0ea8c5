//! Deep research run poller.
//!
//! Drives a remote run from submission to a terminal state:
//!
//! ```text
//! Submitting ──create ok──▶ Polling ──completed──▶ Completed
//!     │                        │ ├────failed─────▶ Failed
//!     └──create error──▶ Failed│ └──budget spent─▶ TimedOut
//!                              └──cancel─────────▶ Cancelled
//! ```
//!
//! Attempts are strictly sequential and separated by a fixed interval.
//! Transient status failures count against the attempt budget but do not end
//! the run. Once the cancellation token fires, the poller makes no further
//! history writes and emits no further progress.

use std::sync::Arc;
use std::time::Duration;

use delve_storage::{RunRecord, RunRecordStatus};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{AiError, Result};
use crate::research::history::RunHistory;
use crate::research::normalize::normalize_output;
use crate::task::{Processor, RemoteRunStatus, TaskClient};

/// Default attempt budget (180 × 2s ≈ 6 minutes)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 180;
/// Default wait between status checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Polling budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub max_attempts: u32,
    pub poll_interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(AiError::InvalidConfig(
                "max_attempts must be at least 1".into(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(AiError::InvalidConfig(
                "poll_interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Upper bound on time spent polling, ignoring request latency.
    pub fn budget(&self) -> Duration {
        self.poll_interval * self.max_attempts
    }
}

/// Poller state machine
#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    Submitting,
    Polling { run_id: String, attempt: u32 },
    Completed { run_id: String },
    Failed { run_id: Option<String> },
    TimedOut { run_id: String },
    Cancelled { run_id: Option<String> },
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Submitting | PollState::Polling { .. })
    }
}

/// Progress observation emitted after each non-terminal attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollProgress {
    pub run_id: String,
    pub attempt: u32,
    pub max_attempts: u32,
    pub status: RemoteRunStatus,
    /// Set when this attempt's status call failed transiently.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transient_error: Option<String>,
}

/// How a poller run ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed { run_id: String, result: String },
    Failed { run_id: String },
    TimedOut { run_id: String, attempts: u32 },
    Cancelled { run_id: Option<String> },
}

impl RunOutcome {
    pub fn run_id(&self) -> Option<&str> {
        match self {
            RunOutcome::Completed { run_id, .. }
            | RunOutcome::Failed { run_id }
            | RunOutcome::TimedOut { run_id, .. } => Some(run_id),
            RunOutcome::Cancelled { run_id } => run_id.as_deref(),
        }
    }

    /// Message suitable for showing to a user.
    pub fn user_message(&self) -> String {
        match self {
            RunOutcome::Completed { result, .. } => result.clone(),
            RunOutcome::Failed { .. } => "Research task failed. Please try again.".to_string(),
            RunOutcome::TimedOut { .. } => {
                "Research task timed out. Please try again with a shorter query.".to_string()
            }
            RunOutcome::Cancelled { .. } => "Research task was cancelled.".to_string(),
        }
    }

    /// The result text, or the matching error for any other outcome.
    pub fn into_result(self) -> Result<String> {
        match self {
            RunOutcome::Completed { result, .. } => Ok(result),
            RunOutcome::Failed { run_id } => Err(AiError::RunFailed(run_id)),
            RunOutcome::TimedOut { run_id, attempts } => Err(AiError::Timeout { run_id, attempts }),
            RunOutcome::Cancelled { .. } => Err(AiError::Cancelled),
        }
    }
}

type ProgressCallback = Arc<dyn Fn(&PollProgress) + Send + Sync>;

/// Submits a research run and polls it to a terminal state.
///
/// One poller drives one run. Several pollers may run concurrently; they only
/// share the history they write to.
pub struct RunPoller {
    client: Arc<dyn TaskClient>,
    history: Option<Arc<dyn RunHistory>>,
    config: PollerConfig,
    cancel: CancellationToken,
    on_progress: Option<ProgressCallback>,
    state: PollState,
}

impl RunPoller {
    pub fn new(client: Arc<dyn TaskClient>) -> Self {
        Self {
            client,
            history: None,
            config: PollerConfig::default(),
            cancel: CancellationToken::new(),
            on_progress: None,
            state: PollState::Submitting,
        }
    }

    pub fn with_history(mut self, history: Arc<dyn RunHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_config(mut self, config: PollerConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&PollProgress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Token that abandons this poller when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    /// Submit `objective` and poll the new run to completion.
    ///
    /// A creation failure is returned as an error (state `Failed`) and nothing
    /// is written to history.
    pub async fn run(&mut self, objective: &str, processor: Processor) -> Result<RunOutcome> {
        self.config.validate()?;
        self.state = PollState::Submitting;
        if self.cancel.is_cancelled() {
            return Ok(self.cancelled(None));
        }

        let client = self.client.clone();
        let cancel = self.cancel.clone();
        let created = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            created = client.create_run(objective, processor) => Some(created),
        };

        let run = match created {
            None => return Ok(self.cancelled(None)),
            Some(Ok(run)) => run,
            Some(Err(err)) => {
                tracing::warn!(error = %err, "Failed to create research run");
                self.state = PollState::Failed { run_id: None };
                return Err(err);
            }
        };
        if cancel.is_cancelled() {
            return Ok(self.cancelled(Some(run.id)));
        }

        tracing::info!(run_id = %run.id, processor = %processor, "Research run created");
        let record = RunRecord::running(&run.id, objective, Some(processor.to_string()));
        self.record(record.clone());
        self.poll(record).await
    }

    /// Poll a run created earlier, e.g. one left `running` in history by a
    /// previous session.
    ///
    /// With a history attached, the run must already be recorded there;
    /// an unknown id fails with [`AiError::NotFound`] before any status call.
    pub async fn resume(&mut self, run_id: &str) -> Result<RunOutcome> {
        self.config.validate()?;
        let record = match &self.history {
            Some(history) => history
                .get(run_id)
                .ok_or_else(|| AiError::NotFound(run_id.to_string()))?,
            // Nothing is recorded without a history, so the query is never seen.
            None => RunRecord::running(run_id, "", None),
        };

        tracing::info!(run_id, "Resuming research run");
        self.poll(record).await
    }

    async fn poll(&mut self, record: RunRecord) -> Result<RunOutcome> {
        let client = self.client.clone();
        let cancel = self.cancel.clone();
        let run_id = record.run_id.clone();
        let max_attempts = self.config.max_attempts;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Ok(self.cancelled(Some(run_id)));
            }
            self.state = PollState::Polling {
                run_id: run_id.clone(),
                attempt,
            };

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                response = client.get_run_status(&run_id) => Some(response),
            };
            // A response that raced with cancellation is discarded.
            let Some(response) = response.filter(|_| !cancel.is_cancelled()) else {
                return Ok(self.cancelled(Some(run_id)));
            };

            match response {
                Ok(run) => match run.status {
                    RemoteRunStatus::Completed => {
                        let result = normalize_output(run.output.as_ref());
                        tracing::info!(run_id = %run_id, attempt, "Research run completed");
                        self.record(record.finished(RunRecordStatus::Completed, Some(result.clone())));
                        self.state = PollState::Completed {
                            run_id: run_id.clone(),
                        };
                        return Ok(RunOutcome::Completed { run_id, result });
                    }
                    RemoteRunStatus::Failed => {
                        tracing::info!(run_id = %run_id, attempt, "Research run failed remotely");
                        self.record(record.finished(RunRecordStatus::Failed, None));
                        self.state = PollState::Failed {
                            run_id: Some(run_id.clone()),
                        };
                        return Ok(RunOutcome::Failed { run_id });
                    }
                    status => {
                        tracing::debug!(run_id = %run_id, attempt, %status, "Research run still in progress");
                        self.report(PollProgress {
                            run_id: run_id.clone(),
                            attempt,
                            max_attempts,
                            status,
                            transient_error: None,
                        });
                    }
                },
                Err(err) if err.is_transient() => {
                    tracing::warn!(run_id = %run_id, attempt, error = %err, "Status check failed; retrying");
                    self.report(PollProgress {
                        run_id: run_id.clone(),
                        attempt,
                        max_attempts,
                        status: RemoteRunStatus::Running,
                        transient_error: Some(err.to_string()),
                    });
                }
                Err(err) => {
                    tracing::warn!(run_id = %run_id, attempt, error = %err, "Status check failed");
                    self.record(record.finished(RunRecordStatus::Failed, None));
                    self.state = PollState::Failed {
                        run_id: Some(run_id),
                    };
                    return Err(err);
                }
            }

            let interrupted = tokio::select! {
                biased;
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(self.config.poll_interval) => false,
            };
            if interrupted {
                return Ok(self.cancelled(Some(run_id)));
            }
        }

        tracing::warn!(run_id = %run_id, attempts = max_attempts, "Research run timed out");
        self.record(record.finished(RunRecordStatus::TimedOut, None));
        self.state = PollState::TimedOut {
            run_id: run_id.clone(),
        };
        Ok(RunOutcome::TimedOut {
            run_id,
            attempts: max_attempts,
        })
    }

    fn cancelled(&mut self, run_id: Option<String>) -> RunOutcome {
        tracing::info!(run_id = ?run_id, "Research run polling cancelled");
        self.state = PollState::Cancelled {
            run_id: run_id.clone(),
        };
        RunOutcome::Cancelled { run_id }
    }

    fn record(&self, record: RunRecord) {
        if self.cancel.is_cancelled() {
            return;
        }
        let Some(history) = &self.history else {
            return;
        };
        if let Err(err) = history.append(record) {
            tracing::warn!(error = %err, "Failed to save research run to history");
        }
    }

    fn report(&self, progress: PollProgress) {
        if self.cancel.is_cancelled() {
            return;
        }
        if let Some(callback) = &self.on_progress {
            callback(&progress);
        }
    }
}
