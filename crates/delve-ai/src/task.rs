//! Remote task runs: creation and status queries.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::client::{AuthScheme, ParallelClient};
use crate::error::{AiError, Result};

/// Processor tier used for a task run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Processor {
    Lite,
    Base,
    Core,
    Pro,
    #[default]
    Ultra,
}

impl Processor {
    pub const ALL: [Processor; 5] = [
        Processor::Lite,
        Processor::Base,
        Processor::Core,
        Processor::Pro,
        Processor::Ultra,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Processor::Lite => "lite",
            Processor::Base => "base",
            Processor::Core => "core",
            Processor::Pro => "pro",
            Processor::Ultra => "ultra",
        }
    }
}

impl fmt::Display for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Processor {
    type Err = AiError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        Processor::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| {
                AiError::InvalidConfig(format!(
                    "unknown processor '{s}' (expected one of: lite, base, core, pro, ultra)"
                ))
            })
    }
}

/// Client-side view of a remote run's status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteRunStatus {
    Created,
    Running,
    Completed,
    Failed,
    /// Inferred by the client when the poll budget runs out.
    TimedOut,
}

impl RemoteRunStatus {
    /// Map a status string reported by the remote API.
    pub fn from_remote(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "queued" | "created" => RemoteRunStatus::Created,
            "completed" => RemoteRunStatus::Completed,
            "failed" | "cancelled" | "errored" => RemoteRunStatus::Failed,
            _ => RemoteRunStatus::Running,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RemoteRunStatus::Completed | RemoteRunStatus::Failed | RemoteRunStatus::TimedOut
        )
    }
}

impl fmt::Display for RemoteRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemoteRunStatus::Created => "created",
            RemoteRunStatus::Running => "running",
            RemoteRunStatus::Completed => "completed",
            RemoteRunStatus::Failed => "failed",
            RemoteRunStatus::TimedOut => "timed_out",
        };
        f.write_str(s)
    }
}

/// A remote task run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteRun {
    pub id: String,
    pub status: RemoteRunStatus,
    /// Only present when `status` is `Completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

#[derive(Deserialize)]
struct RunResponse {
    #[serde(default)]
    run_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    output: Option<Value>,
}

impl RemoteRun {
    fn from_response(response: RunResponse, requested_id: Option<&str>) -> Result<Self> {
        let id = response
            .run_id
            .or_else(|| requested_id.map(str::to_string))
            .ok_or_else(|| AiError::InvalidResponse("response is missing run_id".into()))?;
        let status = response
            .status
            .as_deref()
            .map(RemoteRunStatus::from_remote)
            .unwrap_or(RemoteRunStatus::Running);
        let output = match status {
            RemoteRunStatus::Completed => response.output,
            _ => None,
        };

        Ok(Self { id, status, output })
    }
}

/// Transport for task runs. Implementations must not retry.
#[async_trait]
pub trait TaskClient: Send + Sync {
    /// Submit a new run.
    async fn create_run(&self, objective: &str, processor: Processor) -> Result<RemoteRun>;

    /// Query a run's current status.
    async fn get_run_status(&self, run_id: &str) -> Result<RemoteRun>;
}

#[async_trait]
impl TaskClient for ParallelClient {
    async fn create_run(&self, objective: &str, processor: Processor) -> Result<RemoteRun> {
        if objective.trim().is_empty() {
            return Err(AiError::InvalidInput("research query is empty".into()));
        }

        let body = json!({
            "input": objective,
            "processor": processor.as_str(),
        });
        let response: RunResponse = self
            .post_json("/v1/tasks/runs", AuthScheme::ApiKey, &body)
            .await?;
        let mut run = RemoteRun::from_response(response, None)?;
        // A freshly created run has not been observed running yet.
        if run.status == RemoteRunStatus::Running {
            run.status = RemoteRunStatus::Created;
        }
        Ok(run)
    }

    async fn get_run_status(&self, run_id: &str) -> Result<RemoteRun> {
        let path = format!("/v1/tasks/runs/{run_id}");
        let response: RunResponse = match self.get_json(&path, AuthScheme::ApiKey).await {
            Err(AiError::Remote { status: 404, .. }) => {
                return Err(AiError::NotFound(run_id.to_string()));
            }
            other => other?,
        };
        RemoteRun::from_response(response, Some(run_id))
    }
}
