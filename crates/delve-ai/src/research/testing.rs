//! Deterministic task client and history for poller tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use delve_storage::RunRecord;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::{Duration, sleep};

use crate::error::{AiError, Result};
use crate::research::history::RunHistory;
use crate::task::{Processor, RemoteRun, RemoteRunStatus, TaskClient};

/// Scripted status response.
#[derive(Debug, Clone)]
pub enum MockStatus {
    Running,
    Completed(Value),
    Failed,
    TransportError,
    Remote(u16),
    NotFound,
}

/// Task client that replays a script of status responses.
///
/// Once the script is exhausted every further status call reports `running`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTaskClient {
    run_id: String,
    create_error: Option<u16>,
    status_delay: Duration,
    script: Arc<Mutex<VecDeque<MockStatus>>>,
    status_calls: Arc<AtomicU32>,
}

impl ScriptedTaskClient {
    pub fn new(run_id: impl Into<String>, steps: Vec<MockStatus>) -> Self {
        Self {
            run_id: run_id.into(),
            script: Arc::new(Mutex::new(VecDeque::from(steps))),
            ..Self::default()
        }
    }

    /// Make `create_run` fail with the given HTTP status.
    pub fn failing_create(status: u16) -> Self {
        Self {
            create_error: Some(status),
            ..Self::new("unused", Vec::new())
        }
    }

    pub fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = delay;
        self
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskClient for ScriptedTaskClient {
    async fn create_run(&self, _objective: &str, _processor: Processor) -> Result<RemoteRun> {
        if let Some(status) = self.create_error {
            return Err(AiError::Remote {
                status,
                body: "rejected".to_string(),
            });
        }
        Ok(RemoteRun {
            id: self.run_id.clone(),
            status: RemoteRunStatus::Created,
            output: None,
        })
    }

    async fn get_run_status(&self, run_id: &str) -> Result<RemoteRun> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if !self.status_delay.is_zero() {
            sleep(self.status_delay).await;
        }

        let step = self.script.lock().pop_front().unwrap_or(MockStatus::Running);
        let (status, output) = match step {
            MockStatus::Running => (RemoteRunStatus::Running, None),
            MockStatus::Completed(output) => (RemoteRunStatus::Completed, Some(output)),
            MockStatus::Failed => (RemoteRunStatus::Failed, None),
            MockStatus::TransportError => return Err(transport_error()),
            MockStatus::Remote(status) => {
                return Err(AiError::Remote {
                    status,
                    body: "remote error".to_string(),
                });
            }
            MockStatus::NotFound => return Err(AiError::NotFound(run_id.to_string())),
        };

        Ok(RemoteRun {
            id: run_id.to_string(),
            status,
            output,
        })
    }
}

/// Build a genuine `reqwest` transport error without touching the network.
fn transport_error() -> AiError {
    let err = reqwest::Client::new()
        .get("http://[invalid")
        .build()
        .expect_err("malformed URL must fail to build");
    AiError::Transport(err)
}

/// In-memory history that counts writes.
#[derive(Debug, Default)]
pub struct InMemoryRunHistory {
    records: Mutex<Vec<RunRecord>>,
    writes: AtomicU32,
}

impl InMemoryRunHistory {
    pub fn records(&self) -> Vec<RunRecord> {
        self.records.lock().clone()
    }

    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }
}

impl RunHistory for InMemoryRunHistory {
    fn append(&self, record: RunRecord) -> anyhow::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock();
        match records.iter_mut().find(|r| r.run_id == record.run_id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        Ok(())
    }

    fn get(&self, run_id: &str) -> Option<RunRecord> {
        self.records
            .lock()
            .iter()
            .find(|r| r.run_id == run_id)
            .cloned()
    }
}
