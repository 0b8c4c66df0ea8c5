//! Run history storage - the local log of deep research runs.
//!
//! The whole history is a single JSON blob stored under
//! [`RUN_HISTORY_KEY`] in the kv table:
//!
//! ```json
//! { "version": 1, "records": [ { "runId": "...", "query": "...", ... } ] }
//! ```
//!
//! Records are keyed by `runId`: appending a record whose id is already
//! present replaces the stored entry in place instead of adding a duplicate.

use anyhow::Result;
use parking_lot::RwLock;
use redb::Database;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::kv_store::KvStore;
use crate::time_utils::now_ms;

/// Fixed namespace key for the run history blob.
pub const RUN_HISTORY_KEY: &str = "deep_research_runs";

const HISTORY_VERSION: u32 = 1;

/// Status of a recorded run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunRecordStatus {
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl RunRecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunRecordStatus::Running => "running",
            RunRecordStatus::Completed => "completed",
            RunRecordStatus::Failed => "failed",
            RunRecordStatus::TimedOut => "timed_out",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, RunRecordStatus::Running)
    }
}

impl fmt::Display for RunRecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted deep research run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    pub query: String,
    pub status: RunRecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Creation time in epoch milliseconds
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

impl RunRecord {
    /// Record for a freshly created run.
    pub fn running(
        run_id: impl Into<String>,
        query: impl Into<String>,
        processor: Option<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            query: query.into(),
            status: RunRecordStatus::Running,
            result: None,
            timestamp: now_ms(),
            processor,
            completed_at: None,
        }
    }

    /// Copy of this record moved to a terminal status.
    pub fn finished(&self, status: RunRecordStatus, result: Option<String>) -> Self {
        Self {
            status,
            result,
            completed_at: Some(now_ms()),
            ..self.clone()
        }
    }

    /// Merge a newer save of the same run into this record.
    ///
    /// The creation timestamp is kept, and a terminal status never goes back
    /// to `running`.
    fn merge(&mut self, newer: RunRecord) {
        if self.status.is_terminal() && !newer.status.is_terminal() {
            return;
        }
        self.status = newer.status;
        if newer.result.is_some() {
            self.result = newer.result;
        }
        if newer.processor.is_some() {
            self.processor = newer.processor;
        }
        if newer.completed_at.is_some() {
            self.completed_at = newer.completed_at;
        }
        if !newer.query.is_empty() {
            self.query = newer.query;
        }
    }
}

#[derive(Serialize, Deserialize)]
struct HistoryBlob {
    version: u32,
    #[serde(default)]
    records: Vec<RunRecord>,
}

/// Decode a stored blob. Missing or unreadable data is an empty history.
fn decode_history(bytes: Option<&[u8]>) -> Vec<RunRecord> {
    let Some(bytes) = bytes else {
        return Vec::new();
    };

    if let Ok(blob) = serde_json::from_slice::<HistoryBlob>(bytes) {
        if blob.version > HISTORY_VERSION {
            tracing::warn!(
                version = blob.version,
                "Run history was written by a newer version; reading known fields only"
            );
        }
        return blob.records;
    }

    // Unversioned layout: a bare array of records.
    match serde_json::from_slice::<Vec<RunRecord>>(bytes) {
        Ok(records) => records,
        Err(err) => {
            tracing::warn!(error = %err, "Run history is corrupt; starting with an empty history");
            Vec::new()
        }
    }
}

fn encode_history(records: &[RunRecord]) -> Result<Vec<u8>> {
    #[derive(Serialize)]
    struct BlobRef<'a> {
        version: u32,
        records: &'a [RunRecord],
    }

    Ok(serde_json::to_vec(&BlobRef {
        version: HISTORY_VERSION,
        records,
    })?)
}

fn upsert(records: &mut Vec<RunRecord>, record: RunRecord) {
    match records.iter_mut().find(|r| r.run_id == record.run_id) {
        Some(existing) => existing.merge(record),
        None => records.push(record),
    }
}

/// Run history storage with an in-process copy of the durable log.
pub struct RunHistoryStorage {
    kv: KvStore,
    records: RwLock<Vec<RunRecord>>,
}

impl RunHistoryStorage {
    /// Open the history and load it from durable storage.
    pub fn open(db: Arc<Database>) -> Result<Self> {
        let kv = KvStore::new(db)?;
        let storage = Self {
            kv,
            records: RwLock::new(Vec::new()),
        };
        *storage.records.write() = storage.load();
        Ok(storage)
    }

    /// Read the history from durable storage.
    ///
    /// Never fails: read errors and corrupt data both yield an empty history.
    pub fn load(&self) -> Vec<RunRecord> {
        match self.kv.get_raw(RUN_HISTORY_KEY) {
            Ok(bytes) => decode_history(bytes.as_deref()),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read run history");
                Vec::new()
            }
        }
    }

    /// Save a record, replacing any stored record with the same run id.
    pub fn append(&self, record: RunRecord) -> Result<()> {
        let run_id = record.run_id.clone();
        // Held across the write so the cache is replaced in commit order.
        let mut cache = self.records.write();
        let mut updated = None;

        self.kv.update_raw(RUN_HISTORY_KEY, |current| {
            let mut records = decode_history(current);
            upsert(&mut records, record);
            let bytes = encode_history(&records)?;
            updated = Some(records);
            Ok(bytes)
        })?;

        if let Some(records) = updated {
            *cache = records;
        }
        tracing::debug!(run_id = %run_id, "Saved run record");
        Ok(())
    }

    /// All records in insertion order.
    pub fn list(&self) -> Vec<RunRecord> {
        self.records.read().clone()
    }

    /// Look up a record by run id.
    pub fn get(&self, run_id: &str) -> Option<RunRecord> {
        self.records
            .read()
            .iter()
            .find(|r| r.run_id == run_id)
            .cloned()
    }

    /// The last `limit` records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<RunRecord> {
        self.records
            .read()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }
}
