//! History seam used by the run poller.

use delve_storage::{RunHistoryStorage, RunRecord};

/// Where the poller records run submissions and terminal outcomes.
pub trait RunHistory: Send + Sync {
    /// Save a record. Saving an existing run id replaces that run's entry.
    fn append(&self, record: RunRecord) -> anyhow::Result<()>;

    /// Look up a run by id.
    fn get(&self, run_id: &str) -> Option<RunRecord>;
}

impl RunHistory for RunHistoryStorage {
    fn append(&self, record: RunRecord) -> anyhow::Result<()> {
        RunHistoryStorage::append(self, record)
    }

    fn get(&self, run_id: &str) -> Option<RunRecord> {
        RunHistoryStorage::get(self, run_id)
    }
}
