//! Delve Storage - local persistence for the research client
//!
//! Uses redb as the embedded database. Everything lives in a single
//! `kv_store` table of namespaced JSON blobs.
//!
//! # Keys
//!
//! - `deep_research_runs` - Deep research run history

pub mod kv_store;
pub mod paths;
pub mod run_history;
pub mod time_utils;

use anyhow::Result;
use redb::Database;
use std::path::Path;
use std::sync::Arc;

pub use kv_store::KvStore;
pub use run_history::{RUN_HISTORY_KEY, RunHistoryStorage, RunRecord, RunRecordStatus};

/// Central storage manager that initializes all storage subsystems
pub struct Storage {
    pub run_history: Arc<RunHistoryStorage>,
}

impl Storage {
    /// Open (or create) the database at the given path.
    ///
    /// The run history is loaded into memory here; afterwards it only changes
    /// through [`RunHistoryStorage::append`].
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let db = Arc::new(Database::create(path.as_ref())?);
        let run_history = Arc::new(RunHistoryStorage::open(db)?);

        Ok(Self { run_history })
    }
}
