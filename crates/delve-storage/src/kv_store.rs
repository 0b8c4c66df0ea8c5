//! KV store storage - namespaced byte blobs in a single redb table.

use anyhow::Result;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::sync::Arc;

const KV_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kv_store");

/// Key-value storage with a byte-level API.
#[derive(Debug, Clone)]
pub struct KvStore {
    db: Arc<Database>,
}

impl KvStore {
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(KV_TABLE)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Store raw bytes under a key.
    pub fn put_raw(&self, key: &str, data: &[u8]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(KV_TABLE)?;
            table.insert(key, data)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get raw bytes by key.
    pub fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(KV_TABLE)?;

        if let Some(value) = table.get(key)? {
            Ok(Some(value.value().to_vec()))
        } else {
            Ok(None)
        }
    }

    /// Read-modify-write a key inside one write transaction.
    ///
    /// `update` receives the current bytes (if any) and returns the bytes to
    /// store. redb allows a single writer at a time, so concurrent updates of
    /// the same key are serialized rather than interleaved.
    pub fn update_raw<F>(&self, key: &str, update: F) -> Result<()>
    where
        F: FnOnce(Option<&[u8]>) -> Result<Vec<u8>>,
    {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(KV_TABLE)?;
            let current = table.get(key)?.map(|value| value.value().to_vec());
            let next = update(current.as_deref())?;
            table.insert(key, next.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
