//! In-memory [`KvStore`] with snapshot isolation.
//!
//! Committed state is an immutable map behind an [`Arc`]. Readers clone the
//! [`Arc`] and never block writers; a writer stages changes on a private copy
//! and swaps it in on commit. Writers are serialized by an async mutex.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use observability_deps::tracing::{debug, warn};
use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{KeyValues, KvStore, ReadTransaction, Result, WriteTransaction};

type Keyspace = BTreeMap<Vec<u8>, Vec<u8>>;
type Keyspaces = BTreeMap<Vec<u8>, Keyspace>;

/// In-memory key-value store, suitable for tests and single-process use.
#[derive(Debug, Default)]
pub struct MemKvStore {
    committed: Arc<RwLock<Arc<Keyspaces>>>,
    writer: Arc<Mutex<()>>,
}

impl MemKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemKvStore {
    async fn begin_read(&self) -> Result<Box<dyn ReadTransaction>> {
        let snapshot = Arc::clone(&*self.committed.read());
        Ok(Box::new(MemReadTxn { snapshot }))
    }

    async fn begin_write(&self) -> Result<Box<dyn WriteTransaction>> {
        let guard = Arc::clone(&self.writer).lock_owned().await;
        let stage = Keyspaces::clone(&**self.committed.read());
        Ok(Box::new(MemWriteTxn {
            guard: Some(guard),
            stage,
            committed: Arc::clone(&self.committed),
        }))
    }
}

fn get(keyspaces: &Keyspaces, keyspace: &[u8], key: &[u8]) -> Option<Vec<u8>> {
    keyspaces.get(keyspace)?.get(key).cloned()
}

fn scan_prefix(keyspaces: &Keyspaces, keyspace: &[u8], prefix: &[u8]) -> KeyValues {
    let Some(entries) = keyspaces.get(keyspace) else {
        return vec![];
    };
    entries
        .range(prefix.to_vec()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[derive(Debug)]
struct MemReadTxn {
    snapshot: Arc<Keyspaces>,
}

impl ReadTransaction for MemReadTxn {
    fn get(&self, keyspace: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(get(&self.snapshot, keyspace, key))
    }

    fn scan_prefix(&self, keyspace: &[u8], prefix: &[u8]) -> Result<KeyValues> {
        Ok(scan_prefix(&self.snapshot, keyspace, prefix))
    }
}

/// Write transaction bound to a [`MemKvStore`].
///
/// Holds the writer lock until committed, aborted or dropped. `guard` is
/// cleared on commit or abort.
#[derive(Debug)]
struct MemWriteTxn {
    guard: Option<OwnedMutexGuard<()>>,
    stage: Keyspaces,
    committed: Arc<RwLock<Arc<Keyspaces>>>,
}

impl ReadTransaction for MemWriteTxn {
    fn get(&self, keyspace: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(get(&self.stage, keyspace, key))
    }

    fn scan_prefix(&self, keyspace: &[u8], prefix: &[u8]) -> Result<KeyValues> {
        Ok(scan_prefix(&self.stage, keyspace, prefix))
    }
}

#[async_trait]
impl WriteTransaction for MemWriteTxn {
    fn put(&mut self, keyspace: &[u8], key: &[u8], value: Vec<u8>) -> Result<()> {
        self.stage
            .entry(keyspace.to_vec())
            .or_default()
            .insert(key.to_vec(), value);
        Ok(())
    }

    fn delete(&mut self, keyspace: &[u8], key: &[u8]) -> Result<bool> {
        Ok(self
            .stage
            .get_mut(keyspace)
            .map(|entries| entries.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        let stage = std::mem::take(&mut self.stage);
        *self.committed.write() = Arc::new(stage);
        // release the writer only once the new state is visible
        self.guard = None;
        debug!("committed in-memory kv transaction");
        Ok(())
    }

    async fn abort(mut self: Box<Self>) -> Result<()> {
        self.stage.clear();
        self.guard = None;
        Ok(())
    }
}

impl Drop for MemWriteTxn {
    fn drop(&mut self) {
        if self.guard.is_some() {
            warn!("Dropping MemWriteTxn w/o finalizing (commit or abort)");
        }
    }
}
