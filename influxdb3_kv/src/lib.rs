//! A transactional key-value abstraction.
//!
//! Data lives in named keyspaces, each an ordered map from byte keys to byte
//! values. All access goes through transactions:
//!
//! * a [`ReadTransaction`] sees a consistent snapshot of committed state;
//! * a [`WriteTransaction`] stages writes that become visible to other
//!   transactions all at once on [`commit`](WriteTransaction::commit), or
//!   not at all.
//!
//! [`MemKvStore`] is the in-memory implementation.
use std::fmt::Debug;

use async_trait::async_trait;

mod mem;

pub use mem::MemKvStore;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("key-value backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    pub fn backend(source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self::Backend(source.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An ordered list of key/value pairs produced by a prefix scan.
pub type KeyValues = Vec<(Vec<u8>, Vec<u8>)>;

/// Entry point for opening transactions against a store.
#[async_trait]
pub trait KvStore: Debug + Send + Sync + 'static {
    /// Open a read-only view of the currently committed state.
    async fn begin_read(&self) -> Result<Box<dyn ReadTransaction>>;

    /// Open a write transaction.
    ///
    /// Implementations serialize write transactions, so this waits until any
    /// in-flight writer has committed or aborted.
    async fn begin_write(&self) -> Result<Box<dyn WriteTransaction>>;
}

/// Reads against a single consistent view of the store.
pub trait ReadTransaction: Debug + Send + Sync {
    /// Fetch the value stored under `key`, if any.
    fn get(&self, keyspace: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// All entries whose key starts with `prefix`, in ascending key order.
    ///
    /// An empty prefix scans the whole keyspace.
    fn scan_prefix(&self, keyspace: &[u8], prefix: &[u8]) -> Result<KeyValues>;
}

/// A read transaction that can also stage writes.
///
/// Reads observe the transaction's own staged writes.
#[async_trait]
pub trait WriteTransaction: ReadTransaction {
    fn put(&mut self, keyspace: &[u8], key: &[u8], value: Vec<u8>) -> Result<()>;

    /// Remove `key`, returning whether it was present.
    fn delete(&mut self, keyspace: &[u8], key: &[u8]) -> Result<bool>;

    /// Atomically publish every staged write.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discard every staged write.
    async fn abort(self: Box<Self>) -> Result<()>;
}
