//! Persistence of [`DbrpMapping`]s in a [`KvStore`].
//!
//! Two keyspaces are used:
//!
//! * `dbrpv2` maps the big-endian id to the JSON encoded mapping;
//! * `dbrpindexv2` holds one entry per mapping keyed by
//!   `org_id | database | NUL | retention_policy | NUL | id`, whose value is
//!   the id. Scanning it yields mappings ordered by organization, database,
//!   retention policy and id, and an organization or organization+database
//!   prefix restricts the scan to that scope.
//!
//! Only this module knows the key layout. Every write touches the record and
//! its index entry in one transaction.

use std::sync::Arc;

use influxdb3_id::{DbrpId, OrgId};
use influxdb3_kv::{KvStore, ReadTransaction, WriteTransaction};
use observability_deps::tracing::warn;

use crate::DbrpMapping;

const MAPPING_KEYSPACE: &[u8] = b"dbrpv2";
pub(crate) const INDEX_KEYSPACE: &[u8] = b"dbrpindexv2";
const SEP: u8 = 0;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("key-value store error: {0}")]
    Kv(#[from] influxdb3_kv::Error),

    #[error("failed to encode mapping {id}: {source}")]
    Encode {
        id: DbrpId,
        source: serde_json::Error,
    },

    #[error("failed to decode mapping {id}: {source}")]
    Decode {
        id: DbrpId,
        source: serde_json::Error,
    },

    #[error("index entry references missing mapping {id}")]
    DanglingIndex { id: DbrpId },

    #[error("malformed index entry {key:?}")]
    MalformedIndex { key: Vec<u8> },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The part of the index a scan covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    All,
    Org(OrgId),
    Database(OrgId, &'a str),
}

impl Scope<'_> {
    fn prefix(&self) -> Vec<u8> {
        match self {
            Self::All => vec![],
            Self::Org(org_id) => org_id.to_be_bytes().to_vec(),
            Self::Database(org_id, database) => {
                let mut prefix = org_id.to_be_bytes().to_vec();
                prefix.extend_from_slice(database.as_bytes());
                prefix.push(SEP);
                prefix
            }
        }
    }
}

/// What happened to a write addressed to an existing mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// No mapping with the id exists.
    Missing,
    /// The mapping belongs to another organization; nothing was written.
    WrongOrg,
}

fn index_key(m: &DbrpMapping) -> Vec<u8> {
    let mut key = Scope::Database(m.org_id, &m.database).prefix();
    key.extend_from_slice(m.retention_policy.as_bytes());
    key.push(SEP);
    key.extend_from_slice(&m.id.to_be_bytes());
    key
}

fn decode_id(bytes: &[u8]) -> Option<DbrpId> {
    let bytes: [u8; 8] = bytes.try_into().ok()?;
    Some(DbrpId::from_be_bytes(bytes))
}

fn encode(mapping: &DbrpMapping) -> Result<Vec<u8>> {
    serde_json::to_vec(mapping).map_err(|source| Error::Encode {
        id: mapping.id,
        source,
    })
}

/// Write the record and index entry of `mapping`, dropping the index entry
/// of the version it replaces.
fn write_mapping(
    txn: &mut dyn WriteTransaction,
    previous: Option<&DbrpMapping>,
    mapping: &DbrpMapping,
    value: Vec<u8>,
) -> Result<()> {
    if let Some(previous) = previous {
        txn.delete(INDEX_KEYSPACE, &index_key(previous))?;
    }
    txn.put(MAPPING_KEYSPACE, &mapping.id.to_be_bytes(), value)?;
    txn.put(
        INDEX_KEYSPACE,
        &index_key(mapping),
        mapping.id.to_be_bytes().to_vec(),
    )?;
    Ok(())
}

fn read_mapping<R>(txn: &R, id: DbrpId) -> Result<Option<DbrpMapping>>
where
    R: ReadTransaction + ?Sized,
{
    txn.get(MAPPING_KEYSPACE, &id.to_be_bytes())?
        .map(|value| serde_json::from_slice(&value).map_err(|source| Error::Decode { id, source }))
        .transpose()
}

/// Stores mappings and their index in a [`KvStore`].
#[derive(Debug, Clone)]
pub struct MappingStore {
    kv: Arc<dyn KvStore>,
}

impl MappingStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn get(&self, id: DbrpId) -> Result<Option<DbrpMapping>> {
        let txn = self.kv.begin_read().await?;
        read_mapping(&*txn, id)
    }

    /// Store a new mapping and its index entry. Returns `false`, without
    /// writing, when a mapping with the same id already exists.
    pub async fn insert(&self, mapping: &DbrpMapping) -> Result<bool> {
        let value = encode(mapping)?;
        self.write(|txn| {
            if read_mapping(txn, mapping.id)?.is_some() {
                return Ok(false);
            }
            write_mapping(txn, None, mapping, value)?;
            Ok(true)
        })
        .await
    }

    /// Replace the stored mapping with `mapping`, moving its index entry.
    ///
    /// Ownership is checked in the same transaction as the write, so a
    /// mapping of another organization is never overwritten.
    pub async fn update(&self, mapping: &DbrpMapping) -> Result<Outcome> {
        let value = encode(mapping)?;
        self.write(|txn| {
            let Some(previous) = read_mapping(txn, mapping.id)? else {
                return Ok(Outcome::Missing);
            };
            if previous.org_id != mapping.org_id {
                return Ok(Outcome::WrongOrg);
            }
            write_mapping(txn, Some(&previous), mapping, value)?;
            Ok(Outcome::Done)
        })
        .await
    }

    /// Remove mapping `id` and its index entry if it is owned by `org_id`.
    pub async fn delete(&self, id: DbrpId, org_id: OrgId) -> Result<Outcome> {
        self.write(|txn| {
            let Some(previous) = read_mapping(txn, id)? else {
                return Ok(Outcome::Missing);
            };
            if previous.org_id != org_id {
                return Ok(Outcome::WrongOrg);
            }
            txn.delete(INDEX_KEYSPACE, &index_key(&previous))?;
            txn.delete(MAPPING_KEYSPACE, &id.to_be_bytes())?;
            Ok(Outcome::Done)
        })
        .await
    }

    /// All mappings within `scope`, in index order.
    pub async fn scan(&self, scope: Scope<'_>) -> Result<Vec<DbrpMapping>> {
        let txn = self.kv.begin_read().await?;
        txn.scan_prefix(INDEX_KEYSPACE, &scope.prefix())?
            .into_iter()
            .map(|(key, value)| {
                let id = decode_id(&value).ok_or(Error::MalformedIndex { key })?;
                read_mapping(&*txn, id)?.ok_or(Error::DanglingIndex { id })
            })
            .collect()
    }

    /// Run `f` in a write transaction, committing if it succeeds and
    /// aborting otherwise.
    async fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn WriteTransaction) -> Result<T> + Send,
        T: Send,
    {
        let mut txn = self.kv.begin_write().await?;
        match f(&mut *txn) {
            Ok(v) => {
                txn.commit().await?;
                Ok(v)
            }
            Err(e) => {
                if let Err(abort) = txn.abort().await {
                    warn!(error=%abort, "failed to abort dbrp transaction");
                }
                Err(e)
            }
        }
    }
}
