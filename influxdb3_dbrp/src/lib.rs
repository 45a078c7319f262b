//! DBRP mappings.
//!
//! The 1.x write and query APIs address data by a database and retention
//! policy (DBRP). A [`DbrpMapping`] ties such a pair to a bucket within an
//! organization so those requests can be served from bucket storage.
//!
//! The crate is layered:
//!
//! * [`MappingStore`] encodes mappings into a [`KvStore`] and maintains the
//!   secondary index used for filtered scans;
//! * [`DbrpService`] validates input, enforces uniqueness and answers
//!   filtered lookups;
//! * [`AuthorizedDbrpService`] and [`MetricDecorator`] wrap any
//!   [`DbrpMappingService`] to add permission checks and latency metrics.
//!
//! [`KvStore`]: influxdb3_kv::KvStore

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use influxdb3_authz::Caller;
use influxdb3_id::{BucketId, DbrpId, OrgId};
use serde::{Deserialize, Serialize};

mod authorized;
mod bucket;
mod config;
mod error;
mod metrics;
mod service;
pub mod store;
#[cfg(test)]
mod test_helpers;

pub use authorized::AuthorizedDbrpService;
pub use bucket::{BucketLookup, MemBucketLookup};
pub use config::DbrpConfig;
pub use error::{Error, ErrorKind, Result};
pub use metrics::MetricDecorator;
pub use service::DbrpService;
pub use store::MappingStore;

/// Associates a legacy database/retention-policy pair with a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbrpMapping {
    /// Unset ([`DbrpId::INVALID`]) on create requests the generator pick one.
    pub id: DbrpId,
    pub database: String,
    pub retention_policy: String,
    /// Marks the retention policy used when a request names only the
    /// database.
    pub default: bool,
    #[serde(rename = "orgID")]
    pub org_id: OrgId,
    #[serde(rename = "bucketID")]
    pub bucket_id: BucketId,
}

impl DbrpMapping {
    /// Check the fields a caller must supply. The id is not checked since it
    /// may legitimately be unset on create.
    pub fn validate(&self) -> Result<()> {
        validate_name("database", &self.database)?;
        validate_name("retention policy", &self.retention_policy)?;
        if !self.org_id.is_valid() {
            return Err(Error::invalid("organization id must be set"));
        }
        if !self.bucket_id.is_valid() {
            return Err(Error::invalid("bucket id must be set"));
        }
        Ok(())
    }
}

fn validate_name(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::invalid(format!("{field} must be set")));
    }
    // NUL separates the components of index keys
    if value.contains('\0') {
        return Err(Error::invalid(format!("{field} must not contain NUL")));
    }
    Ok(())
}

/// Narrows a listing. Every field that is set must match; unset fields do
/// not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbrpMappingFilter {
    pub id: Option<DbrpId>,
    pub org_id: Option<OrgId>,
    pub bucket_id: Option<BucketId>,
    pub database: Option<String>,
    pub retention_policy: Option<String>,
    pub default: Option<bool>,
}

impl DbrpMappingFilter {
    pub fn matches(&self, m: &DbrpMapping) -> bool {
        self.id.is_none_or(|id| id == m.id)
            && self.org_id.is_none_or(|org_id| org_id == m.org_id)
            && self.bucket_id.is_none_or(|bucket_id| bucket_id == m.bucket_id)
            && self.database.as_ref().is_none_or(|db| *db == m.database)
            && self
                .retention_policy
                .as_ref()
                .is_none_or(|rp| *rp == m.retention_policy)
            && self.default.is_none_or(|default| default == m.default)
    }
}

/// Ordering and paging of a listing.
///
/// Results are ordered by organization, database, retention policy and id,
/// reversed when `descending` is set. `offset` and `limit` apply after the
/// total has been counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub offset: usize,
    pub limit: Option<usize>,
    pub descending: bool,
}

/// The operations offered on DBRP mappings.
///
/// Every call carries the [`Caller`] so that decorators can make access
/// decisions; the plain [`DbrpService`] ignores it.
#[async_trait]
pub trait DbrpMappingService: Debug + Send + Sync + 'static {
    /// Fetch mapping `id`, which must belong to `org_id`.
    async fn find_by_id(&self, caller: &Caller, org_id: OrgId, id: DbrpId) -> Result<DbrpMapping>;

    /// List the mappings matching `filter`, together with the number of
    /// matches before `opts` paging was applied.
    async fn find_many(
        &self,
        caller: &Caller,
        filter: &DbrpMappingFilter,
        opts: &FindOptions,
    ) -> Result<(Vec<DbrpMapping>, usize)>;

    /// Store a new mapping, assigning an id if none was given. A mapping
    /// with the same id must not already exist.
    async fn create(&self, caller: &Caller, mapping: DbrpMapping) -> Result<DbrpMapping>;

    /// Replace the mutable fields of an existing mapping.
    async fn update(&self, caller: &Caller, mapping: DbrpMapping) -> Result<DbrpMapping>;

    /// Remove mapping `id`, which must belong to `org_id`.
    async fn delete(&self, caller: &Caller, org_id: OrgId, id: DbrpId) -> Result<()>;
}

#[async_trait]
impl<T> DbrpMappingService for Arc<T>
where
    T: DbrpMappingService + ?Sized,
{
    async fn find_by_id(&self, caller: &Caller, org_id: OrgId, id: DbrpId) -> Result<DbrpMapping> {
        (**self).find_by_id(caller, org_id, id).await
    }

    async fn find_many(
        &self,
        caller: &Caller,
        filter: &DbrpMappingFilter,
        opts: &FindOptions,
    ) -> Result<(Vec<DbrpMapping>, usize)> {
        (**self).find_many(caller, filter, opts).await
    }

    async fn create(&self, caller: &Caller, mapping: DbrpMapping) -> Result<DbrpMapping> {
        (**self).create(caller, mapping).await
    }

    async fn update(&self, caller: &Caller, mapping: DbrpMapping) -> Result<DbrpMapping> {
        (**self).update(caller, mapping).await
    }

    async fn delete(&self, caller: &Caller, org_id: OrgId, id: DbrpId) -> Result<()> {
        (**self).delete(caller, org_id, id).await
    }
}
