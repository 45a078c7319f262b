use std::{collections::HashSet, fmt::Debug};

use async_trait::async_trait;
use influxdb3_id::{BucketId, OrgId};
use parking_lot::RwLock;

/// Confirms that a bucket exists before a mapping is pointed at it.
#[async_trait]
pub trait BucketLookup: Debug + Send + Sync + 'static {
    async fn exists(&self, org_id: OrgId, bucket_id: BucketId) -> bool;
}

/// A [`BucketLookup`] over a fixed, in-memory set of buckets.
#[derive(Debug, Default)]
pub struct MemBucketLookup {
    buckets: RwLock<HashSet<(OrgId, BucketId)>>,
}

impl MemBucketLookup {
    pub fn new(buckets: impl IntoIterator<Item = (OrgId, BucketId)>) -> Self {
        Self {
            buckets: RwLock::new(buckets.into_iter().collect()),
        }
    }

    pub fn insert(&self, org_id: OrgId, bucket_id: BucketId) {
        self.buckets.write().insert((org_id, bucket_id));
    }

    pub fn remove(&self, org_id: OrgId, bucket_id: BucketId) -> bool {
        self.buckets.write().remove(&(org_id, bucket_id))
    }
}

#[async_trait]
impl BucketLookup for MemBucketLookup {
    async fn exists(&self, org_id: OrgId, bucket_id: BucketId) -> bool {
        self.buckets.read().contains(&(org_id, bucket_id))
    }
}
