//! Behavioural tests shared by every [`DbrpMappingService`] implementation.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use influxdb3_authz::Caller;
use influxdb3_id::{BucketId, DbrpId, OrgId, SequentialIdGenerator};
use influxdb3_kv::{KeyValues, KvStore, MemKvStore, ReadTransaction, WriteTransaction};
use pretty_assertions::assert_eq;

use crate::{
    DbrpConfig, DbrpMapping, DbrpMappingFilter, DbrpMappingService, DbrpService, ErrorKind,
    FindOptions, MemBucketLookup, store::INDEX_KEYSPACE,
};

pub(crate) const ORG_1: OrgId = OrgId::new(0xba55_ba55_ba55_ba55);
pub(crate) const ORG_2: OrgId = OrgId::new(0xbead_bead_bead_bead);
pub(crate) const ORG_3: OrgId = OrgId::new(0xcafe_cafe_cafe_cafe);

pub(crate) const BUCKET_1: BucketId = BucketId::new(0x5555_f00d_5555_f00d);
pub(crate) const BUCKET_2: BucketId = BucketId::new(0x6666_f00d_6666_f00d);
pub(crate) const BUCKET_3: BucketId = BucketId::new(0x7777_f00d_7777_f00d);
pub(crate) const BUCKET_A: BucketId = BucketId::new(0x0a0a_f00d_0a0a_f00d);
pub(crate) const BUCKET_B: BucketId = BucketId::new(0x0b0b_f00d_0b0b_f00d);

pub(crate) fn known_buckets() -> Vec<(OrgId, BucketId)> {
    vec![
        (ORG_1, BUCKET_1),
        (ORG_1, BUCKET_3),
        (ORG_2, BUCKET_2),
        (ORG_3, BUCKET_A),
        (ORG_3, BUCKET_B),
    ]
}

/// A service over an empty in-memory store that knows [`known_buckets`].
pub(crate) fn new_dbrp_service() -> DbrpService {
    DbrpService::new(
        Arc::new(MemKvStore::new()),
        Arc::new(MemBucketLookup::new(known_buckets())),
        Arc::new(SequentialIdGenerator::new(1_000_000)),
        DbrpConfig::default(),
    )
}

/// A [`MemKvStore`] whose write transactions fail every write to the index
/// keyspace while `fail_index_writes` is set.
#[derive(Debug, Default)]
pub(crate) struct FaultyKv {
    inner: MemKvStore,
    pub(crate) fail_index_writes: Arc<AtomicBool>,
}

#[derive(Debug)]
struct FaultyTxn {
    inner: Box<dyn WriteTransaction>,
    fail_index_writes: bool,
}

impl FaultyTxn {
    fn check(&self, keyspace: &[u8]) -> influxdb3_kv::Result<()> {
        if self.fail_index_writes && keyspace == INDEX_KEYSPACE {
            return Err(influxdb3_kv::Error::backend("injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for FaultyKv {
    async fn begin_read(&self) -> influxdb3_kv::Result<Box<dyn ReadTransaction>> {
        self.inner.begin_read().await
    }

    async fn begin_write(&self) -> influxdb3_kv::Result<Box<dyn WriteTransaction>> {
        Ok(Box::new(FaultyTxn {
            inner: self.inner.begin_write().await?,
            fail_index_writes: self.fail_index_writes.load(Ordering::SeqCst),
        }))
    }
}

impl ReadTransaction for FaultyTxn {
    fn get(&self, keyspace: &[u8], key: &[u8]) -> influxdb3_kv::Result<Option<Vec<u8>>> {
        self.inner.get(keyspace, key)
    }

    fn scan_prefix(&self, keyspace: &[u8], prefix: &[u8]) -> influxdb3_kv::Result<KeyValues> {
        self.inner.scan_prefix(keyspace, prefix)
    }
}

#[async_trait]
impl WriteTransaction for FaultyTxn {
    fn put(&mut self, keyspace: &[u8], key: &[u8], value: Vec<u8>) -> influxdb3_kv::Result<()> {
        self.check(keyspace)?;
        self.inner.put(keyspace, key, value)
    }

    fn delete(&mut self, keyspace: &[u8], key: &[u8]) -> influxdb3_kv::Result<bool> {
        self.check(keyspace)?;
        self.inner.delete(keyspace, key)
    }

    async fn commit(self: Box<Self>) -> influxdb3_kv::Result<()> {
        self.inner.commit().await
    }

    async fn abort(self: Box<Self>) -> influxdb3_kv::Result<()> {
        self.inner.abort().await
    }
}

pub(crate) fn dbrp(
    id: u64,
    database: &str,
    retention_policy: &str,
    default: bool,
    org_id: OrgId,
    bucket_id: BucketId,
) -> DbrpMapping {
    DbrpMapping {
        id: DbrpId::new(id),
        database: database.to_string(),
        retention_policy: retention_policy.to_string(),
        default,
        org_id,
        bucket_id,
    }
}

async fn populate(svc: &dyn DbrpMappingService, caller: &Caller, mappings: &[DbrpMapping]) {
    for m in mappings {
        svc.create(caller, m.clone())
            .await
            .expect("failed to populate dbrp mappings");
    }
}

async fn find_all(svc: &dyn DbrpMappingService, caller: &Caller) -> Vec<DbrpMapping> {
    let (mappings, total) = svc
        .find_many(caller, &DbrpMappingFilter::default(), &FindOptions::default())
        .await
        .expect("failed to retrieve all dbrp mappings");
    assert_eq!(mappings.len(), total);
    mappings
}

fn ids(mappings: &[DbrpMapping]) -> Vec<u64> {
    mappings.iter().map(|m| m.id.as_u64()).collect()
}

/// Run every case against a fresh service from `new_service`, using the
/// returned caller for all requests.
pub(crate) async fn test_service<F>(new_service: F)
where
    F: Fn() -> (Arc<dyn DbrpMappingService>, Caller),
{
    let (svc, caller) = new_service();
    test_create(svc.as_ref(), &caller).await;
    let (svc, caller) = new_service();
    test_create_duplicate_id(svc.as_ref(), &caller).await;
    let (svc, caller) = new_service();
    test_create_rejects_invalid(svc.as_ref(), &caller).await;
    let (svc, caller) = new_service();
    test_find_many(svc.as_ref(), &caller).await;
    let (svc, caller) = new_service();
    test_find_by_id(svc.as_ref(), &caller).await;
    let (svc, caller) = new_service();
    test_update(svc.as_ref(), &caller).await;
    let (svc, caller) = new_service();
    test_delete(svc.as_ref(), &caller).await;
}

async fn test_create(svc: &dyn DbrpMappingService, caller: &Caller) {
    let m = dbrp(100, "database1", "retention_policy1", false, ORG_1, BUCKET_1);

    let created = svc.create(caller, m.clone()).await.unwrap();
    assert_eq!(created, m);
    assert_eq!(find_all(svc, caller).await, vec![m.clone()]);
    assert_eq!(svc.find_by_id(caller, ORG_1, m.id).await.unwrap(), m);

    // an unset id is filled in
    let generated = svc
        .create(
            caller,
            dbrp(0, "database1", "retention_policy2", true, ORG_1, BUCKET_1),
        )
        .await
        .unwrap();
    assert!(generated.id.is_valid());
    assert_ne!(generated.id, m.id);
    assert_eq!(
        svc.find_by_id(caller, ORG_1, generated.id).await.unwrap(),
        generated
    );
}

async fn test_create_duplicate_id(svc: &dyn DbrpMappingService, caller: &Caller) {
    let original = dbrp(100, "database1", "retention_policy1", false, ORG_1, BUCKET_1);
    populate(svc, caller, &[original.clone()]).await;

    let err = svc
        .create(
            caller,
            dbrp(100, "database1", "retention_policy1", true, ORG_1, BUCKET_1),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists, "{err}");

    assert_eq!(find_all(svc, caller).await, vec![original]);
}

async fn test_create_rejects_invalid(svc: &dyn DbrpMappingService, caller: &Caller) {
    let cases = [
        // bucket does not exist
        dbrp(100, "database1", "retention_policy1", false, ORG_1, BUCKET_2),
        dbrp(100, "", "retention_policy1", false, ORG_1, BUCKET_1),
        dbrp(100, "database1", "", false, ORG_1, BUCKET_1),
    ];
    for m in cases {
        let err = svc.create(caller, m.clone()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid, "{m:?}: {err}");
    }
    assert!(find_all(svc, caller).await.is_empty());
}

async fn test_find_many(svc: &dyn DbrpMappingService, caller: &Caller) {
    populate(
        svc,
        caller,
        &[
            dbrp(500, "database2", "retention_policyA", true, ORG_3, BUCKET_A),
            dbrp(100, "database1", "retention_policy1", false, ORG_1, BUCKET_1),
            dbrp(400, "database1", "retention_policyB", false, ORG_3, BUCKET_B),
            dbrp(200, "database2", "retention_policy2", true, ORG_2, BUCKET_2),
            dbrp(600, "database1", "retention_policyA", true, ORG_3, BUCKET_A),
            dbrp(300, "database1", "retention_policyA", true, ORG_3, BUCKET_A),
        ],
    )
    .await;

    let cases: Vec<(&str, DbrpMappingFilter, Vec<u64>)> = vec![
        (
            "find all",
            DbrpMappingFilter::default(),
            vec![100, 200, 300, 600, 400, 500],
        ),
        (
            "find by id",
            DbrpMappingFilter {
                id: Some(DbrpId::new(300)),
                ..Default::default()
            },
            vec![300],
        ),
        (
            "find by id and another org",
            DbrpMappingFilter {
                id: Some(DbrpId::new(300)),
                org_id: Some(ORG_1),
                ..Default::default()
            },
            vec![],
        ),
        (
            "find by bucket id",
            DbrpMappingFilter {
                bucket_id: Some(BUCKET_A),
                ..Default::default()
            },
            vec![300, 600, 500],
        ),
        (
            "find by org id",
            DbrpMappingFilter {
                org_id: Some(ORG_3),
                ..Default::default()
            },
            vec![300, 600, 400, 500],
        ),
        (
            "find by db",
            DbrpMappingFilter {
                database: Some("database1".to_string()),
                ..Default::default()
            },
            vec![100, 300, 600, 400],
        ),
        (
            "find by rp",
            DbrpMappingFilter {
                retention_policy: Some("retention_policyA".to_string()),
                ..Default::default()
            },
            vec![300, 600, 500],
        ),
        (
            "find by default",
            DbrpMappingFilter {
                default: Some(true),
                ..Default::default()
            },
            vec![200, 300, 600, 500],
        ),
        (
            "find by org and db",
            DbrpMappingFilter {
                org_id: Some(ORG_3),
                database: Some("database1".to_string()),
                default: Some(false),
                ..Default::default()
            },
            vec![400],
        ),
        (
            "mixed",
            DbrpMappingFilter {
                retention_policy: Some("retention_policyA".to_string()),
                default: Some(true),
                org_id: Some(ORG_3),
                ..Default::default()
            },
            vec![300, 600, 500],
        ),
        (
            "not found",
            DbrpMappingFilter {
                database: Some("database2".to_string()),
                retention_policy: Some("retention_policyB".to_string()),
                ..Default::default()
            },
            vec![],
        ),
        (
            "unknown org",
            DbrpMappingFilter {
                org_id: Some(OrgId::new(1)),
                ..Default::default()
            },
            vec![],
        ),
    ];

    for (name, filter, want) in cases {
        let (got, total) = svc
            .find_many(caller, &filter, &FindOptions::default())
            .await
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        assert_eq!(ids(&got), want, "{name}");
        assert_eq!(total, want.len(), "{name}");
        for m in &got {
            assert!(filter.matches(m), "{name}: {m:?}");
        }

        // repeated calls give the same answer
        let (again, _) = svc
            .find_many(caller, &filter, &FindOptions::default())
            .await
            .unwrap();
        assert_eq!(again, got, "{name}");
    }

    let org_3 = DbrpMappingFilter {
        org_id: Some(ORG_3),
        ..Default::default()
    };

    let (page, total) = svc
        .find_many(
            caller,
            &org_3,
            &FindOptions {
                offset: 1,
                limit: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(ids(&page), [600, 400]);
    assert_eq!(total, 4);

    let (page, total) = svc
        .find_many(
            caller,
            &org_3,
            &FindOptions {
                offset: 10,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(page.is_empty());
    assert_eq!(total, 4);

    let (desc, _) = svc
        .find_many(
            caller,
            &org_3,
            &FindOptions {
                descending: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(ids(&desc), [500, 400, 600, 300]);
}

async fn test_find_by_id(svc: &dyn DbrpMappingService, caller: &Caller) {
    populate(
        svc,
        caller,
        &[
            dbrp(100, "database", "retention_policyA", false, ORG_3, BUCKET_A),
            dbrp(200, "database", "retention_policyA", false, ORG_3, BUCKET_A),
            dbrp(300, "database", "retention_policyA", false, ORG_3, BUCKET_A),
        ],
    )
    .await;

    assert_eq!(
        svc.find_by_id(caller, ORG_3, DbrpId::new(200)).await.unwrap(),
        dbrp(200, "database", "retention_policyA", false, ORG_3, BUCKET_A)
    );

    let err = svc
        .find_by_id(caller, ORG_3, DbrpId::new(400))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound, "{err}");

    // mappings of other organizations are invisible
    let err = svc
        .find_by_id(caller, ORG_1, DbrpId::new(200))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound, "{err}");

    let err = svc
        .find_by_id(caller, OrgId::INVALID, DbrpId::new(200))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invalid, "{err}");
    let err = svc
        .find_by_id(caller, ORG_3, DbrpId::INVALID)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invalid, "{err}");
}

async fn test_update(svc: &dyn DbrpMappingService, caller: &Caller) {
    let original = dbrp(100, "database1", "retention_policy1", false, ORG_1, BUCKET_1);
    let other = dbrp(200, "database1", "retention_policy2", true, ORG_1, BUCKET_1);
    populate(svc, caller, &[original.clone(), other.clone()]).await;

    let changed = dbrp(100, "database9", "retention_policy9", true, ORG_1, BUCKET_3);
    let updated = svc.update(caller, changed.clone()).await.unwrap();
    assert_eq!(updated, changed);
    assert_eq!(
        svc.find_by_id(caller, ORG_1, updated.id).await.unwrap(),
        changed
    );

    let by_db = |database: &str| DbrpMappingFilter {
        org_id: Some(ORG_1),
        database: Some(database.to_string()),
        ..Default::default()
    };
    let (old, _) = svc
        .find_many(caller, &by_db("database1"), &FindOptions::default())
        .await
        .unwrap();
    assert_eq!(old, vec![other.clone()]);
    let (new, _) = svc
        .find_many(caller, &by_db("database9"), &FindOptions::default())
        .await
        .unwrap();
    assert_eq!(new, vec![changed.clone()]);

    let err = svc
        .update(
            caller,
            dbrp(999, "database1", "retention_policy1", false, ORG_1, BUCKET_1),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound, "{err}");

    // the organization cannot be changed
    let err = svc
        .update(
            caller,
            dbrp(100, "database9", "retention_policy9", true, ORG_3, BUCKET_A),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invalid, "{err}");

    // nor can the mapping point at a bucket that does not exist
    let err = svc
        .update(
            caller,
            dbrp(100, "database9", "retention_policy9", true, ORG_1, BUCKET_2),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invalid, "{err}");

    let err = svc
        .update(
            caller,
            dbrp(100, "", "retention_policy9", true, ORG_1, BUCKET_1),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invalid, "{err}");

    // failed updates changed nothing
    assert_eq!(find_all(svc, caller).await, vec![other, changed]);
}

async fn test_delete(svc: &dyn DbrpMappingService, caller: &Caller) {
    let first = dbrp(100, "database1", "retention_policy1", false, ORG_1, BUCKET_1);
    let second = dbrp(200, "database2", "retention_policy2", true, ORG_2, BUCKET_2);
    populate(svc, caller, &[first.clone(), second.clone()]).await;

    svc.delete(caller, ORG_1, first.id).await.unwrap();
    let err = svc.find_by_id(caller, ORG_1, first.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound, "{err}");
    assert_eq!(find_all(svc, caller).await, vec![second.clone()]);

    let err = svc
        .delete(caller, ORG_1, DbrpId::new(300))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound, "{err}");

    // deleting through the wrong organization is not possible
    let err = svc.delete(caller, ORG_1, second.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound, "{err}");

    let err = svc
        .delete(caller, OrgId::INVALID, second.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invalid, "{err}");

    // deleting twice fails the second time
    let err = svc.delete(caller, ORG_1, first.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound, "{err}");

    assert_eq!(find_all(svc, caller).await, vec![second]);
}
