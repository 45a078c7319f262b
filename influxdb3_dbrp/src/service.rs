//! The DBRP mapping business logic.

use std::{num::NonZeroUsize, sync::Arc};

use async_trait::async_trait;
use influxdb3_authz::Caller;
use influxdb3_id::{BucketId, DbrpId, IdGenerator, OrgId};
use influxdb3_kv::KvStore;
use observability_deps::tracing::{debug, info, warn};

use crate::{
    BucketLookup, DbrpConfig, DbrpMapping, DbrpMappingFilter, DbrpMappingService, Error,
    FindOptions, Result,
    store::{MappingStore, Outcome, Scope},
};

/// Validates requests and keeps mappings consistent on top of a
/// [`MappingStore`].
///
/// Caller identity is not inspected here; wrap the service in an
/// [`AuthorizedDbrpService`](crate::AuthorizedDbrpService) for that.
#[derive(Debug)]
pub struct DbrpService {
    store: MappingStore,
    buckets: Arc<dyn BucketLookup>,
    ids: Arc<dyn IdGenerator>,
    max_id_generation_attempts: NonZeroUsize,
}

impl DbrpService {
    pub fn new(
        kv: Arc<dyn KvStore>,
        buckets: Arc<dyn BucketLookup>,
        ids: Arc<dyn IdGenerator>,
        config: DbrpConfig,
    ) -> Self {
        Self {
            store: MappingStore::new(kv),
            buckets,
            ids,
            max_id_generation_attempts: config.max_id_generation_attempts,
        }
    }

    /// Draw ids until one is found that is not in use, counting every draw
    /// against the shared `attempts` budget.
    async fn generate_id(&self, attempts: &mut usize) -> Result<DbrpId> {
        while *attempts < self.max_id_generation_attempts.get() {
            *attempts += 1;
            let id = DbrpId::new(self.ids.next_id());
            if !id.is_valid() {
                continue;
            }
            match self
                .store
                .get(id)
                .await
                .map_err(Error::internal("create", id))?
            {
                None => return Ok(id),
                Some(_) => warn!(%id, attempt = *attempts, "generated DBRP id already in use"),
            }
        }
        Err(Error::GenerationExhausted {
            attempts: *attempts,
        })
    }

    async fn check_bucket(&self, org_id: OrgId, bucket_id: BucketId) -> Result<()> {
        if self.buckets.exists(org_id, bucket_id).await {
            Ok(())
        } else {
            Err(Error::invalid(format!(
                "bucket {bucket_id} not found in organization {org_id}"
            )))
        }
    }

    /// Fetch `id`, hiding mappings owned by other organizations.
    async fn get_owned(&self, org_id: OrgId, id: DbrpId) -> Result<DbrpMapping> {
        check_ids(org_id, id)?;
        match self.store.get(id).await.map_err(Error::internal("find", id))? {
            Some(m) if m.org_id == org_id => Ok(m),
            _ => Err(Error::NotFound { id }),
        }
    }
}

fn check_ids(org_id: OrgId, id: DbrpId) -> Result<()> {
    if !org_id.is_valid() {
        return Err(Error::invalid("organization id must be set"));
    }
    if !id.is_valid() {
        return Err(Error::invalid("id must be set"));
    }
    Ok(())
}

fn not_owned(org_id: OrgId, id: DbrpId) -> Error {
    Error::invalid(format!("organization {org_id} does not own DBRP {id}"))
}

#[async_trait]
impl DbrpMappingService for DbrpService {
    async fn find_by_id(&self, _caller: &Caller, org_id: OrgId, id: DbrpId) -> Result<DbrpMapping> {
        debug!(%org_id, %id, "finding DBRP mapping");
        self.get_owned(org_id, id).await
    }

    async fn find_many(
        &self,
        _caller: &Caller,
        filter: &DbrpMappingFilter,
        opts: &FindOptions,
    ) -> Result<(Vec<DbrpMapping>, usize)> {
        let candidates = match filter.id {
            Some(id) => self
                .store
                .get(id)
                .await
                .map_err(Error::internal("find", id))?
                .into_iter()
                .collect(),
            None => {
                let scope = match (filter.org_id, filter.database.as_deref()) {
                    (Some(org_id), Some(database)) => Scope::Database(org_id, database),
                    (Some(org_id), None) => Scope::Org(org_id),
                    (None, _) => Scope::All,
                };
                debug!(?scope, "scanning DBRP mappings");
                self.store
                    .scan(scope)
                    .await
                    .map_err(|source| Error::Internal {
                        op: "find",
                        target: "DBRP mappings".to_string(),
                        source,
                    })?
            }
        };

        let mut found: Vec<_> = candidates
            .into_iter()
            .filter(|m| filter.matches(m))
            .collect();
        let total = found.len();

        if opts.descending {
            found.reverse();
        }
        let page = found
            .into_iter()
            .skip(opts.offset)
            .take(opts.limit.unwrap_or(usize::MAX))
            .collect();

        Ok((page, total))
    }

    async fn create(&self, _caller: &Caller, mut mapping: DbrpMapping) -> Result<DbrpMapping> {
        mapping.validate()?;

        let generated = !mapping.id.is_valid();
        let mut attempts = 0;
        if generated {
            mapping.id = self.generate_id(&mut attempts).await?;
        }

        self.check_bucket(mapping.org_id, mapping.bucket_id).await?;

        // The existence check in generate_id can race with a concurrent
        // create, so the store only writes if the id is still free.
        while !self
            .store
            .insert(&mapping)
            .await
            .map_err(Error::internal("create", mapping.id))?
        {
            if !generated {
                return Err(Error::AlreadyExists { id: mapping.id });
            }
            warn!(id = %mapping.id, "generated DBRP id claimed concurrently");
            mapping.id = self.generate_id(&mut attempts).await?;
        }

        info!(
            id = %mapping.id,
            org_id = %mapping.org_id,
            bucket_id = %mapping.bucket_id,
            database = %mapping.database,
            retention_policy = %mapping.retention_policy,
            "created DBRP mapping"
        );
        Ok(mapping)
    }

    async fn update(&self, _caller: &Caller, mapping: DbrpMapping) -> Result<DbrpMapping> {
        mapping.validate()?;
        if !mapping.id.is_valid() {
            return Err(Error::invalid("id must be set"));
        }

        let existing = match self
            .store
            .get(mapping.id)
            .await
            .map_err(Error::internal("update", mapping.id))?
        {
            Some(existing) => existing,
            None => return Err(Error::NotFound { id: mapping.id }),
        };
        if existing.org_id != mapping.org_id {
            return Err(not_owned(mapping.org_id, mapping.id));
        }
        if existing.bucket_id != mapping.bucket_id {
            self.check_bucket(existing.org_id, mapping.bucket_id)
                .await?;
        }

        let updated = DbrpMapping {
            id: existing.id,
            org_id: existing.org_id,
            ..mapping
        };
        // The mapping may have been deleted or recreated by another
        // organization since it was read; the store checks again.
        match self
            .store
            .update(&updated)
            .await
            .map_err(Error::internal("update", updated.id))?
        {
            Outcome::Done => {}
            Outcome::Missing => return Err(Error::NotFound { id: updated.id }),
            Outcome::WrongOrg => return Err(not_owned(updated.org_id, updated.id)),
        }

        info!(id = %updated.id, org_id = %updated.org_id, "updated DBRP mapping");
        Ok(updated)
    }

    async fn delete(&self, _caller: &Caller, org_id: OrgId, id: DbrpId) -> Result<()> {
        check_ids(org_id, id)?;

        match self
            .store
            .delete(id, org_id)
            .await
            .map_err(Error::internal("delete", id))?
        {
            Outcome::Done => {}
            // mappings of other organizations are not revealed
            Outcome::Missing | Outcome::WrongOrg => return Err(Error::NotFound { id }),
        }

        info!(%org_id, %id, "deleted DBRP mapping");
        Ok(())
    }
}
