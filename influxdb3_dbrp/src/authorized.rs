//! Permission checks in front of a [`DbrpMappingService`].

use std::sync::Arc;

use async_trait::async_trait;
use influxdb3_authz::{Action, Authorizer, Caller, Permission, Resource};
use influxdb3_id::{DbrpId, OrgId};
use observability_deps::tracing::warn;

use crate::{DbrpMapping, DbrpMappingFilter, DbrpMappingService, Error, FindOptions, Result};

/// Wraps a [`DbrpMappingService`], requiring the [`Caller`] of each operation
/// to hold the matching [`Permission`] before the call is forwarded.
///
/// | operation    | resource                      | action   |
/// |--------------|-------------------------------|----------|
/// | `find_by_id` | the mapping                   | `Read`   |
/// | `find_many`  | the filter's org, or all orgs | `Read`   |
/// | `create`     | the mapping's org             | `Create` |
/// | `update`     | the mapping                   | `Write`  |
/// | `delete`     | the mapping                   | `Write`  |
///
/// A denied request never reaches the inner service.
#[derive(Debug)]
pub struct AuthorizedDbrpService<T> {
    inner: T,
    authz: Arc<dyn Authorizer>,
}

impl<T> AuthorizedDbrpService<T> {
    pub fn new(inner: T, authz: Arc<dyn Authorizer>) -> Self {
        Self { inner, authz }
    }

    async fn check(&self, caller: &Caller, resource: Resource, action: Action) -> Result<()> {
        self.authz
            .authorize(caller, Permission::ResourceAction(resource, action))
            .await
            .map_err(|source| {
                warn!(?resource, ?action, error = %source, "DBRP operation not authorized");
                Error::Unauthorized { source }
            })
    }
}

#[async_trait]
impl<T> DbrpMappingService for AuthorizedDbrpService<T>
where
    T: DbrpMappingService,
{
    async fn find_by_id(&self, caller: &Caller, org_id: OrgId, id: DbrpId) -> Result<DbrpMapping> {
        self.check(caller, Resource::dbrp(org_id, id), Action::Read)
            .await?;
        self.inner.find_by_id(caller, org_id, id).await
    }

    async fn find_many(
        &self,
        caller: &Caller,
        filter: &DbrpMappingFilter,
        opts: &FindOptions,
    ) -> Result<(Vec<DbrpMapping>, usize)> {
        let resource = match filter.org_id {
            Some(org_id) => Resource::org_dbrps(org_id),
            None => Resource::all_dbrps(),
        };
        self.check(caller, resource, Action::Read).await?;
        self.inner.find_many(caller, filter, opts).await
    }

    async fn create(&self, caller: &Caller, mapping: DbrpMapping) -> Result<DbrpMapping> {
        self.check(caller, Resource::org_dbrps(mapping.org_id), Action::Create)
            .await?;
        self.inner.create(caller, mapping).await
    }

    async fn update(&self, caller: &Caller, mapping: DbrpMapping) -> Result<DbrpMapping> {
        self.check(
            caller,
            Resource::dbrp(mapping.org_id, mapping.id),
            Action::Write,
        )
        .await?;
        self.inner.update(caller, mapping).await
    }

    async fn delete(&self, caller: &Caller, org_id: OrgId, id: DbrpId) -> Result<()> {
        self.check(caller, Resource::dbrp(org_id, id), Action::Write)
            .await?;
        self.inner.delete(caller, org_id, id).await
    }
}
