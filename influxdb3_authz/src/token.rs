use std::collections::HashMap;

use async_trait::async_trait;
use observability_deps::tracing::debug;
use parking_lot::RwLock;

use super::{Authorizer, Caller, Error, Permission};

/// Authorizer backed by an in-memory table of tokens and the permissions
/// granted to each.
#[derive(Debug, Default)]
pub struct TokenAuthorizer {
    grants: RwLock<HashMap<Vec<u8>, Vec<Permission>>>,
}

impl TokenAuthorizer {
    /// An authorizer that knows no tokens.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `perms` to the grants held by `token`.
    pub fn grant(&self, token: impl Into<Vec<u8>>, perms: impl IntoIterator<Item = Permission>) {
        self.grants
            .write()
            .entry(token.into())
            .or_default()
            .extend(perms);
    }

    /// Forget `token`, returning whether it was known.
    pub fn revoke(&self, token: &[u8]) -> bool {
        self.grants.write().remove(token).is_some()
    }
}

#[async_trait]
impl Authorizer for TokenAuthorizer {
    async fn permissions(
        &self,
        caller: &Caller,
        requested: &[Permission],
    ) -> Result<Vec<Permission>, Error> {
        let token = caller.token().ok_or(Error::NoToken)?;

        let held: Vec<Permission> = {
            let grants = self.grants.read();
            let granted = grants.get(token).ok_or(Error::InvalidToken)?;
            requested
                .iter()
                .filter(|want| granted.iter().any(|g| g.covers(want)))
                .copied()
                .collect()
        };

        if held.is_empty() && !requested.is_empty() {
            debug!(?requested, "token holds none of the requested permissions");
            return Err(Error::Forbidden);
        }
        Ok(held)
    }
}
