use influxdb3_id::{DbrpId, OrgId};

/// What a caller wants to do with a [`Resource`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Add a new mapping.
    Create,
    /// Look mappings up.
    Read,
    /// Change or remove an existing mapping.
    Write,
}

/// The mappings a permission applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resource {
    /// DBRP mappings. An unset organization means every organization, an
    /// unset id means every mapping within the organization.
    Dbrp {
        /// Owning organization.
        org_id: Option<OrgId>,
        /// A single mapping.
        id: Option<DbrpId>,
    },
}

impl Resource {
    /// Every DBRP mapping in every organization.
    pub fn all_dbrps() -> Self {
        Self::Dbrp {
            org_id: None,
            id: None,
        }
    }

    /// Every DBRP mapping owned by `org_id`.
    pub fn org_dbrps(org_id: OrgId) -> Self {
        Self::Dbrp {
            org_id: Some(org_id),
            id: None,
        }
    }

    /// The single mapping `id` owned by `org_id`.
    pub fn dbrp(org_id: OrgId, id: DbrpId) -> Self {
        Self::Dbrp {
            org_id: Some(org_id),
            id: Some(id),
        }
    }

    fn covers(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Dbrp { org_id, id },
                Self::Dbrp {
                    org_id: want_org,
                    id: want_id,
                },
            ) => scope_covers(org_id, want_org) && scope_covers(id, want_id),
        }
    }
}

/// A granted scope covers a requested one when it is unset (wildcard) or
/// names the same value. A wildcard request is only covered by a wildcard.
fn scope_covers<T: PartialEq>(granted: &Option<T>, requested: &Option<T>) -> bool {
    match (granted, requested) {
        (None, _) => true,
        (Some(g), Some(r)) => g == r,
        (Some(_), None) => false,
    }
}

/// Something a caller may be allowed to do, checked by an
/// [`Authorizer`](crate::Authorizer).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Permission {
    /// `Action` on `Resource`.
    ResourceAction(Resource, Action),
}

impl Permission {
    /// Whether holding `self` allows the operation described by `requested`.
    pub fn covers(&self, requested: &Self) -> bool {
        match (self, requested) {
            (Self::ResourceAction(r, a), Self::ResourceAction(want_r, want_a)) => {
                a == want_a && r.covers(want_r)
            }
        }
    }
}
