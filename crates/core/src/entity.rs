//! Entity trait: identity + continuity across state changes.

use crate::id::TenantId;

/// Entity marker + minimal interface.
///
/// Every persisted record in this system belongs to exactly one tenant, so the
/// tenant boundary is part of the contract.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Returns the tenant owning this entity.
    fn tenant_id(&self) -> TenantId;

    fn belongs_to(&self, tenant_id: TenantId) -> bool {
        self.tenant_id() == tenant_id
    }

    /// Tenant-qualified key, as used by stores.
    fn key(&self) -> (TenantId, Self::Id) {
        (self.tenant_id(), self.id().clone())
    }
}
