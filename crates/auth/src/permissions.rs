use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "catalog.write").
/// The wildcard `"*"` grants everything and is held by superusers only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission::from_static("*");

    /// Read the catalog and the stock ledger.
    pub const CATALOG_READ: Permission = Permission::from_static("catalog.read");
    /// Create, update and soft-delete products.
    pub const CATALOG_WRITE: Permission = Permission::from_static("catalog.write");

    /// Intake new maintenance jobs.
    pub const MAINTENANCE_CREATE: Permission = Permission::from_static("maintenance.create");
    /// Move jobs the caller is assigned to through the workflow.
    pub const MAINTENANCE_TRANSITION: Permission = Permission::from_static("maintenance.transition");
    /// Move any job regardless of assignment.
    pub const MAINTENANCE_TRANSITION_ANY: Permission =
        Permission::from_static("maintenance.transition.any");
    /// Assign jobs and set service fees.
    pub const MAINTENANCE_ADMIN: Permission = Permission::from_static("maintenance.admin");

    pub const INVOICE_CREATE: Permission = Permission::from_static("invoice.create");
    pub const INVOICE_READ: Permission = Permission::from_static("invoice.read");

    /// Read customers and suppliers.
    pub const PARTIES_READ: Permission = Permission::from_static("parties.read");
    pub const CUSTOMERS_WRITE: Permission = Permission::from_static("customers.write");
    pub const SUPPLIERS_WRITE: Permission = Permission::from_static("suppliers.write");

    pub const DASHBOARD_READ: Permission = Permission::from_static("dashboard.read");
    pub const KPI_READ: Permission = Permission::from_static("kpi.read");
    /// Approve, reject and re-role accounts.
    pub const USERS_APPROVE: Permission = Permission::from_static("users.approve");
    /// Send a free-text notification to any user.
    pub const MESSAGE_SEND: Permission = Permission::from_static("message.send");

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
