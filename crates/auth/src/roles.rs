use serde::{Deserialize, Serialize};

use crate::Permission;

/// Role used for RBAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Administrator: full access, sees every job, owns KPIs and approvals.
    Superuser,
    /// Technician / front-desk user.
    User,
}

const USER_PERMISSIONS: &[Permission] = &[
    Permission::CATALOG_READ,
    Permission::MAINTENANCE_CREATE,
    Permission::MAINTENANCE_TRANSITION,
    Permission::INVOICE_CREATE,
    Permission::INVOICE_READ,
    Permission::PARTIES_READ,
    Permission::CUSTOMERS_WRITE,
    Permission::DASHBOARD_READ,
];

const SUPERUSER_PERMISSIONS: &[Permission] = &[Permission::WILDCARD];

impl Role {
    /// Permissions granted by this role.
    pub fn permissions(self) -> &'static [Permission] {
        match self {
            Role::Superuser => SUPERUSER_PERMISSIONS,
            Role::User => USER_PERMISSIONS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Superuser => "SUPERUSER",
            Role::User => "USER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SUPERUSER" => Some(Role::Superuser),
            "USER" => Some(Role::User),
            _ => None,
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
