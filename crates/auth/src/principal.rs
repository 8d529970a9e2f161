use serde::{Deserialize, Serialize};

use benchledger_core::{TenantId, UserId};

use crate::{Role, User, UserStatus};

/// A fully resolved caller, handed to every core operation.
///
/// Built by the identity collaborator (or from a stored [`User`]); the core
/// never looks identity up from ambient request state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub role: Role,
    pub status: UserStatus,
}

impl Principal {
    pub fn new(user_id: UserId, tenant_id: TenantId, role: Role, status: UserStatus) -> Self {
        Self {
            user_id,
            tenant_id,
            role,
            status,
        }
    }

    pub fn is_superuser(&self) -> bool {
        self.role == Role::Superuser
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self::new(user.id, user.tenant_id, user.role, user.status)
    }
}
