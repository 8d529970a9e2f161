//! User accounts and the approval lifecycle.
//!
//! Registration itself belongs to the identity collaborator; this module owns
//! what the core cares about: role, status, and the superuser approval step
//! (`Pending → Active | Rejected`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use benchledger_core::{DomainError, DomainResult, Entity, TenantId, UserId, ValidationErrors};

use crate::Role;

// ─────────────────────────────────────────────────────────────────────────────
// User Status
// ─────────────────────────────────────────────────────────────────────────────

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    /// Registered, waiting for a superuser decision.
    #[default]
    Pending,
    /// Approved; may act.
    Active,
    /// Turned down; may not act.
    Rejected,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UserStatus::Pending => "PENDING",
            UserStatus::Active => "ACTIVE",
            UserStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(UserStatus::Pending),
            "ACTIVE" => Some(UserStatus::Active),
            "REJECTED" => Some(UserStatus::Rejected),
            _ => None,
        }
    }
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A user account.
///
/// # Invariants
/// - A user belongs to exactly one tenant.
/// - Only pending accounts can be approved or rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub tenant_id: TenantId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a user record in the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
}

impl User {
    /// Validate input and build the record.
    pub fn register(
        tenant_id: TenantId,
        id: UserId,
        input: NewUser,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let mut errors = ValidationErrors::new();
        let email = input.email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            errors.add("email", "Invalid email address");
        }
        let name = input.name.trim().to_string();
        if name.is_empty() {
            errors.add("name", "Name is required");
        }
        errors.into_result()?;

        Ok(Self {
            id,
            tenant_id,
            name,
            email,
            role: input.role,
            status: input.status,
            created_at: occurred_at,
        })
    }

    /// Technicians are the population scored by the KPI report.
    pub fn is_technician(&self) -> bool {
        self.status == UserStatus::Active && self.role == Role::User
    }

    /// Approve a pending account with the given role.
    pub fn approve(&mut self, role: Role) -> DomainResult<()> {
        self.ensure_pending(UserStatus::Active)?;
        self.status = UserStatus::Active;
        self.role = role;
        Ok(())
    }

    /// Change the role of an active account.
    pub fn change_role(&mut self, role: Role) -> DomainResult<()> {
        if self.status != UserStatus::Active {
            return Err(DomainError::conflict(format!(
                "cannot change the role of a {} account",
                self.status
            )));
        }
        self.role = role;
        Ok(())
    }

    /// Reject a pending account.
    pub fn reject(&mut self) -> DomainResult<()> {
        self.ensure_pending(UserStatus::Rejected)?;
        self.status = UserStatus::Rejected;
        Ok(())
    }

    fn ensure_pending(&self, target: UserStatus) -> DomainResult<()> {
        if self.status != UserStatus::Pending {
            return Err(DomainError::invalid_transition(self.status, target));
        }
        Ok(())
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_user() -> User {
        User::register(
            TenantId::new(),
            UserId::new(),
            NewUser {
                name: " Alice Smith ".to_string(),
                email: "Alice@Example.com".to_string(),
                role: Role::User,
                status: UserStatus::Pending,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn register_normalizes_name_and_email() {
        let user = pending_user();
        assert_eq!(user.name, "Alice Smith");
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.status, UserStatus::Pending);
    }

    #[test]
    fn register_rejects_bad_email_and_blank_name() {
        let err = User::register(
            TenantId::new(),
            UserId::new(),
            NewUser {
                name: "  ".to_string(),
                email: "invalid-email".to_string(),
                role: Role::User,
                status: UserStatus::Pending,
            },
            Utc::now(),
        )
        .unwrap_err();

        let DomainError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.field("email").is_some());
        assert!(errors.field("name").is_some());
    }

    #[test]
    fn approve_activates_with_role() {
        let mut user = pending_user();
        user.approve(Role::Superuser).unwrap();
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.role, Role::Superuser);
        assert!(!user.is_technician());
    }

    #[test]
    fn only_pending_accounts_can_be_decided() {
        let mut user = pending_user();
        user.reject().unwrap();
        assert_eq!(user.status, UserStatus::Rejected);

        let err = user.approve(Role::User).unwrap_err();
        assert_eq!(err, DomainError::invalid_transition("REJECTED", "ACTIVE"));
    }

    #[test]
    fn active_user_role_is_a_technician() {
        let mut user = pending_user();
        user.approve(Role::User).unwrap();
        assert!(user.is_technician());
    }

    #[test]
    fn role_changes_need_an_active_account() {
        let mut user = pending_user();
        assert!(matches!(user.change_role(Role::Superuser), Err(DomainError::Conflict(_))));

        user.approve(Role::User).unwrap();
        user.change_role(Role::Superuser).unwrap();
        assert_eq!(user.role, Role::Superuser);
    }
}
