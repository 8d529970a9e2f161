use thiserror::Error;

use benchledger_core::{DomainError, UserId};

use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// Pending or rejected accounts cannot act.
    #[error("account is not active")]
    Inactive,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),

    /// A non-superuser touched a job assigned to someone else (or to nobody).
    #[error("not assigned to this job")]
    NotAssigned,
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Inactive | AuthzError::Forbidden(_) => DomainError::Unauthorized,
            AuthzError::NotAssigned => DomainError::NotAssigned,
        }
    }
}

/// Authorize a principal for one permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if !principal.is_active() {
        return Err(AuthzError::Inactive);
    }

    let granted = principal.role.permissions();
    if granted
        .iter()
        .any(|p| p.is_wildcard() || p.as_str() == required.as_str())
    {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Authorize a change to a maintenance job.
///
/// Holders of `maintenance.transition.any` may act on every job; everyone else
/// needs `maintenance.transition` and must be the job's assignee.
pub fn authorize_job_actor(
    principal: &Principal,
    assigned_user: Option<UserId>,
) -> Result<(), AuthzError> {
    if authorize(principal, &Permission::MAINTENANCE_TRANSITION_ANY).is_ok() {
        return Ok(());
    }
    authorize(principal, &Permission::MAINTENANCE_TRANSITION)?;

    if assigned_user == Some(principal.user_id) {
        Ok(())
    } else {
        Err(AuthzError::NotAssigned)
    }
}
