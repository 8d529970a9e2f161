//! Infrastructure and service-level errors.
//!
//! Store implementations report [`StoreError`]; services return
//! [`ServiceError`], which keeps domain failures intact so callers can match
//! on the [`DomainError`] taxonomy.

use thiserror::Error;

use benchledger_auth::AuthzError;
use benchledger_core::DomainError;

/// Storage failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique key was already taken (SKU, invoice number, email).
    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("database error in {operation}: {message}")]
    Database { operation: String, message: String },

    /// A stored row could not be turned back into a domain record.
    #[error("failed to decode row: {0}")]
    Decode(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Error returned by every core operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AuthzError> for ServiceError {
    fn from(value: AuthzError) -> Self {
        ServiceError::Domain(value.into())
    }
}

impl ServiceError {
    /// The domain error, if this is one.
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            ServiceError::Store(_) => None,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authz_failures_surface_as_domain_errors() {
        let err = ServiceError::from(AuthzError::NotAssigned);
        assert_eq!(err.domain(), Some(&DomainError::NotAssigned));
        assert_eq!(err.to_string(), "You are not assigned to this job");
    }

    #[test]
    fn store_errors_have_no_domain_view() {
        let err = ServiceError::from(StoreError::Decode("bad status".into()));
        assert!(err.domain().is_none());
    }
}
