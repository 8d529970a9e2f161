//! `benchledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the entity marker and the error taxonomy shared by every
//! workflow crate.

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult, ValidationErrors};
pub use id::{
    CustomerId, InvoiceId, JobId, MovementId, NotificationId, ProductId, SupplierId, TenantId,
    UserId,
};
