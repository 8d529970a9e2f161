//! Maintenance (repair job) workflow, implemented as pure domain logic.
//!
//! The job status is stored explicitly and every change goes through the
//! transition table in [`status`]. Transitions that touch inventory describe
//! the ledger call they need as a [`StockEffect`]; executing it is the
//! caller's job, inside the same transaction as the job update.

pub mod job;
pub mod status;

pub use job::{
    Handler, HandlerKind, JobParts, MaintenanceJob, NewJob, ProductInfo, StockEffect, Transition,
};
pub use status::JobStatus;
