//! Infrastructure layer: stores, services, notification inbox, config.
//!
//! Domain crates decide; this crate makes those decisions durable. Every core
//! operation lives on [`services::Services`] and runs in one store
//! transaction.

pub mod config;
pub mod error;
pub mod notifications;
pub mod services;
pub mod store;

pub use config::AppConfig;
pub use error::{ServiceError, ServiceResult, StoreError, StoreResult};
pub use notifications::{Notification, NotificationInbox};
pub use services::{
    DashboardStats, InvoiceCreated, LowStockItem, NotificationEnvelope, Services, StockApplied,
    TransitionJob,
};
pub use store::{InMemoryStore, PostgresStore, Store, StoreTx};
