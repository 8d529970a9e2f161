//! Transactional persistence seam.
//!
//! Every core operation runs inside exactly one [`StoreTx`]. A transaction
//! that is dropped without [`StoreTx::commit`] leaves no trace.

mod in_memory;
mod postgres;

pub use in_memory::{InMemoryStore, InMemoryTx};
pub use postgres::{PostgresStore, PostgresTx};

use async_trait::async_trait;

use benchledger_auth::User;
use benchledger_core::{CustomerId, InvoiceId, JobId, ProductId, SupplierId, TenantId, UserId};
use benchledger_inventory::{Product, StockMovement};
use benchledger_invoicing::{Invoice, InvoiceKind};
use benchledger_maintenance::MaintenanceJob;
use benchledger_parties::{Customer, Supplier};

use crate::error::StoreResult;

/// A store that hands out transactions.
#[async_trait]
pub trait Store: Send + Sync {
    type Tx: StoreTx;

    async fn begin(&self) -> StoreResult<Self::Tx>;
}

/// One open transaction. Reads ending in `_for_update` lock the row until the
/// transaction ends. All reads are tenant-scoped.
#[async_trait]
pub trait StoreTx: Send {
    // Catalog & ledger
    async fn product_for_update(
        &mut self,
        tenant_id: TenantId,
        id: ProductId,
    ) -> StoreResult<Option<Product>>;
    async fn product_by_sku(&mut self, tenant_id: TenantId, sku: &str)
    -> StoreResult<Option<Product>>;
    /// Fails with `Duplicate` when the SKU is taken within the tenant.
    async fn insert_product(&mut self, product: &Product) -> StoreResult<()>;
    async fn update_product(&mut self, product: &Product) -> StoreResult<()>;
    async fn list_products(&mut self, tenant_id: TenantId) -> StoreResult<Vec<Product>>;
    async fn insert_movement(&mut self, movement: &StockMovement) -> StoreResult<()>;
    /// Ledger rows for one product, in insertion order.
    async fn movements_for_product(
        &mut self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> StoreResult<Vec<StockMovement>>;
    /// The tenant's newest ledger rows, newest first.
    async fn recent_movements(
        &mut self,
        tenant_id: TenantId,
        limit: usize,
    ) -> StoreResult<Vec<StockMovement>>;

    // Maintenance
    async fn job_for_update(
        &mut self,
        tenant_id: TenantId,
        id: JobId,
    ) -> StoreResult<Option<MaintenanceJob>>;
    async fn job(&mut self, tenant_id: TenantId, id: JobId) -> StoreResult<Option<MaintenanceJob>>;
    async fn insert_job(&mut self, job: &MaintenanceJob) -> StoreResult<()>;
    async fn update_job(&mut self, job: &MaintenanceJob) -> StoreResult<()>;
    async fn list_jobs(&mut self, tenant_id: TenantId) -> StoreResult<Vec<MaintenanceJob>>;

    // Invoicing
    /// Atomically bump and return the tenant's counter for `kind` (first call returns 1).
    async fn next_invoice_sequence(
        &mut self,
        tenant_id: TenantId,
        kind: InvoiceKind,
    ) -> StoreResult<u64>;
    /// Fails with `Duplicate` when the number is taken within the tenant.
    async fn insert_invoice(&mut self, invoice: &Invoice) -> StoreResult<()>;
    async fn invoice(&mut self, tenant_id: TenantId, id: InvoiceId) -> StoreResult<Option<Invoice>>;
    async fn list_invoices(&mut self, tenant_id: TenantId) -> StoreResult<Vec<Invoice>>;

    // Parties
    async fn insert_customer(&mut self, customer: &Customer) -> StoreResult<()>;
    async fn customer(&mut self, tenant_id: TenantId, id: CustomerId)
    -> StoreResult<Option<Customer>>;
    async fn list_customers(&mut self, tenant_id: TenantId) -> StoreResult<Vec<Customer>>;
    async fn insert_supplier(&mut self, supplier: &Supplier) -> StoreResult<()>;
    async fn supplier(&mut self, tenant_id: TenantId, id: SupplierId)
    -> StoreResult<Option<Supplier>>;
    async fn list_suppliers(&mut self, tenant_id: TenantId) -> StoreResult<Vec<Supplier>>;

    // Users
    async fn user_for_update(&mut self, tenant_id: TenantId, id: UserId)
    -> StoreResult<Option<User>>;
    /// Fails with `Duplicate` when the email is taken within the tenant.
    async fn insert_user(&mut self, user: &User) -> StoreResult<()>;
    async fn update_user(&mut self, user: &User) -> StoreResult<()>;
    async fn list_users(&mut self, tenant_id: TenantId) -> StoreResult<Vec<User>>;

    async fn commit(self) -> StoreResult<()>;
    async fn rollback(self) -> StoreResult<()>;
}
