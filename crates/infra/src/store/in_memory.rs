use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use benchledger_auth::User;
use benchledger_core::{
    CustomerId, Entity, InvoiceId, JobId, ProductId, SupplierId, TenantId, UserId,
};
use benchledger_inventory::{Product, StockMovement};
use benchledger_invoicing::{Invoice, InvoiceKind};
use benchledger_maintenance::MaintenanceJob;
use benchledger_parties::{Customer, Supplier};

use super::{Store, StoreTx};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Default)]
struct Tables {
    products: HashMap<(TenantId, ProductId), Product>,
    movements: Vec<StockMovement>,
    jobs: HashMap<(TenantId, JobId), MaintenanceJob>,
    invoices: HashMap<(TenantId, InvoiceId), Invoice>,
    invoice_numbers: HashSet<(TenantId, String)>,
    invoice_counters: HashMap<(TenantId, InvoiceKind), u64>,
    users: HashMap<(TenantId, UserId), User>,
    customers: HashMap<(TenantId, CustomerId), Customer>,
    suppliers: HashMap<(TenantId, SupplierId), Supplier>,
}

/// In-memory store.
///
/// Intended for tests/dev. One transaction at a time: `begin` waits for the
/// previous transaction to finish, and writes land in a working copy that
/// replaces the tables on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug)]
pub struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> StoreResult<InMemoryTx> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTx { guard, working })
    }
}

fn tenant_rows<'a, K, V>(
    map: &'a HashMap<(TenantId, K), V>,
    tenant_id: TenantId,
) -> impl Iterator<Item = &'a V> + 'a
where
    K: 'a,
{
    map.iter()
        .filter(move |((t, _), _)| *t == tenant_id)
        .map(|(_, v)| v)
}

fn require_existing<K: std::hash::Hash + Eq, V>(
    map: &mut HashMap<K, V>,
    key: K,
    value: V,
    what: &str,
) -> StoreResult<()> {
    match map.get_mut(&key) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(StoreError::Database {
            operation: format!("update_{what}"),
            message: format!("{what} row does not exist"),
        }),
    }
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn product_for_update(
        &mut self,
        tenant_id: TenantId,
        id: ProductId,
    ) -> StoreResult<Option<Product>> {
        Ok(self.working.products.get(&(tenant_id, id)).cloned())
    }

    async fn product_by_sku(
        &mut self,
        tenant_id: TenantId,
        sku: &str,
    ) -> StoreResult<Option<Product>> {
        Ok(tenant_rows(&self.working.products, tenant_id)
            .find(|p| p.sku == sku)
            .cloned())
    }

    async fn insert_product(&mut self, product: &Product) -> StoreResult<()> {
        let taken = tenant_rows(&self.working.products, product.tenant_id)
            .any(|p| p.sku == product.sku || p.id == product.id);
        if taken {
            return Err(StoreError::Duplicate(format!("product sku '{}'", product.sku)));
        }
        self.working.products.insert(product.key(), product.clone());
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> StoreResult<()> {
        let taken = tenant_rows(&self.working.products, product.tenant_id)
            .any(|p| p.sku == product.sku && p.id != product.id);
        if taken {
            return Err(StoreError::Duplicate(format!("product sku '{}'", product.sku)));
        }
        require_existing(&mut self.working.products, product.key(), product.clone(), "product")
    }

    async fn list_products(&mut self, tenant_id: TenantId) -> StoreResult<Vec<Product>> {
        Ok(tenant_rows(&self.working.products, tenant_id).cloned().collect())
    }

    async fn insert_movement(&mut self, movement: &StockMovement) -> StoreResult<()> {
        self.working.movements.push(movement.clone());
        Ok(())
    }

    async fn movements_for_product(
        &mut self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> StoreResult<Vec<StockMovement>> {
        Ok(self
            .working
            .movements
            .iter()
            .filter(|m| m.belongs_to(tenant_id) && m.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn recent_movements(
        &mut self,
        tenant_id: TenantId,
        limit: usize,
    ) -> StoreResult<Vec<StockMovement>> {
        Ok(self
            .working
            .movements
            .iter()
            .rev()
            .filter(|m| m.belongs_to(tenant_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn job_for_update(
        &mut self,
        tenant_id: TenantId,
        id: JobId,
    ) -> StoreResult<Option<MaintenanceJob>> {
        self.job(tenant_id, id).await
    }

    async fn job(&mut self, tenant_id: TenantId, id: JobId) -> StoreResult<Option<MaintenanceJob>> {
        Ok(self.working.jobs.get(&(tenant_id, id)).cloned())
    }

    async fn insert_job(&mut self, job: &MaintenanceJob) -> StoreResult<()> {
        let key = job.key();
        if self.working.jobs.contains_key(&key) {
            return Err(StoreError::Duplicate(format!("job {}", job.id)));
        }
        self.working.jobs.insert(key, job.clone());
        Ok(())
    }

    async fn update_job(&mut self, job: &MaintenanceJob) -> StoreResult<()> {
        require_existing(&mut self.working.jobs, job.key(), job.clone(), "job")
    }

    async fn list_jobs(&mut self, tenant_id: TenantId) -> StoreResult<Vec<MaintenanceJob>> {
        Ok(tenant_rows(&self.working.jobs, tenant_id).cloned().collect())
    }

    async fn next_invoice_sequence(
        &mut self,
        tenant_id: TenantId,
        kind: InvoiceKind,
    ) -> StoreResult<u64> {
        let counter = self
            .working
            .invoice_counters
            .entry((tenant_id, kind))
            .or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> StoreResult<()> {
        let number_key = (invoice.tenant_id, invoice.number.clone());
        if self.working.invoice_numbers.contains(&number_key) {
            return Err(StoreError::Duplicate(format!("invoice number '{}'", invoice.number)));
        }
        self.working.invoice_numbers.insert(number_key);
        self.working.invoices.insert(invoice.key(), invoice.clone());
        Ok(())
    }

    async fn invoice(&mut self, tenant_id: TenantId, id: InvoiceId) -> StoreResult<Option<Invoice>> {
        Ok(self.working.invoices.get(&(tenant_id, id)).cloned())
    }

    async fn list_invoices(&mut self, tenant_id: TenantId) -> StoreResult<Vec<Invoice>> {
        Ok(tenant_rows(&self.working.invoices, tenant_id).cloned().collect())
    }

    async fn insert_customer(&mut self, customer: &Customer) -> StoreResult<()> {
        let key = customer.key();
        if self.working.customers.contains_key(&key) {
            return Err(StoreError::Duplicate(format!("customer {}", customer.id)));
        }
        self.working.customers.insert(key, customer.clone());
        Ok(())
    }

    async fn customer(
        &mut self,
        tenant_id: TenantId,
        id: CustomerId,
    ) -> StoreResult<Option<Customer>> {
        Ok(self.working.customers.get(&(tenant_id, id)).cloned())
    }

    async fn list_customers(&mut self, tenant_id: TenantId) -> StoreResult<Vec<Customer>> {
        Ok(tenant_rows(&self.working.customers, tenant_id).cloned().collect())
    }

    async fn insert_supplier(&mut self, supplier: &Supplier) -> StoreResult<()> {
        let key = supplier.key();
        if self.working.suppliers.contains_key(&key) {
            return Err(StoreError::Duplicate(format!("supplier {}", supplier.id)));
        }
        self.working.suppliers.insert(key, supplier.clone());
        Ok(())
    }

    async fn supplier(
        &mut self,
        tenant_id: TenantId,
        id: SupplierId,
    ) -> StoreResult<Option<Supplier>> {
        Ok(self.working.suppliers.get(&(tenant_id, id)).cloned())
    }

    async fn list_suppliers(&mut self, tenant_id: TenantId) -> StoreResult<Vec<Supplier>> {
        Ok(tenant_rows(&self.working.suppliers, tenant_id).cloned().collect())
    }

    async fn user_for_update(&mut self, tenant_id: TenantId, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.working.users.get(&(tenant_id, id)).cloned())
    }

    async fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        let taken = tenant_rows(&self.working.users, user.tenant_id)
            .any(|u| u.email == user.email || u.id == user.id);
        if taken {
            return Err(StoreError::Duplicate(format!("user email '{}'", user.email)));
        }
        self.working.users.insert(user.key(), user.clone());
        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> StoreResult<()> {
        require_existing(&mut self.working.users, user.key(), user.clone(), "user")
    }

    async fn list_users(&mut self, tenant_id: TenantId) -> StoreResult<Vec<User>> {
        Ok(tenant_rows(&self.working.users, tenant_id).cloned().collect())
    }

    async fn commit(self) -> StoreResult<()> {
        let InMemoryTx { mut guard, working } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        Ok(())
    }
}
