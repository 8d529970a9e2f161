use chrono::{DateTime, Utc};
use tracing::instrument;

use benchledger_auth::{Permission, Principal, authorize};
use benchledger_core::{CustomerId, DomainError, SupplierId, TenantId};
use benchledger_events::EventBus;
use benchledger_parties::{Customer, NewParty, Supplier};

use super::{NotificationEnvelope, Services};
use crate::error::ServiceResult;
use crate::store::{Store, StoreTx};

/// Fails with a `customer_id` field error unless the customer exists in the tenant.
pub(super) async fn ensure_customer<T: StoreTx>(
    tx: &mut T,
    tenant_id: TenantId,
    customer_id: CustomerId,
) -> ServiceResult<()> {
    match tx.customer(tenant_id, customer_id).await? {
        Some(_) => Ok(()),
        None => Err(DomainError::validation("customer_id", "Customer not found").into()),
    }
}

/// Fails with a `supplier_id` field error unless the supplier exists in the tenant.
pub(super) async fn ensure_supplier<T: StoreTx>(
    tx: &mut T,
    tenant_id: TenantId,
    supplier_id: SupplierId,
) -> ServiceResult<()> {
    match tx.supplier(tenant_id, supplier_id).await? {
        Some(_) => Ok(()),
        None => Err(DomainError::validation("supplier_id", "Supplier not found").into()),
    }
}

impl<S, B> Services<S, B>
where
    S: Store,
    B: EventBus<NotificationEnvelope>,
{
    #[instrument(skip(self, principal, input), fields(tenant_id = %principal.tenant_id), err)]
    pub async fn create_customer(
        &self,
        principal: &Principal,
        input: NewParty,
        occurred_at: DateTime<Utc>,
    ) -> ServiceResult<Customer> {
        authorize(principal, &Permission::CUSTOMERS_WRITE)?;
        let customer =
            Customer::create(principal.tenant_id, CustomerId::new(), &input, occurred_at)?;

        let mut tx = self.store().begin().await?;
        tx.insert_customer(&customer).await?;
        tx.commit().await?;

        tracing::info!(customer_id = %customer.id, "customer created");
        Ok(customer)
    }

    /// Customers sorted by name.
    pub async fn list_customers(&self, principal: &Principal) -> ServiceResult<Vec<Customer>> {
        authorize(principal, &Permission::PARTIES_READ)?;

        let mut tx = self.store().begin().await?;
        let mut customers = tx.list_customers(principal.tenant_id).await?;
        tx.rollback().await?;

        customers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(customers)
    }

    #[instrument(skip(self, principal, input), fields(tenant_id = %principal.tenant_id), err)]
    pub async fn create_supplier(
        &self,
        principal: &Principal,
        input: NewParty,
        occurred_at: DateTime<Utc>,
    ) -> ServiceResult<Supplier> {
        authorize(principal, &Permission::SUPPLIERS_WRITE)?;
        let supplier =
            Supplier::create(principal.tenant_id, SupplierId::new(), &input, occurred_at)?;

        let mut tx = self.store().begin().await?;
        tx.insert_supplier(&supplier).await?;
        tx.commit().await?;

        tracing::info!(supplier_id = %supplier.id, "supplier created");
        Ok(supplier)
    }

    /// Suppliers sorted by name.
    pub async fn list_suppliers(&self, principal: &Principal) -> ServiceResult<Vec<Supplier>> {
        authorize(principal, &Permission::PARTIES_READ)?;

        let mut tx = self.store().begin().await?;
        let mut suppliers = tx.list_suppliers(principal.tenant_id).await?;
        tx.rollback().await?;

        suppliers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(suppliers)
    }
}
