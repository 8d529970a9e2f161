use chrono::{DateTime, Utc};
use tracing::instrument;

use benchledger_auth::{Permission, Principal, authorize};
use benchledger_core::{DomainError, ProductId};
use benchledger_events::EventBus;
use benchledger_inventory::{MovementKind, NewProduct, Product, StockMovement};

use super::{NotificationEnvelope, Services, apply_stock_delta};
use crate::error::{ServiceError, ServiceResult, StoreError};
use crate::store::{Store, StoreTx};

fn duplicate_sku() -> DomainError {
    DomainError::validation("sku", "SKU already exists")
}

impl<S, B> Services<S, B>
where
    S: Store,
    B: EventBus<NotificationEnvelope>,
{
    /// Add a product to the catalog. Opening stock is booked as one
    /// `OPENING-{SKU}` adjustment so the ledger sums to the catalog quantity.
    #[instrument(
        skip(self, principal, input),
        fields(tenant_id = %principal.tenant_id, sku = %input.sku),
        err
    )]
    pub async fn create_product(
        &self,
        principal: &Principal,
        input: NewProduct,
        occurred_at: DateTime<Utc>,
    ) -> ServiceResult<Product> {
        authorize(principal, &Permission::CATALOG_WRITE)?;
        let tenant_id = principal.tenant_id;
        let product = Product::create(tenant_id, ProductId::new(), &input, occurred_at)?;

        let mut tx = self.store().begin().await?;
        if tx.product_by_sku(tenant_id, &product.sku).await?.is_some() {
            return Err(duplicate_sku().into());
        }
        tx.insert_product(&product).await.map_err(|e| match e {
            StoreError::Duplicate(_) => ServiceError::from(duplicate_sku()),
            other => ServiceError::from(other),
        })?;

        if input.quantity > 0 {
            let reference = format!("OPENING-{}", product.sku);
            apply_stock_delta(
                &mut tx,
                tenant_id,
                product.id,
                input.quantity,
                MovementKind::Adjustment,
                &reference,
                occurred_at,
            )
            .await?;
        }

        let stored = tx
            .product_for_update(tenant_id, product.id)
            .await?
            .ok_or(DomainError::NotFound)?;
        tx.commit().await?;

        tracing::info!(product_id = %stored.id, quantity = stored.quantity(), "product created");
        Ok(stored)
    }

    /// Replace a live product's details. A change in quantity is booked as
    /// one `ADJUST-{SKU}` adjustment rather than written directly.
    #[instrument(
        skip(self, principal, input),
        fields(tenant_id = %principal.tenant_id, product_id = %product_id),
        err
    )]
    pub async fn update_product(
        &self,
        principal: &Principal,
        product_id: ProductId,
        input: NewProduct,
        occurred_at: DateTime<Utc>,
    ) -> ServiceResult<Product> {
        authorize(principal, &Permission::CATALOG_WRITE)?;
        let tenant_id = principal.tenant_id;

        let mut tx = self.store().begin().await?;
        let mut product = tx
            .product_for_update(tenant_id, product_id)
            .await?
            .ok_or(DomainError::NotFound)?;
        let delta = product.revise(&input)?;

        if let Some(other) = tx.product_by_sku(tenant_id, &product.sku).await? {
            if other.id != product_id {
                return Err(duplicate_sku().into());
            }
        }
        tx.update_product(&product).await.map_err(|e| match e {
            StoreError::Duplicate(_) => ServiceError::from(duplicate_sku()),
            other => ServiceError::from(other),
        })?;

        if delta != 0 {
            let reference = format!("ADJUST-{}", product.sku);
            apply_stock_delta(
                &mut tx,
                tenant_id,
                product_id,
                delta,
                MovementKind::Adjustment,
                &reference,
                occurred_at,
            )
            .await?;
        }

        let stored = tx
            .product_for_update(tenant_id, product_id)
            .await?
            .ok_or(DomainError::NotFound)?;
        tx.commit().await?;

        tracing::info!(product_id = %stored.id, delta, "product updated");
        Ok(stored)
    }

    #[instrument(skip(self, principal), fields(tenant_id = %principal.tenant_id), err)]
    pub async fn soft_delete_product(
        &self,
        principal: &Principal,
        product_id: ProductId,
        occurred_at: DateTime<Utc>,
    ) -> ServiceResult<()> {
        authorize(principal, &Permission::CATALOG_WRITE)?;

        let mut tx = self.store().begin().await?;
        let mut product = tx
            .product_for_update(principal.tenant_id, product_id)
            .await?
            .ok_or(DomainError::NotFound)?;
        product.soft_delete(occurred_at)?;
        tx.update_product(&product).await?;
        tx.commit().await?;

        tracing::info!(product_id = %product_id, "product deleted");
        Ok(())
    }

    /// Live products sorted by name, optionally only those at or below their
    /// reorder level.
    pub async fn list_products(
        &self,
        principal: &Principal,
        low_stock_only: bool,
    ) -> ServiceResult<Vec<Product>> {
        authorize(principal, &Permission::CATALOG_READ)?;

        let mut tx = self.store().begin().await?;
        let mut products: Vec<Product> = tx
            .list_products(principal.tenant_id)
            .await?
            .into_iter()
            .filter(|p| !p.is_deleted() && (!low_stock_only || p.is_low_stock()))
            .collect();
        tx.rollback().await?;

        products.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.sku.cmp(&b.sku)));
        Ok(products)
    }

    /// Ledger rows of one product, oldest first.
    pub async fn stock_movements(
        &self,
        principal: &Principal,
        product_id: ProductId,
    ) -> ServiceResult<Vec<StockMovement>> {
        authorize(principal, &Permission::CATALOG_READ)?;

        let mut tx = self.store().begin().await?;
        if tx.product_for_update(principal.tenant_id, product_id).await?.is_none() {
            return Err(DomainError::NotFound.into());
        }
        let movements = tx.movements_for_product(principal.tenant_id, product_id).await?;
        tx.rollback().await?;
        Ok(movements)
    }
}
