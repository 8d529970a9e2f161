use chrono::{DateTime, Utc};

use benchledger_core::{DomainError, MovementId, ProductId, TenantId};
use benchledger_inventory::{MovementKind, StockMovement};

use crate::error::ServiceResult;
use crate::store::StoreTx;

/// Outcome of a ledger call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockApplied {
    pub quantity: i64,
    pub movement_id: MovementId,
}

/// Change a product's quantity and record exactly one movement, inside the
/// caller's transaction.
///
/// Locks the product row first. Fails with `InsufficientStock` when the new
/// quantity would be negative and with `NotFound` for an unknown product; in
/// both cases nothing is written. Soft-deleted products are still accepted so
/// work started before deletion can be closed out. A zero delta only records
/// the movement.
pub async fn apply_stock_delta<T: StoreTx>(
    tx: &mut T,
    tenant_id: TenantId,
    product_id: ProductId,
    delta: i64,
    kind: MovementKind,
    reference: &str,
    occurred_at: DateTime<Utc>,
) -> ServiceResult<StockApplied> {
    let mut product = tx
        .product_for_update(tenant_id, product_id)
        .await?
        .ok_or(DomainError::NotFound)?;

    let quantity = product.apply_delta(delta)?;
    let movement = StockMovement::record(tenant_id, product_id, delta, kind, reference, occurred_at);

    tx.update_product(&product).await?;
    tx.insert_movement(&movement).await?;

    tracing::debug!(
        tenant_id = %tenant_id,
        product_id = %product_id,
        delta,
        kind = %kind,
        reference,
        quantity,
        "stock movement recorded"
    );

    Ok(StockApplied {
        quantity,
        movement_id: movement.id,
    })
}
