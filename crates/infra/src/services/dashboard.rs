use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use benchledger_auth::{Permission, Principal, authorize};
use benchledger_core::ProductId;
use benchledger_events::EventBus;
use benchledger_inventory::{Product, StockMovement};
use benchledger_invoicing::InvoiceKind;
use benchledger_kpi::month_start;
use benchledger_maintenance::MaintenanceJob;

use super::{NotificationEnvelope, Services};
use crate::error::ServiceResult;
use crate::store::{Store, StoreTx};

const RECENT_MOVEMENTS: usize = 8;

/// A live product at or below its reorder level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockItem {
    pub product_id: ProductId,
    pub name: String,
    pub sku: String,
    pub quantity: i64,
    pub reorder_level: i64,
}

impl From<&Product> for LowStockItem {
    fn from(product: &Product) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            sku: product.sku.clone(),
            quantity: product.quantity(),
            reorder_level: product.reorder_level,
        }
    }
}

/// Headline figures for the landing page. Amounts are in the smallest
/// currency unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_products: usize,
    /// Σ cost price × quantity over live products.
    pub total_stock_value: u128,
    pub low_stock: Vec<LowStockItem>,
    /// Sales invoice totals from the start of the month up to `as_of`.
    pub monthly_sales: u128,
    /// Jobs not yet delivered or cancelled, newest first.
    pub active_jobs: Vec<MaintenanceJob>,
    /// Newest ledger rows, newest first.
    pub recent_movements: Vec<StockMovement>,
}

impl<S, B> Services<S, B>
where
    S: Store,
    B: EventBus<NotificationEnvelope>,
{
    #[instrument(skip(self, principal), fields(tenant_id = %principal.tenant_id), err)]
    pub async fn get_dashboard_stats(
        &self,
        principal: &Principal,
        as_of: DateTime<Utc>,
    ) -> ServiceResult<DashboardStats> {
        authorize(principal, &Permission::DASHBOARD_READ)?;
        let tenant_id = principal.tenant_id;

        let mut tx = self.store().begin().await?;
        let products: Vec<Product> = tx
            .list_products(tenant_id)
            .await?
            .into_iter()
            .filter(|p| !p.is_deleted())
            .collect();
        let invoices = tx.list_invoices(tenant_id).await?;
        let mut active_jobs: Vec<MaintenanceJob> = tx
            .list_jobs(tenant_id)
            .await?
            .into_iter()
            .filter(|job| !job.status().is_terminal())
            .collect();
        let recent_movements = tx.recent_movements(tenant_id, RECENT_MOVEMENTS).await?;
        tx.rollback().await?;

        let total_stock_value = products
            .iter()
            .map(|p| u128::from(p.cost_price) * u128::try_from(p.quantity()).unwrap_or(0))
            .sum();

        let mut low_stock: Vec<LowStockItem> = products
            .iter()
            .filter(|p| p.is_low_stock())
            .map(LowStockItem::from)
            .collect();
        low_stock.sort_by(|a, b| a.quantity.cmp(&b.quantity).then_with(|| a.name.cmp(&b.name)));

        let since = month_start(as_of);
        let monthly_sales = invoices
            .iter()
            .filter(|i| i.kind == InvoiceKind::Sale)
            .filter(|i| i.created_at >= since && i.created_at <= as_of)
            .map(|i| u128::from(i.total))
            .sum();

        active_jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        Ok(DashboardStats {
            total_products: products.len(),
            total_stock_value,
            low_stock,
            monthly_sales,
            active_jobs,
            recent_movements,
        })
    }
}
