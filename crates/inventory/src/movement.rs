use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use benchledger_core::{Entity, MovementId, ProductId, TenantId};

/// Why a quantity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Sale,
    Purchase,
    MaintenanceOut,
    MaintenanceIn,
    Adjustment,
}

impl MovementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MovementKind::Sale => "SALE",
            MovementKind::Purchase => "PURCHASE",
            MovementKind::MaintenanceOut => "MAINTENANCE_OUT",
            MovementKind::MaintenanceIn => "MAINTENANCE_IN",
            MovementKind::Adjustment => "ADJUSTMENT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "SALE" => MovementKind::Sale,
            "PURCHASE" => MovementKind::Purchase,
            "MAINTENANCE_OUT" => MovementKind::MaintenanceOut,
            "MAINTENANCE_IN" => MovementKind::MaintenanceIn,
            "ADJUSTMENT" => MovementKind::Adjustment,
            _ => return None,
        })
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only ledger row. Never updated or deleted once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    /// Signed quantity delta.
    pub quantity: i64,
    pub kind: MovementKind,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn record(
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: i64,
        kind: MovementKind,
        reference: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MovementId::new(),
            tenant_id,
            product_id,
            quantity,
            kind,
            reference: reference.into(),
            created_at,
        }
    }
}

impl Entity for StockMovement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Sum of deltas for one product; equals its catalog quantity when the ledger is consistent.
pub fn ledger_balance<'a>(
    movements: impl IntoIterator<Item = &'a StockMovement>,
    product_id: ProductId,
) -> i64 {
    movements
        .into_iter()
        .filter(|m| m.product_id == product_id)
        .map(|m| m.quantity)
        .sum()
}
