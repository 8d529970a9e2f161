use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use benchledger_core::{
    CustomerId, DomainError, DomainResult, Entity, InvoiceId, ProductId, SupplierId, TenantId,
};
use benchledger_inventory::MovementKind;

use crate::NewInvoice;

/// Sale (stock out) or purchase (stock in).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceKind {
    Sale,
    Purchase,
}

impl InvoiceKind {
    /// Document number prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            InvoiceKind::Sale => "INV",
            InvoiceKind::Purchase => "PO",
        }
    }

    pub fn movement_kind(self) -> MovementKind {
        match self {
            InvoiceKind::Sale => MovementKind::Sale,
            InvoiceKind::Purchase => MovementKind::Purchase,
        }
    }

    /// Signed stock delta for `quantity` units on this kind of invoice.
    pub fn stock_delta(self, quantity: i64) -> i64 {
        match self {
            InvoiceKind::Sale => -quantity,
            InvoiceKind::Purchase => quantity,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceKind::Sale => "SALE",
            InvoiceKind::Purchase => "PURCHASE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SALE" => Some(InvoiceKind::Sale),
            "PURCHASE" => Some(InvoiceKind::Purchase),
            _ => None,
        }
    }
}

impl core::fmt::Display for InvoiceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invoices are issued once and never edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    #[default]
    Issued,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Issued => "ISSUED",
        }
    }
}

/// A stored invoice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Price in smallest currency unit.
    pub unit_price: u64,
    /// `quantity × unit_price`, stored as issued.
    pub subtotal: u64,
}

/// An issued invoice.
///
/// # Invariants
/// - `total` equals the sum of item subtotals.
/// - Sale invoices carry a customer, purchase invoices a supplier.
/// - Neither the invoice nor its items change after issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub tenant_id: TenantId,
    pub kind: InvoiceKind,
    pub number: String,
    pub customer_id: Option<CustomerId>,
    pub supplier_id: Option<SupplierId>,
    pub status: InvoiceStatus,
    pub total: u64,
    pub items: Vec<InvoiceItem>,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    /// Build an issued invoice from a draft and an allocated number.
    pub fn issue(
        tenant_id: TenantId,
        id: InvoiceId,
        number: String,
        draft: NewInvoice,
    ) -> DomainResult<Self> {
        draft.validate()?;

        let mut items = Vec::with_capacity(draft.items.len());
        let mut total: u64 = 0;
        for (i, line) in draft.items.into_iter().enumerate() {
            let product_id = line.product_id.ok_or_else(|| {
                DomainError::validation(format!("items[{i}].product_id"), "Product is required")
            })?;
            let subtotal = u64::try_from(line.quantity)
                .ok()
                .and_then(|q| q.checked_mul(line.unit_price))
                .ok_or_else(|| {
                    DomainError::validation(format!("items[{i}].quantity"), "Line amount is too large")
                })?;
            total = total
                .checked_add(subtotal)
                .ok_or_else(|| DomainError::validation("items", "Invoice total is too large"))?;
            items.push(InvoiceItem {
                product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
                subtotal,
            });
        }

        let (customer_id, supplier_id) = match draft.kind {
            InvoiceKind::Sale => (draft.customer_id, None),
            InvoiceKind::Purchase => (None, draft.supplier_id),
        };

        Ok(Self {
            id,
            tenant_id,
            kind: draft.kind,
            number,
            customer_id,
            supplier_id,
            status: InvoiceStatus::Issued,
            total,
            items,
            created_at: draft.occurred_at,
        })
    }

    /// One `(product, signed delta)` per item, in line order.
    pub fn stock_deltas(&self) -> impl Iterator<Item = (ProductId, i64)> + '_ {
        self.items
            .iter()
            .map(|item| (item.product_id, self.kind.stock_delta(item.quantity)))
    }
}

impl Entity for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
