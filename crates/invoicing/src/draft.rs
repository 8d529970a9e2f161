use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use benchledger_core::{
    CustomerId, DomainError, DomainResult, ProductId, SupplierId, ValidationErrors,
};

use crate::InvoiceKind;

/// A line as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInvoiceItem {
    pub product_id: Option<ProductId>,
    pub quantity: i64,
    /// Price in smallest currency unit.
    pub unit_price: u64,
}

/// An invoice as submitted, before numbering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInvoice {
    pub kind: InvoiceKind,
    pub customer_id: Option<CustomerId>,
    pub supplier_id: Option<SupplierId>,
    pub items: Vec<NewInvoiceItem>,
    pub occurred_at: DateTime<Utc>,
}

impl NewInvoice {
    /// Collect every field error at once.
    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = ValidationErrors::new();

        if self.items.is_empty() {
            errors.add("items", "At least one item is required");
        }
        for (i, item) in self.items.iter().enumerate() {
            if item.product_id.is_none() {
                errors.add(format!("items[{i}].product_id"), "Product is required");
            }
            if item.quantity <= 0 {
                errors.add(format!("items[{i}].quantity"), "Quantity must be greater than 0");
            }
            if item.unit_price == 0 {
                errors.add(format!("items[{i}].unit_price"), "Unit price must be greater than 0");
            }
        }

        match self.kind {
            InvoiceKind::Sale if self.customer_id.is_none() => {
                errors.add("customer_id", "Customer is required for sales invoices");
            }
            InvoiceKind::Purchase if self.supplier_id.is_none() => {
                errors.add("supplier_id", "Supplier is required for purchase invoices");
            }
            _ => {}
        }

        errors.into_result()
    }

    /// Total quantity requested per product, summed across lines.
    ///
    /// Lines without a product are skipped; validate first. A sum that does
    /// not fit in `i64` is a validation error on `items`.
    pub fn requested_quantities(&self) -> DomainResult<BTreeMap<ProductId, i64>> {
        let mut requested: BTreeMap<ProductId, i64> = BTreeMap::new();
        for item in &self.items {
            let Some(product_id) = item.product_id else {
                continue;
            };
            let total = requested.entry(product_id).or_insert(0);
            *total = total.checked_add(item.quantity).ok_or_else(|| {
                DomainError::validation("items", "Total quantity for a product is too large")
            })?;
        }
        Ok(requested)
    }
}
