use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use benchledger_core::{DomainError, DomainResult, Entity, ProductId, TenantId, ValidationErrors};

const NAME_MAX: usize = 100;
const SKU_MAX: usize = 50;

/// Catalog product.
///
/// Prices are in the smallest currency unit (e.g. cents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub tenant_id: TenantId,
    pub name: String,
    pub sku: String,
    quantity: i64,
    pub cost_price: u64,
    pub selling_price: u64,
    pub reorder_level: i64,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Input for creating a catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub sku: String,
    /// Opening stock; booked as an adjustment movement by the caller.
    pub quantity: i64,
    pub cost_price: u64,
    pub selling_price: u64,
    pub reorder_level: i64,
}

impl NewProduct {
    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = ValidationErrors::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.add("name", "Name is required");
        } else if name.chars().count() > NAME_MAX {
            errors.add("name", format!("Name must be at most {NAME_MAX} characters"));
        }

        let sku = self.sku.trim();
        if sku.is_empty() {
            errors.add("sku", "SKU is required");
        } else if sku.chars().count() > SKU_MAX {
            errors.add("sku", format!("SKU must be at most {SKU_MAX} characters"));
        }

        if self.quantity < 0 {
            errors.add("quantity", "Quantity cannot be negative");
        }
        if self.cost_price == 0 {
            errors.add("cost_price", "Cost price must be positive");
        }
        if self.selling_price == 0 {
            errors.add("selling_price", "Selling price must be positive");
        }
        if self.reorder_level < 0 {
            errors.add("reorder_level", "Reorder level cannot be negative");
        }

        errors.into_result()
    }
}

impl Product {
    /// Build a product with zero stock; opening stock goes through the ledger.
    pub fn create(
        tenant_id: TenantId,
        id: ProductId,
        input: &NewProduct,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        input.validate()?;
        Ok(Self {
            id,
            tenant_id,
            name: input.name.trim().to_string(),
            sku: input.sku.trim().to_string(),
            quantity: 0,
            cost_price: input.cost_price,
            selling_price: input.selling_price,
            reorder_level: input.reorder_level,
            created_at: occurred_at,
            deleted_at: None,
        })
    }

    /// Rehydrate a stored row. Stores are the only expected callers.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: ProductId,
        tenant_id: TenantId,
        name: String,
        sku: String,
        quantity: i64,
        cost_price: u64,
        selling_price: u64,
        reorder_level: i64,
        created_at: DateTime<Utc>,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            name,
            sku,
            quantity,
            cost_price,
            selling_price,
            reorder_level,
            created_at,
            deleted_at,
        }
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.reorder_level
    }

    /// Apply a signed quantity change, returning the new quantity.
    ///
    /// Fails with `InsufficientStock` (and leaves the product untouched) when
    /// the result would be negative. A zero delta is accepted.
    pub fn apply_delta(&mut self, delta: i64) -> DomainResult<i64> {
        let next = self
            .quantity
            .checked_add(delta)
            .ok_or_else(|| DomainError::conflict("stock quantity overflow"))?;
        if next < 0 {
            return Err(DomainError::insufficient_stock(
                &self.name,
                self.quantity,
                delta.saturating_neg(),
            ));
        }
        self.quantity = next;
        Ok(next)
    }

    /// Check that `requested` units could be taken out without applying anything.
    pub fn ensure_available(&self, requested: i64) -> DomainResult<()> {
        if self.quantity < requested {
            return Err(DomainError::insufficient_stock(&self.name, self.quantity, requested));
        }
        Ok(())
    }

    /// Replace the descriptive fields with `input`, returning the stock delta
    /// needed to reach `input.quantity`. Stock itself is left to the ledger.
    pub fn revise(&mut self, input: &NewProduct) -> DomainResult<i64> {
        if self.is_deleted() {
            return Err(DomainError::not_found());
        }
        input.validate()?;
        self.name = input.name.trim().to_string();
        self.sku = input.sku.trim().to_string();
        self.cost_price = input.cost_price;
        self.selling_price = input.selling_price;
        self.reorder_level = input.reorder_level;
        Ok(input.quantity - self.quantity)
    }

    /// Mark the product deleted. Ledger and invoice rows keep referencing it.
    pub fn soft_delete(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.is_deleted() {
            return Err(DomainError::not_found());
        }
        self.deleted_at = Some(at);
        Ok(())
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
