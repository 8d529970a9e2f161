//! Product catalog and stock ledger (pure domain).
//!
//! Quantity on a [`Product`] only changes through [`Product::apply_delta`],
//! and every applied delta is paired with exactly one [`StockMovement`] by the
//! caller's transaction. Nothing here does IO.

pub mod movement;
pub mod product;

pub use movement::{MovementKind, StockMovement, ledger_balance};
pub use product::{NewProduct, Product};
