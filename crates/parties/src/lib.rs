//! Customers and suppliers: the counterparties on jobs and invoices.
//!
//! Both share one shape, [`Party`], keyed by their own id type so a customer
//! id can never be used where a supplier is expected.

pub mod party;

pub use party::{ContactInfo, Customer, NewParty, Party, Supplier};
