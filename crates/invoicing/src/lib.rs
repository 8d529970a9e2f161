//! Invoicing domain module.
//!
//! This crate contains the business rules for sale and purchase invoices:
//! draft validation, line totals, stock effects and the document number
//! format. It is deterministic domain logic only (no IO, no storage); the
//! numbering counter and the ledger calls are driven by the service layer.

pub mod draft;
pub mod invoice;
pub mod number;

pub use draft::{NewInvoice, NewInvoiceItem};
pub use invoice::{Invoice, InvoiceItem, InvoiceKind, InvoiceStatus};
pub use number::format_invoice_number;
