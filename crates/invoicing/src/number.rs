use crate::InvoiceKind;

/// `{PREFIX}-{YEAR}-{sequence:05}`, e.g. `INV-2026-00042`.
///
/// Sequences past 99999 keep all their digits.
pub fn format_invoice_number(kind: InvoiceKind, year: i32, sequence: u64) -> String {
    format!("{}-{year}-{sequence:05}", kind.prefix())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_five_digits() {
        assert_eq!(format_invoice_number(InvoiceKind::Sale, 2026, 1), "INV-2026-00001");
        assert_eq!(format_invoice_number(InvoiceKind::Purchase, 2025, 42), "PO-2025-00042");
    }

    #[test]
    fn wide_sequences_are_not_truncated() {
        assert_eq!(
            format_invoice_number(InvoiceKind::Sale, 2026, 123_456),
            "INV-2026-123456"
        );
    }
}
