use chrono::Datelike;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use benchledger_auth::{Permission, Principal, authorize};
use benchledger_core::{DomainError, InvoiceId};
use benchledger_events::EventBus;
use benchledger_invoicing::{Invoice, InvoiceKind, NewInvoice, format_invoice_number};

use super::parties::{ensure_customer, ensure_supplier};
use super::{NotificationEnvelope, Services, apply_stock_delta};
use crate::error::{ServiceError, ServiceResult, StoreError};
use crate::store::{Store, StoreTx};

/// Result of a successful `create_invoice`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCreated {
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
}

impl<S, B> Services<S, B>
where
    S: Store,
    B: EventBus<NotificationEnvelope>,
{
    /// Issue a sales or purchase invoice and book its stock movements.
    ///
    /// Products are locked in id order. A sale is checked against stock for
    /// every product before anything is written; quantities of repeated
    /// products are summed first. Numbering, invoice rows and ledger rows
    /// commit together or not at all.
    #[instrument(
        skip(self, principal, draft),
        fields(tenant_id = %principal.tenant_id, kind = %draft.kind, lines = draft.items.len()),
        err
    )]
    pub async fn create_invoice(
        &self,
        principal: &Principal,
        draft: NewInvoice,
    ) -> ServiceResult<InvoiceCreated> {
        authorize(principal, &Permission::INVOICE_CREATE)?;
        draft.validate()?;
        let requested_quantities = draft.requested_quantities()?;
        let tenant_id = principal.tenant_id;
        let kind = draft.kind;

        let mut tx = self.store().begin().await?;
        match kind {
            InvoiceKind::Sale => {
                if let Some(customer_id) = draft.customer_id {
                    ensure_customer(&mut tx, tenant_id, customer_id).await?;
                }
            }
            InvoiceKind::Purchase => {
                if let Some(supplier_id) = draft.supplier_id {
                    ensure_supplier(&mut tx, tenant_id, supplier_id).await?;
                }
            }
        }

        for (product_id, requested) in requested_quantities {
            let product = match tx.product_for_update(tenant_id, product_id).await? {
                Some(product) if !product.is_deleted() => product,
                _ => return Err(DomainError::NotFound.into()),
            };
            if kind == InvoiceKind::Sale {
                product.ensure_available(requested)?;
            }
        }

        let sequence = tx.next_invoice_sequence(tenant_id, kind).await?;
        let number = format_invoice_number(kind, draft.occurred_at.year(), sequence);
        let invoice = Invoice::issue(tenant_id, InvoiceId::new(), number, draft)?;

        tx.insert_invoice(&invoice).await.map_err(|e| match e {
            StoreError::Duplicate(_) => {
                ServiceError::from(DomainError::NumberGenerationConflict(invoice.number.clone()))
            }
            other => ServiceError::from(other),
        })?;

        for (product_id, delta) in invoice.stock_deltas() {
            apply_stock_delta(
                &mut tx,
                tenant_id,
                product_id,
                delta,
                kind.movement_kind(),
                &invoice.number,
                invoice.created_at,
            )
            .await?;
        }
        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.number,
            total = invoice.total,
            "invoice issued"
        );

        Ok(InvoiceCreated {
            invoice_id: invoice.id,
            invoice_number: invoice.number,
        })
    }

    pub async fn get_invoice(
        &self,
        principal: &Principal,
        invoice_id: InvoiceId,
    ) -> ServiceResult<Invoice> {
        authorize(principal, &Permission::INVOICE_READ)?;

        let mut tx = self.store().begin().await?;
        let invoice = tx.invoice(principal.tenant_id, invoice_id).await?;
        tx.rollback().await?;
        Ok(invoice.ok_or(DomainError::NotFound)?)
    }

    /// Invoices newest first, optionally of one kind.
    pub async fn list_invoices(
        &self,
        principal: &Principal,
        kind: Option<InvoiceKind>,
    ) -> ServiceResult<Vec<Invoice>> {
        authorize(principal, &Permission::INVOICE_READ)?;

        let mut tx = self.store().begin().await?;
        let mut invoices: Vec<Invoice> = tx
            .list_invoices(principal.tenant_id)
            .await?
            .into_iter()
            .filter(|invoice| kind.is_none_or(|k| invoice.kind == k))
            .collect();
        tx.rollback().await?;

        invoices.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.number.cmp(&a.number))
        });
        Ok(invoices)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use benchledger_core::{CustomerId, ProductId};
    use benchledger_inventory::{MovementKind, ledger_balance};
    use benchledger_invoicing::NewInvoiceItem;
    use chrono::{TimeZone, Utc};

    use crate::services::testkit::{
        Fixture, at, customer_id, fixture, new_product, supplier_id,
    };

    fn line(product_id: ProductId, quantity: i64, unit_price: u64) -> NewInvoiceItem {
        NewInvoiceItem {
            product_id: Some(product_id),
            quantity,
            unit_price,
        }
    }

    fn sale(items: Vec<NewInvoiceItem>, day: u32) -> NewInvoice {
        NewInvoice {
            kind: InvoiceKind::Sale,
            customer_id: Some(customer_id()),
            supplier_id: None,
            items,
            occurred_at: at(day),
        }
    }

    fn purchase(items: Vec<NewInvoiceItem>, day: u32) -> NewInvoice {
        NewInvoice {
            kind: InvoiceKind::Purchase,
            customer_id: None,
            supplier_id: Some(supplier_id()),
            items,
            occurred_at: at(day),
        }
    }

    async fn stocked(f: &Fixture, sku: &str, quantity: i64) -> ProductId {
        f.services
            .create_product(&f.admin, new_product(sku, quantity), at(1))
            .await
            .unwrap()
            .id
    }

    async fn on_hand(f: &Fixture, product_id: ProductId) -> i64 {
        let rows = f.services.stock_movements(&f.admin, product_id).await.unwrap();
        ledger_balance(&rows, product_id)
    }

    #[tokio::test]
    async fn sale_books_one_movement_per_line() {
        let f = fixture().await;
        let a = stocked(&f, "A", 10).await;
        let b = stocked(&f, "B", 5).await;

        let created = f
            .services
            .create_invoice(&f.tech, sale(vec![line(a, 3, 1_500), line(b, 2, 2_000)], 2))
            .await
            .unwrap();
        assert_eq!(created.invoice_number, "INV-2026-00001");

        let invoice = f.services.get_invoice(&f.tech, created.invoice_id).await.unwrap();
        assert_eq!(invoice.total, 3 * 1_500 + 2 * 2_000);
        assert_eq!(invoice.items.len(), 2);

        assert_eq!(on_hand(&f, a).await, 7);
        assert_eq!(on_hand(&f, b).await, 3);
        let rows = f.services.stock_movements(&f.admin, a).await.unwrap();
        let last = rows.last().unwrap();
        assert_eq!(last.kind, MovementKind::Sale);
        assert_eq!(last.reference, "INV-2026-00001");
    }

    #[tokio::test]
    async fn purchase_adds_stock_under_its_own_counter() {
        let f = fixture().await;
        let a = stocked(&f, "A", 0).await;
        let s = &f.services;

        s.create_invoice(&f.tech, purchase(vec![line(a, 4, 900)], 2)).await.unwrap();
        let sold = s.create_invoice(&f.tech, sale(vec![line(a, 1, 1_500)], 3)).await.unwrap();
        let bought = s.create_invoice(&f.tech, purchase(vec![line(a, 2, 900)], 4)).await.unwrap();

        assert_eq!(sold.invoice_number, "INV-2026-00001");
        assert_eq!(bought.invoice_number, "PO-2026-00002");
        assert_eq!(on_hand(&f, a).await, 5);
    }

    #[tokio::test]
    async fn shortfall_anywhere_rolls_back_everything() {
        let f = fixture().await;
        let a = stocked(&f, "A", 10).await;
        let b = stocked(&f, "B", 1).await;

        let err = f
            .services
            .create_invoice(&f.tech, sale(vec![line(a, 2, 100), line(b, 2, 100)], 2))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Insufficient stock for \"Product B\". Available: 1, Requested: 2"
        );

        assert_eq!(on_hand(&f, a).await, 10);
        assert!(f.services.list_invoices(&f.admin, None).await.unwrap().is_empty());

        // The failed attempt did not consume a number.
        let ok = f
            .services
            .create_invoice(&f.tech, sale(vec![line(a, 1, 100)], 3))
            .await
            .unwrap();
        assert_eq!(ok.invoice_number, "INV-2026-00001");
    }

    #[tokio::test]
    async fn repeated_product_lines_are_checked_together() {
        let f = fixture().await;
        let a = stocked(&f, "A", 3).await;

        let err = f
            .services
            .create_invoice(&f.tech, sale(vec![line(a, 2, 100), line(a, 2, 100)], 2))
            .await
            .unwrap_err();
        assert!(matches!(
            err.domain(),
            Some(DomainError::InsufficientStock {
                available: 3,
                requested: 4,
                ..
            })
        ));
        assert_eq!(on_hand(&f, a).await, 3);
    }

    #[tokio::test]
    async fn invalid_drafts_report_every_field() {
        let f = fixture().await;
        let a = stocked(&f, "A", 3).await;
        let mut draft = sale(vec![line(a, 0, 100), line(a, 1, 0)], 2);
        draft.customer_id = None;

        let err = f.services.create_invoice(&f.tech, draft).await.unwrap_err();
        let Some(DomainError::Validation(errors)) = err.domain() else {
            panic!("expected validation error, got {err:?}");
        };
        let fields: Vec<_> = errors.fields().collect();
        assert_eq!(fields, vec!["customer_id", "items[0].quantity", "items[1].unit_price"]);
    }

    #[tokio::test]
    async fn deleted_products_cannot_be_invoiced() {
        let f = fixture().await;
        let a = stocked(&f, "A", 3).await;
        f.services.soft_delete_product(&f.admin, a, at(1)).await.unwrap();

        let err = f
            .services
            .create_invoice(&f.tech, sale(vec![line(a, 1, 100)], 2))
            .await
            .unwrap_err();
        assert_eq!(err.domain(), Some(&DomainError::NotFound));
    }

    #[tokio::test]
    async fn repeated_lines_too_large_to_sum_are_rejected() {
        let f = fixture().await;
        let a = stocked(&f, "A", 0).await;

        let draft = purchase(vec![line(a, i64::MAX, 1), line(a, i64::MAX, 1)], 2);
        let err = f.services.create_invoice(&f.tech, draft).await.unwrap_err();
        let Some(DomainError::Validation(errors)) = err.domain() else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(errors.field("items").is_some());
        assert_eq!(on_hand(&f, a).await, 0);
        assert!(f.services.list_invoices(&f.admin, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_parties_are_field_errors() {
        let f = fixture().await;
        let a = stocked(&f, "A", 5).await;

        let mut draft = sale(vec![line(a, 1, 100)], 2);
        draft.customer_id = Some(CustomerId::new());
        let err = f.services.create_invoice(&f.tech, draft).await.unwrap_err();
        let Some(DomainError::Validation(errors)) = err.domain() else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["customer_id"]);
        assert_eq!(on_hand(&f, a).await, 5);
    }

    #[tokio::test]
    async fn taken_number_is_a_generation_conflict_and_writes_nothing() {
        let f = fixture().await;
        let a = stocked(&f, "A", 10).await;

        // A row already holds the number the counter will hand out next.
        let squatter = Invoice::issue(
            f.tenant_id,
            InvoiceId::new(),
            "INV-2026-00001".to_string(),
            sale(vec![line(a, 1, 100)], 1),
        )
        .unwrap();
        let mut tx = f.services.store().begin().await.unwrap();
        tx.insert_invoice(&squatter).await.unwrap();
        tx.commit().await.unwrap();

        let err = f
            .services
            .create_invoice(&f.tech, sale(vec![line(a, 3, 1_500)], 2))
            .await
            .unwrap_err();
        assert_eq!(
            err.domain(),
            Some(&DomainError::NumberGenerationConflict("INV-2026-00001".to_string()))
        );

        let rows = f.services.stock_movements(&f.admin, a).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(ledger_balance(&rows, a), 10);
        let invoices = f.services.list_invoices(&f.admin, None).await.unwrap();
        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].id, squatter.id);
    }

    #[tokio::test]
    async fn number_year_comes_from_the_invoice_date() {
        let f = fixture().await;
        let a = stocked(&f, "A", 0).await;
        let mut draft = purchase(vec![line(a, 1, 100)], 2);
        draft.occurred_at = Utc.with_ymd_and_hms(2027, 1, 2, 8, 0, 0).unwrap();

        let created = f.services.create_invoice(&f.tech, draft).await.unwrap();
        assert_eq!(created.invoice_number, "PO-2027-00001");
    }

    #[tokio::test]
    async fn listing_filters_by_kind_newest_first() {
        let f = fixture().await;
        let a = stocked(&f, "A", 10).await;
        let s = &f.services;

        let first = s.create_invoice(&f.tech, sale(vec![line(a, 1, 100)], 2)).await.unwrap();
        s.create_invoice(&f.tech, purchase(vec![line(a, 1, 100)], 3)).await.unwrap();
        let second = s.create_invoice(&f.tech, sale(vec![line(a, 1, 100)], 4)).await.unwrap();

        let sales: Vec<_> = s
            .list_invoices(&f.tech, Some(InvoiceKind::Sale))
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.number)
            .collect();
        assert_eq!(sales, vec![second.invoice_number, first.invoice_number]);
        assert_eq!(s.list_invoices(&f.tech, None).await.unwrap().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_invoices_get_distinct_numbers() {
        let f = fixture().await;
        let a = stocked(&f, "A", 100).await;
        let services = Arc::new(f.services);

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let services = Arc::clone(&services);
                let tech = f.tech.clone();
                tokio::spawn(async move {
                    services
                        .create_invoice(&tech, sale(vec![line(a, 1, 100)], 2))
                        .await
                        .unwrap()
                        .invoice_number
                })
            })
            .collect();

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap());
        }
        numbers.sort();
        let expected: Vec<_> = (1..=20).map(|n| format!("INV-2026-{n:05}")).collect();
        assert_eq!(numbers, expected);

        let rows = services.stock_movements(&f.admin, a).await.unwrap();
        assert_eq!(ledger_balance(&rows, a), 80);
    }
}
