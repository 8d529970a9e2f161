//! Postgres-backed store.
//!
//! Rows are locked with `SELECT ... FOR UPDATE` for the lifetime of the
//! transaction; invoice numbers come from an upserted counter row, and the
//! `(tenant_id, invoice_number)` unique index backs them up.
//!
//! ## Error Mapping
//!
//! | SQLx error | PostgreSQL code | StoreError |
//! |------------|-----------------|------------|
//! | Database (unique violation) | `23505` | `Duplicate` |
//! | Database (other) | any | `Database` |
//! | ColumnDecode / ColumnNotFound | n/a | `Decode` |
//! | Other | n/a | `Database` |

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use benchledger_auth::{Role, User, UserStatus};
use benchledger_core::{
    CustomerId, InvoiceId, JobId, MovementId, ProductId, SupplierId, TenantId, UserId,
};
use benchledger_inventory::{MovementKind, Product, StockMovement};
use benchledger_invoicing::{Invoice, InvoiceItem, InvoiceKind, InvoiceStatus};
use benchledger_maintenance::{
    Handler, HandlerKind, JobParts, JobStatus, MaintenanceJob, ProductInfo,
};
use benchledger_parties::{ContactInfo, Customer, Party, Supplier};

use super::{Store, StoreTx};
use crate::config::DatabaseConfig;
use crate::error::{StoreError, StoreResult};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// Postgres store over a shared connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool from configuration.
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let url = config.url.as_deref().ok_or_else(|| StoreError::Database {
            operation: "connect".to_string(),
            message: "database.url is not set".to_string(),
        })?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema. Idempotent.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> StoreResult<PostgresTx> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PostgresTx { tx })
    }
}

/// An open Postgres transaction. Dropping it rolls back.
#[derive(Debug)]
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_string();
            if db_err.code().as_deref() == Some("23505") {
                StoreError::Duplicate(format!("{operation}: {message}"))
            } else {
                StoreError::Database {
                    operation: operation.to_string(),
                    message,
                }
            }
        }
        e @ (sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_)) => {
            StoreError::Decode(format!("{operation}: {e}"))
        }
        other => StoreError::Database {
            operation: operation.to_string(),
            message: other.to_string(),
        },
    }
}

fn to_db_amount(value: u64, field: &str) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| StoreError::Decode(format!("{field} {value} exceeds BIGINT")))
}

fn from_db_amount(value: i64, field: &str) -> StoreResult<u64> {
    u64::try_from(value).map_err(|_| StoreError::Decode(format!("negative {field}: {value}")))
}

fn decode_rows<T, D>(rows: Vec<PgRow>) -> StoreResult<Vec<D>>
where
    T: for<'r> FromRow<'r, PgRow>,
    D: TryFrom<T, Error = StoreError>,
{
    rows.iter()
        .map(|row| {
            T::from_row(row)
                .map_err(|e| StoreError::Decode(e.to_string()))
                .and_then(D::try_from)
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Row types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct ProductRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    sku: String,
    quantity: i64,
    cost_price: i64,
    selling_price: i64,
    reorder_level: i64,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            name: row.try_get("name")?,
            sku: row.try_get("sku")?,
            quantity: row.try_get("quantity")?,
            cost_price: row.try_get("cost_price")?,
            selling_price: row.try_get("selling_price")?,
            reorder_level: row.try_get("reorder_level")?,
            created_at: row.try_get("created_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> StoreResult<Self> {
        Ok(Product::from_parts(
            ProductId::from_uuid(row.id),
            TenantId::from_uuid(row.tenant_id),
            row.name,
            row.sku,
            row.quantity,
            from_db_amount(row.cost_price, "cost_price")?,
            from_db_amount(row.selling_price, "selling_price")?,
            row.reorder_level,
            row.created_at,
            row.deleted_at,
        ))
    }
}

#[derive(Debug)]
struct MovementRow {
    id: Uuid,
    tenant_id: Uuid,
    product_id: Uuid,
    quantity: i64,
    kind: String,
    reference: String,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for MovementRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            product_id: row.try_get("product_id")?,
            quantity: row.try_get("quantity")?,
            kind: row.try_get("kind")?,
            reference: row.try_get("reference")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = StoreError;

    fn try_from(row: MovementRow) -> StoreResult<Self> {
        let kind = MovementKind::parse(&row.kind)
            .ok_or_else(|| StoreError::Decode(format!("unknown movement kind '{}'", row.kind)))?;
        Ok(StockMovement {
            id: MovementId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            product_id: ProductId::from_uuid(row.product_id),
            quantity: row.quantity,
            kind,
            reference: row.reference,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug)]
struct JobRow {
    id: Uuid,
    tenant_id: Uuid,
    customer_id: Uuid,
    product: serde_json::Value,
    issue_description: String,
    handler: String,
    supplier_id: Option<Uuid>,
    vendor_name: Option<String>,
    service_fee: Option<i64>,
    assigned_user_id: Option<Uuid>,
    notes: Option<String>,
    status: String,
    stock_out: bool,
    created_at: DateTime<Utc>,
    received_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    repaired_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for JobRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(JobRow {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            customer_id: row.try_get("customer_id")?,
            product: row.try_get("product")?,
            issue_description: row.try_get("issue_description")?,
            handler: row.try_get("handler")?,
            supplier_id: row.try_get("supplier_id")?,
            vendor_name: row.try_get("vendor_name")?,
            service_fee: row.try_get("service_fee")?,
            assigned_user_id: row.try_get("assigned_user_id")?,
            notes: row.try_get("notes")?,
            status: row.try_get("status")?,
            stock_out: row.try_get("stock_out")?,
            created_at: row.try_get("created_at")?,
            received_at: row.try_get("received_at")?,
            started_at: row.try_get("started_at")?,
            repaired_at: row.try_get("repaired_at")?,
            delivered_at: row.try_get("delivered_at")?,
            cancelled_at: row.try_get("cancelled_at")?,
        })
    }
}

impl TryFrom<JobRow> for MaintenanceJob {
    type Error = StoreError;

    fn try_from(row: JobRow) -> StoreResult<Self> {
        let product: ProductInfo = serde_json::from_value(row.product)
            .map_err(|e| StoreError::Decode(format!("job product: {e}")))?;
        let kind = HandlerKind::parse(&row.handler)
            .ok_or_else(|| StoreError::Decode(format!("unknown handler '{}'", row.handler)))?;
        let handler = Handler::from_parts(
            kind,
            row.supplier_id.map(SupplierId::from_uuid),
            row.vendor_name,
        )
        .ok_or_else(|| StoreError::Decode(format!("handler {kind:?} is missing its party")))?;
        let status = JobStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Decode(format!("unknown job status '{}'", row.status)))?;

        Ok(MaintenanceJob::from_parts(JobParts {
            id: JobId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            customer_id: CustomerId::from_uuid(row.customer_id),
            product,
            issue_description: row.issue_description,
            handler,
            service_fee: row
                .service_fee
                .map(|fee| from_db_amount(fee, "service_fee"))
                .transpose()?,
            assigned_user: row.assigned_user_id.map(UserId::from_uuid),
            notes: row.notes,
            status,
            stock_out: row.stock_out,
            created_at: row.created_at,
            received_at: row.received_at,
            started_at: row.started_at,
            repaired_at: row.repaired_at,
            delivered_at: row.delivered_at,
            cancelled_at: row.cancelled_at,
        }))
    }
}

#[derive(Debug)]
struct InvoiceRow {
    id: Uuid,
    tenant_id: Uuid,
    kind: String,
    invoice_number: String,
    customer_id: Option<Uuid>,
    supplier_id: Option<Uuid>,
    total: i64,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for InvoiceRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(InvoiceRow {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            kind: row.try_get("kind")?,
            invoice_number: row.try_get("invoice_number")?,
            customer_id: row.try_get("customer_id")?,
            supplier_id: row.try_get("supplier_id")?,
            total: row.try_get("total")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = StoreError;

    /// Items are attached by the caller.
    fn try_from(row: InvoiceRow) -> StoreResult<Self> {
        let kind = InvoiceKind::parse(&row.kind)
            .ok_or_else(|| StoreError::Decode(format!("unknown invoice kind '{}'", row.kind)))?;
        Ok(Invoice {
            id: InvoiceId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            kind,
            number: row.invoice_number,
            customer_id: row.customer_id.map(CustomerId::from_uuid),
            supplier_id: row.supplier_id.map(SupplierId::from_uuid),
            status: InvoiceStatus::Issued,
            total: from_db_amount(row.total, "total")?,
            items: Vec::new(),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug)]
struct ItemRow {
    invoice_id: Uuid,
    product_id: Uuid,
    quantity: i64,
    unit_price: i64,
    subtotal: i64,
}

impl<'r> FromRow<'r, PgRow> for ItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRow {
            invoice_id: row.try_get("invoice_id")?,
            product_id: row.try_get("product_id")?,
            quantity: row.try_get("quantity")?,
            unit_price: row.try_get("unit_price")?,
            subtotal: row.try_get("subtotal")?,
        })
    }
}

impl ItemRow {
    fn into_item(self) -> StoreResult<(InvoiceId, InvoiceItem)> {
        Ok((
            InvoiceId::from_uuid(self.invoice_id),
            InvoiceItem {
                product_id: ProductId::from_uuid(self.product_id),
                quantity: self.quantity,
                unit_price: from_db_amount(self.unit_price, "unit_price")?,
                subtotal: from_db_amount(self.subtotal, "subtotal")?,
            },
        ))
    }
}

#[derive(Debug)]
struct UserRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    email: String,
    role: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            role: row.try_get("role")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> StoreResult<Self> {
        Ok(User {
            id: UserId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            name: row.name,
            email: row.email,
            role: Role::parse(&row.role)
                .ok_or_else(|| StoreError::Decode(format!("unknown role '{}'", row.role)))?,
            status: UserStatus::parse(&row.status)
                .ok_or_else(|| StoreError::Decode(format!("unknown status '{}'", row.status)))?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug)]
struct PartyRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for PartyRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(PartyRow {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            address: row.try_get("address")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl PartyRow {
    fn into_party<I>(self, id: impl FnOnce(Uuid) -> I) -> Party<I> {
        Party {
            id: id(self.id),
            tenant_id: TenantId::from_uuid(self.tenant_id),
            name: self.name,
            contact: ContactInfo {
                email: self.email,
                phone: self.phone,
                address: self.address,
            },
            created_at: self.created_at,
        }
    }
}

impl TryFrom<PartyRow> for Customer {
    type Error = StoreError;

    fn try_from(row: PartyRow) -> StoreResult<Self> {
        Ok(row.into_party(CustomerId::from_uuid))
    }
}

impl TryFrom<PartyRow> for Supplier {
    type Error = StoreError;

    fn try_from(row: PartyRow) -> StoreResult<Self> {
        Ok(row.into_party(SupplierId::from_uuid))
    }
}

const PRODUCT_COLUMNS: &str = "id, tenant_id, name, sku, quantity, cost_price, selling_price, \
     reorder_level, created_at, deleted_at";

const JOB_COLUMNS: &str = "id, tenant_id, customer_id, product, issue_description, handler, \
     supplier_id, vendor_name, service_fee, assigned_user_id, notes, status, stock_out, \
     created_at, received_at, started_at, repaired_at, delivered_at, cancelled_at";

const INVOICE_COLUMNS: &str =
    "id, tenant_id, kind, invoice_number, customer_id, supplier_id, total, created_at";

const USER_COLUMNS: &str = "id, tenant_id, name, email, role, status, created_at";

const PARTY_COLUMNS: &str = "id, tenant_id, name, email, phone, address, created_at";

const MOVEMENT_COLUMNS: &str = "id, tenant_id, product_id, quantity, kind, reference, created_at";

impl PostgresTx {
    async fn fetch_all(
        &mut self,
        operation: &str,
        sql: &str,
        tenant_id: TenantId,
    ) -> StoreResult<Vec<PgRow>> {
        sqlx::query(sql)
            .bind(tenant_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }

    async fn fetch_one_by_id(
        &mut self,
        operation: &str,
        sql: &str,
        tenant_id: TenantId,
        id: &Uuid,
    ) -> StoreResult<Option<PgRow>> {
        sqlx::query(sql)
            .bind(tenant_id.as_uuid())
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }

    async fn insert_party<I>(
        &mut self,
        operation: &str,
        table: &str,
        party: &Party<I>,
        id: &Uuid,
    ) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO {table} ({PARTY_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(party.tenant_id.as_uuid())
            .bind(&party.name)
            .bind(&party.contact.email)
            .bind(&party.contact.phone)
            .bind(&party.contact.address)
            .bind(party.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(())
    }

    async fn items_for(&mut self, invoice_id: InvoiceId) -> StoreResult<Vec<InvoiceItem>> {
        let rows = sqlx::query(
            "SELECT invoice_id, product_id, quantity, unit_price, subtotal \
             FROM invoice_items WHERE invoice_id = $1 ORDER BY line_no",
        )
        .bind(invoice_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_invoice_items", e))?;

        rows.iter()
            .map(|row| {
                ItemRow::from_row(row)
                    .map_err(|e| StoreError::Decode(e.to_string()))
                    .and_then(ItemRow::into_item)
                    .map(|(_, item)| item)
            })
            .collect()
    }
}

#[async_trait]
impl StoreTx for PostgresTx {
    #[instrument(skip(self, tenant_id, id), fields(tenant_id = %tenant_id, product_id = %id), err)]
    async fn product_for_update(
        &mut self,
        tenant_id: TenantId,
        id: ProductId,
    ) -> StoreResult<Option<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE tenant_id = $1 AND id = $2 FOR UPDATE"
        );
        let row = self
            .fetch_one_by_id("product_for_update", &sql, tenant_id, id.as_uuid())
            .await?;
        Ok(decode_rows::<ProductRow, Product>(row.into_iter().collect())?.pop())
    }

    async fn product_by_sku(
        &mut self,
        tenant_id: TenantId,
        sku: &str,
    ) -> StoreResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE tenant_id = $1 AND sku = $2");
        let row = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(sku)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("product_by_sku", e))?;
        Ok(decode_rows::<ProductRow, Product>(row.into_iter().collect())?.pop())
    }

    async fn insert_product(&mut self, product: &Product) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO products (id, tenant_id, name, sku, quantity, cost_price, selling_price, \
             reorder_level, created_at, deleted_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(product.id.as_uuid())
        .bind(product.tenant_id.as_uuid())
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.quantity())
        .bind(to_db_amount(product.cost_price, "cost_price")?)
        .bind(to_db_amount(product.selling_price, "selling_price")?)
        .bind(product.reorder_level)
        .bind(product.created_at)
        .bind(product.deleted_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> StoreResult<()> {
        sqlx::query(
            "UPDATE products SET name = $3, sku = $4, quantity = $5, cost_price = $6, \
             selling_price = $7, reorder_level = $8, deleted_at = $9 \
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(product.tenant_id.as_uuid())
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.quantity())
        .bind(to_db_amount(product.cost_price, "cost_price")?)
        .bind(to_db_amount(product.selling_price, "selling_price")?)
        .bind(product.reorder_level)
        .bind(product.deleted_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;
        Ok(())
    }

    async fn list_products(&mut self, tenant_id: TenantId) -> StoreResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE tenant_id = $1 ORDER BY name");
        let rows = self.fetch_all("list_products", &sql, tenant_id).await?;
        decode_rows::<ProductRow, Product>(rows)
    }

    async fn insert_movement(&mut self, movement: &StockMovement) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO stock_movements (id, tenant_id, product_id, quantity, kind, reference, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(movement.id.as_uuid())
        .bind(movement.tenant_id.as_uuid())
        .bind(movement.product_id.as_uuid())
        .bind(movement.quantity)
        .bind(movement.kind.as_str())
        .bind(&movement.reference)
        .bind(movement.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_movement", e))?;
        Ok(())
    }

    async fn movements_for_product(
        &mut self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> StoreResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE tenant_id = $1 AND product_id = $2 ORDER BY seq"
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(product_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("movements_for_product", e))?;
        decode_rows::<MovementRow, StockMovement>(rows)
    }

    async fn recent_movements(
        &mut self,
        tenant_id: TenantId,
        limit: usize,
    ) -> StoreResult<Vec<StockMovement>> {
        let limit = i64::try_from(limit)
            .map_err(|_| StoreError::Decode(format!("movement limit {limit} exceeds BIGINT")))?;
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE tenant_id = $1 \
             ORDER BY seq DESC LIMIT $2"
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(limit)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("recent_movements", e))?;
        decode_rows::<MovementRow, StockMovement>(rows)
    }

    #[instrument(skip(self, tenant_id, id), fields(tenant_id = %tenant_id, job_id = %id), err)]
    async fn job_for_update(
        &mut self,
        tenant_id: TenantId,
        id: JobId,
    ) -> StoreResult<Option<MaintenanceJob>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM maintenance_jobs WHERE tenant_id = $1 AND id = $2 FOR UPDATE"
        );
        let row = self
            .fetch_one_by_id("job_for_update", &sql, tenant_id, id.as_uuid())
            .await?;
        Ok(decode_rows::<JobRow, MaintenanceJob>(row.into_iter().collect())?.pop())
    }

    async fn job(&mut self, tenant_id: TenantId, id: JobId) -> StoreResult<Option<MaintenanceJob>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM maintenance_jobs WHERE tenant_id = $1 AND id = $2");
        let row = self
            .fetch_one_by_id("load_job", &sql, tenant_id, id.as_uuid())
            .await?;
        Ok(decode_rows::<JobRow, MaintenanceJob>(row.into_iter().collect())?.pop())
    }

    async fn insert_job(&mut self, job: &MaintenanceJob) -> StoreResult<()> {
        let product = serde_json::to_value(&job.product)
            .map_err(|e| StoreError::Decode(format!("job product: {e}")))?;
        let service_fee = job
            .service_fee
            .map(|fee| to_db_amount(fee, "service_fee"))
            .transpose()?;

        sqlx::query(
            "INSERT INTO maintenance_jobs (id, tenant_id, customer_id, product_id, product, \
             issue_description, handler, supplier_id, vendor_name, service_fee, assigned_user_id, \
             notes, status, stock_out, created_at, received_at, started_at, repaired_at, \
             delivered_at, cancelled_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)",
        )
        .bind(job.id.as_uuid())
        .bind(job.tenant_id.as_uuid())
        .bind(job.customer_id.as_uuid())
        .bind(job.product.product_id.map(|id| *id.as_uuid()))
        .bind(product)
        .bind(&job.issue_description)
        .bind(job.handler.kind().as_str())
        .bind(job.handler.supplier_id().map(|id| *id.as_uuid()))
        .bind(job.handler.vendor_name())
        .bind(service_fee)
        .bind(job.assigned_user.map(|id| *id.as_uuid()))
        .bind(&job.notes)
        .bind(job.status().as_str())
        .bind(job.stock_out())
        .bind(job.created_at)
        .bind(job.received_at)
        .bind(job.started_at)
        .bind(job.repaired_at)
        .bind(job.delivered_at)
        .bind(job.cancelled_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_job", e))?;
        Ok(())
    }

    async fn update_job(&mut self, job: &MaintenanceJob) -> StoreResult<()> {
        let service_fee = job
            .service_fee
            .map(|fee| to_db_amount(fee, "service_fee"))
            .transpose()?;

        sqlx::query(
            "UPDATE maintenance_jobs SET service_fee = $3, assigned_user_id = $4, notes = $5, \
             status = $6, stock_out = $7, started_at = $8, repaired_at = $9, delivered_at = $10, \
             cancelled_at = $11 WHERE tenant_id = $1 AND id = $2",
        )
        .bind(job.tenant_id.as_uuid())
        .bind(job.id.as_uuid())
        .bind(service_fee)
        .bind(job.assigned_user.map(|id| *id.as_uuid()))
        .bind(&job.notes)
        .bind(job.status().as_str())
        .bind(job.stock_out())
        .bind(job.started_at)
        .bind(job.repaired_at)
        .bind(job.delivered_at)
        .bind(job.cancelled_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_job", e))?;
        Ok(())
    }

    async fn list_jobs(&mut self, tenant_id: TenantId) -> StoreResult<Vec<MaintenanceJob>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM maintenance_jobs WHERE tenant_id = $1 ORDER BY created_at DESC"
        );
        let rows = self.fetch_all("list_jobs", &sql, tenant_id).await?;
        decode_rows::<JobRow, MaintenanceJob>(rows)
    }

    #[instrument(skip(self, tenant_id, kind), fields(tenant_id = %tenant_id, kind = %kind), err)]
    async fn next_invoice_sequence(
        &mut self,
        tenant_id: TenantId,
        kind: InvoiceKind,
    ) -> StoreResult<u64> {
        let row = sqlx::query(
            "INSERT INTO invoice_counters (tenant_id, kind, value) VALUES ($1, $2, 1) \
             ON CONFLICT (tenant_id, kind) DO UPDATE SET value = invoice_counters.value + 1 \
             RETURNING value",
        )
        .bind(tenant_id.as_uuid())
        .bind(kind.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("next_invoice_sequence", e))?;

        let value: i64 = row
            .try_get("value")
            .map_err(|e| StoreError::Decode(format!("invoice counter: {e}")))?;
        from_db_amount(value, "invoice counter")
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO invoices (id, tenant_id, kind, invoice_number, customer_id, supplier_id, \
             status, total, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(invoice.id.as_uuid())
        .bind(invoice.tenant_id.as_uuid())
        .bind(invoice.kind.as_str())
        .bind(&invoice.number)
        .bind(invoice.customer_id.map(|id| *id.as_uuid()))
        .bind(invoice.supplier_id.map(|id| *id.as_uuid()))
        .bind(invoice.status.as_str())
        .bind(to_db_amount(invoice.total, "total")?)
        .bind(invoice.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_invoice", e))?;

        for (line_no, item) in invoice.items.iter().enumerate() {
            let line_no = i32::try_from(line_no).map_err(|_| {
                StoreError::Decode(format!("invoice line {line_no} exceeds INTEGER"))
            })?;
            sqlx::query(
                "INSERT INTO invoice_items (invoice_id, line_no, product_id, quantity, unit_price, subtotal) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(invoice.id.as_uuid())
            .bind(line_no)
            .bind(item.product_id.as_uuid())
            .bind(item.quantity)
            .bind(to_db_amount(item.unit_price, "unit_price")?)
            .bind(to_db_amount(item.subtotal, "subtotal")?)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_invoice_item", e))?;
        }
        Ok(())
    }

    async fn invoice(&mut self, tenant_id: TenantId, id: InvoiceId) -> StoreResult<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE tenant_id = $1 AND id = $2");
        let row = self
            .fetch_one_by_id("load_invoice", &sql, tenant_id, id.as_uuid())
            .await?;
        let Some(mut invoice) = decode_rows::<InvoiceRow, Invoice>(row.into_iter().collect())?.pop()
        else {
            return Ok(None);
        };
        invoice.items = self.items_for(invoice.id).await?;
        Ok(Some(invoice))
    }

    async fn list_invoices(&mut self, tenant_id: TenantId) -> StoreResult<Vec<Invoice>> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE tenant_id = $1 ORDER BY created_at DESC"
        );
        let rows = self.fetch_all("list_invoices", &sql, tenant_id).await?;
        let mut invoices = decode_rows::<InvoiceRow, Invoice>(rows)?;

        let item_rows = self
            .fetch_all(
                "list_invoice_items",
                "SELECT ii.invoice_id, ii.product_id, ii.quantity, ii.unit_price, ii.subtotal \
                 FROM invoice_items ii JOIN invoices i ON i.id = ii.invoice_id \
                 WHERE i.tenant_id = $1 ORDER BY ii.invoice_id, ii.line_no",
                tenant_id,
            )
            .await?;

        let mut items: HashMap<InvoiceId, Vec<InvoiceItem>> = HashMap::new();
        for row in &item_rows {
            let (invoice_id, item) = ItemRow::from_row(row)
                .map_err(|e| StoreError::Decode(e.to_string()))?
                .into_item()?;
            items.entry(invoice_id).or_default().push(item);
        }
        for invoice in &mut invoices {
            invoice.items = items.remove(&invoice.id).unwrap_or_default();
        }
        Ok(invoices)
    }

    async fn insert_customer(&mut self, customer: &Customer) -> StoreResult<()> {
        self.insert_party("insert_customer", "customers", customer, customer.id.as_uuid())
            .await
    }

    async fn customer(
        &mut self,
        tenant_id: TenantId,
        id: CustomerId,
    ) -> StoreResult<Option<Customer>> {
        let sql = format!("SELECT {PARTY_COLUMNS} FROM customers WHERE tenant_id = $1 AND id = $2");
        let row = self
            .fetch_one_by_id("load_customer", &sql, tenant_id, id.as_uuid())
            .await?;
        Ok(decode_rows::<PartyRow, Customer>(row.into_iter().collect())?.pop())
    }

    async fn list_customers(&mut self, tenant_id: TenantId) -> StoreResult<Vec<Customer>> {
        let sql = format!("SELECT {PARTY_COLUMNS} FROM customers WHERE tenant_id = $1 ORDER BY name");
        let rows = self.fetch_all("list_customers", &sql, tenant_id).await?;
        decode_rows::<PartyRow, Customer>(rows)
    }

    async fn insert_supplier(&mut self, supplier: &Supplier) -> StoreResult<()> {
        self.insert_party("insert_supplier", "suppliers", supplier, supplier.id.as_uuid())
            .await
    }

    async fn supplier(
        &mut self,
        tenant_id: TenantId,
        id: SupplierId,
    ) -> StoreResult<Option<Supplier>> {
        let sql = format!("SELECT {PARTY_COLUMNS} FROM suppliers WHERE tenant_id = $1 AND id = $2");
        let row = self
            .fetch_one_by_id("load_supplier", &sql, tenant_id, id.as_uuid())
            .await?;
        Ok(decode_rows::<PartyRow, Supplier>(row.into_iter().collect())?.pop())
    }

    async fn list_suppliers(&mut self, tenant_id: TenantId) -> StoreResult<Vec<Supplier>> {
        let sql = format!("SELECT {PARTY_COLUMNS} FROM suppliers WHERE tenant_id = $1 ORDER BY name");
        let rows = self.fetch_all("list_suppliers", &sql, tenant_id).await?;
        decode_rows::<PartyRow, Supplier>(rows)
    }

    async fn user_for_update(&mut self, tenant_id: TenantId, id: UserId) -> StoreResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 AND id = $2 FOR UPDATE"
        );
        let row = self
            .fetch_one_by_id("user_for_update", &sql, tenant_id, id.as_uuid())
            .await?;
        Ok(decode_rows::<UserRow, User>(row.into_iter().collect())?.pop())
    }

    async fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO users (id, tenant_id, name, email, role, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(user.id.as_uuid())
        .bind(user.tenant_id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> StoreResult<()> {
        sqlx::query("UPDATE users SET name = $3, role = $4, status = $5 WHERE tenant_id = $1 AND id = $2")
            .bind(user.tenant_id.as_uuid())
            .bind(user.id.as_uuid())
            .bind(&user.name)
            .bind(user.role.as_str())
            .bind(user.status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_user", e))?;
        Ok(())
    }

    async fn list_users(&mut self, tenant_id: TenantId) -> StoreResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 ORDER BY created_at");
        let rows = self.fetch_all("list_users", &sql, tenant_id).await?;
        decode_rows::<UserRow, User>(rows)
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}
