//! Application services: the operations the outer surface calls.
//!
//! Each operation follows the same shape:
//!
//! ```text
//! principal ─▶ authorize
//!   ↓
//! begin transaction
//!   ↓
//! load + lock rows, run the pure domain decision
//!   ↓
//! write rows (and ledger movements), commit
//!   ↓
//! publish notifications (best effort)
//! ```
//!
//! Any error before commit drops the transaction, so nothing is written.
//! Notifications only leave after commit, and a failed publish is logged,
//! never returned.

mod catalog;
mod dashboard;
mod invoicing;
mod kpi;
mod ledger;
mod maintenance;
mod parties;
mod users;

pub use dashboard::{DashboardStats, LowStockItem};
pub use invoicing::InvoiceCreated;
pub use ledger::{StockApplied, apply_stock_delta};
pub use maintenance::TransitionJob;

use benchledger_auth::Principal;
use benchledger_core::{DomainError, TenantId, UserId};
use benchledger_events::{EventBus, EventEnvelope, NotificationRequested};
use benchledger_kpi::KpiConfig;

use crate::config::AppConfig;
use crate::error::ServiceResult;
use crate::store::{Store, StoreTx};

/// Message type carried by the notification bus.
pub type NotificationEnvelope = EventEnvelope<NotificationRequested>;

/// The core operations over a store and a notification bus.
///
/// ## Generic Parameters
///
/// - `S`: store implementation ([`crate::store::InMemoryStore`] in tests,
///   [`crate::store::PostgresStore`] in production)
/// - `B`: notification bus
#[derive(Debug)]
pub struct Services<S, B> {
    store: S,
    bus: B,
    kpi: KpiConfig,
}

impl<S, B> Services<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            kpi: KpiConfig::default(),
        }
    }

    /// Build services with the tunables from loaded configuration.
    pub fn from_config(config: &AppConfig, store: S, bus: B) -> Self {
        Self::new(store, bus).with_kpi_config(config.kpi)
    }

    pub fn with_kpi_config(mut self, kpi: KpiConfig) -> Self {
        self.kpi = kpi;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> Services<S, B>
where
    S: Store,
    B: EventBus<NotificationEnvelope>,
{
    /// Resolve the acting principal from the stored account.
    ///
    /// Used by surfaces that identify callers by id; the account's current
    /// role and status apply.
    pub async fn principal(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> ServiceResult<Principal> {
        let mut tx = self.store.begin().await?;
        let user = tx.user_for_update(tenant_id, user_id).await?;
        tx.rollback().await?;
        let user = user.ok_or(DomainError::NotFound)?;
        Ok(Principal::from(&user))
    }

    /// Hand a notification to the bus. Failure is logged and swallowed.
    fn notify(&self, tenant_id: TenantId, request: NotificationRequested) {
        let recipient = request.recipient;
        let kind = request.kind;
        if let Err(error) = self.bus.publish(EventEnvelope::wrap(tenant_id, request)) {
            tracing::warn!(
                tenant_id = %tenant_id,
                recipient = %recipient,
                ?kind,
                ?error,
                "notification publish failed"
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod testkit {
    //! Shared fixtures for service tests.

    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};

    use benchledger_auth::{NewUser, Principal, Role, User, UserStatus};
    use uuid::Uuid;

    use benchledger_core::{CustomerId, ProductId, SupplierId, TenantId, UserId};
    use benchledger_events::{EventBus, InMemoryEventBus, Subscription};
    use benchledger_inventory::NewProduct;
    use benchledger_maintenance::{HandlerKind, NewJob, ProductInfo};
    use benchledger_parties::{Customer, NewParty, Supplier};

    use super::{NotificationEnvelope, Services};
    use crate::store::{InMemoryStore, Store, StoreTx};

    pub type TestServices = Services<InMemoryStore, Arc<InMemoryEventBus<NotificationEnvelope>>>;

    pub struct Fixture {
        pub services: TestServices,
        pub notifications: Subscription<NotificationEnvelope>,
        pub tenant_id: TenantId,
        pub admin: Principal,
        pub tech: Principal,
    }

    /// Customer seeded into every fixture tenant.
    pub fn customer_id() -> CustomerId {
        CustomerId::from_uuid(Uuid::from_u128(0xC0FFEE))
    }

    /// Supplier seeded into every fixture tenant.
    pub fn supplier_id() -> SupplierId {
        SupplierId::from_uuid(Uuid::from_u128(0x5EED))
    }

    pub fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).unwrap()
    }

    pub async fn seed_user(
        store: &InMemoryStore,
        tenant_id: TenantId,
        role: Role,
        status: UserStatus,
        name: &str,
    ) -> User {
        let user = User::register(
            tenant_id,
            UserId::new(),
            NewUser {
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                role,
                status,
            },
            at(1),
        )
        .unwrap();
        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&user).await.unwrap();
        tx.commit().await.unwrap();
        user
    }

    pub async fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let bus = Arc::new(InMemoryEventBus::new());
        let notifications = bus.subscribe();
        let tenant_id = TenantId::new();

        let admin = seed_user(&store, tenant_id, Role::Superuser, UserStatus::Active, "Admin").await;
        let tech = seed_user(&store, tenant_id, Role::User, UserStatus::Active, "Tech").await;
        seed_parties(&store, tenant_id).await;

        Fixture {
            services: Services::new(store, bus),
            notifications,
            tenant_id,
            admin: Principal::from(&admin),
            tech: Principal::from(&tech),
        }
    }

    async fn seed_parties(store: &InMemoryStore, tenant_id: TenantId) {
        let party = |name: &str| NewParty {
            name: name.to_string(),
            ..NewParty::default()
        };
        let customer =
            Customer::create(tenant_id, customer_id(), &party("Walk-in"), at(1)).unwrap();
        let supplier =
            Supplier::create(tenant_id, supplier_id(), &party("Parts Depot"), at(1)).unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert_customer(&customer).await.unwrap();
        tx.insert_supplier(&supplier).await.unwrap();
        tx.commit().await.unwrap();
    }

    pub fn new_product(sku: &str, quantity: i64) -> NewProduct {
        NewProduct {
            name: format!("Product {sku}"),
            sku: sku.to_string(),
            quantity,
            cost_price: 1_000,
            selling_price: 1_500,
            reorder_level: 2,
        }
    }

    pub fn new_job(product_id: Option<ProductId>) -> NewJob {
        NewJob {
            customer_id: Some(customer_id()),
            product: ProductInfo {
                product_id,
                name: "Laptop".to_string(),
                brand: Some("Dell".to_string()),
                model: Some("XPS 13".to_string()),
                serial_number: None,
            },
            issue_description: "Does not boot".to_string(),
            handler: HandlerKind::InHouse,
            supplier_id: None,
            vendor_name: None,
            service_fee: Some(5_000),
            notes: None,
            assigned_user: None,
        }
    }

    impl Fixture {
        pub fn published(&self) -> Vec<NotificationEnvelope> {
            self.notifications.drain()
        }
    }
}
