//! In-app notification inbox.
//!
//! Subscribes to the notification bus and keeps per-recipient, tenant-isolated
//! records. Delivery is at-least-once, so each envelope is stored under its
//! event id and redelivery is a no-op.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use benchledger_core::{DomainError, DomainResult, NotificationId, TenantId, UserId};
use benchledger_events::{NotificationKind, Subscription, TenantScoped};

use crate::services::NotificationEnvelope;

/// Most notifications returned by [`NotificationInbox::for_recipient`].
pub const INBOX_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub tenant_id: TenantId,
    pub recipient: UserId,
    pub kind: NotificationKind,
    pub message: String,
    pub link: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

type Records = HashMap<(TenantId, NotificationId), Notification>;

/// In-memory inbox. Safe to share between the bus consumer and readers.
#[derive(Debug, Default)]
pub struct NotificationInbox {
    inner: RwLock<Records>,
}

impl NotificationInbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Records> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Records> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store one envelope. Returns `false` when it was already delivered.
    pub fn deliver(&self, envelope: &NotificationEnvelope) -> bool {
        let tenant_id = TenantScoped::tenant_id(envelope);
        let id = NotificationId::from_uuid(envelope.event_id());
        let request = envelope.payload();

        let mut records = self.write();
        if records.contains_key(&(tenant_id, id)) {
            tracing::debug!(notification_id = %id, "duplicate notification ignored");
            return false;
        }
        records.insert(
            (tenant_id, id),
            Notification {
                id,
                tenant_id,
                recipient: request.recipient,
                kind: request.kind,
                message: request.message.clone(),
                link: request.link.clone(),
                read: false,
                created_at: request.occurred_at,
            },
        );
        true
    }

    /// Deliver everything queued on `subscription`; returns how many were new.
    pub fn drain(&self, subscription: &Subscription<NotificationEnvelope>) -> usize {
        subscription
            .drain()
            .iter()
            .filter(|envelope| self.deliver(envelope))
            .count()
    }

    /// Newest first, at most [`INBOX_LIMIT`].
    pub fn for_recipient(&self, tenant_id: TenantId, recipient: UserId) -> Vec<Notification> {
        let mut mine: Vec<Notification> = self
            .read()
            .values()
            .filter(|n| n.tenant_id == tenant_id && n.recipient == recipient)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        mine.truncate(INBOX_LIMIT);
        mine
    }

    pub fn unread_count(&self, tenant_id: TenantId, recipient: UserId) -> usize {
        self.read()
            .values()
            .filter(|n| n.tenant_id == tenant_id && n.recipient == recipient && !n.read)
            .count()
    }

    /// Mark one of the recipient's notifications read. Someone else's
    /// notification is `NotFound`.
    pub fn mark_read(
        &self,
        tenant_id: TenantId,
        recipient: UserId,
        id: NotificationId,
    ) -> DomainResult<()> {
        match self.write().get_mut(&(tenant_id, id)) {
            Some(n) if n.recipient == recipient => {
                n.read = true;
                Ok(())
            }
            _ => Err(DomainError::NotFound),
        }
    }

    /// Returns how many notifications changed.
    pub fn mark_all_read(&self, tenant_id: TenantId, recipient: UserId) -> usize {
        let mut changed = 0;
        for n in self.write().values_mut() {
            if n.tenant_id == tenant_id && n.recipient == recipient && !n.read {
                n.read = true;
                changed += 1;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchledger_core::JobId;
    use benchledger_events::{EventBus, EventEnvelope, InMemoryEventBus, NotificationRequested};
    use chrono::{Duration, TimeZone};

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn envelope(tenant_id: TenantId, recipient: UserId, minute: i64) -> NotificationEnvelope {
        EventEnvelope::wrap(
            tenant_id,
            NotificationRequested::maintenance_assigned(recipient, JobId::new(), "Laptop", at(minute)),
        )
    }

    #[test]
    fn redelivery_is_ignored() {
        let inbox = NotificationInbox::new();
        let tenant_id = TenantId::new();
        let env = envelope(tenant_id, UserId::new(), 0);

        assert!(inbox.deliver(&env));
        assert!(!inbox.deliver(&env));
        assert_eq!(inbox.unread_count(tenant_id, env.payload().recipient), 1);
    }

    #[test]
    fn listing_is_newest_first_and_capped() {
        let inbox = NotificationInbox::new();
        let tenant_id = TenantId::new();
        let user = UserId::new();
        for minute in 0..60 {
            inbox.deliver(&envelope(tenant_id, user, minute));
        }

        let listed = inbox.for_recipient(tenant_id, user);
        assert_eq!(listed.len(), INBOX_LIMIT);
        assert_eq!(listed[0].created_at, at(59));
        assert!(listed.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn recipients_and_tenants_are_isolated() {
        let inbox = NotificationInbox::new();
        let tenant_id = TenantId::new();
        let user = UserId::new();
        inbox.deliver(&envelope(tenant_id, user, 0));
        inbox.deliver(&envelope(tenant_id, UserId::new(), 1));

        let mine = inbox.for_recipient(tenant_id, user);
        assert_eq!(mine.len(), 1);
        assert!(inbox.for_recipient(TenantId::new(), user).is_empty());

        let other = UserId::new();
        assert_eq!(inbox.mark_read(tenant_id, other, mine[0].id), Err(DomainError::NotFound));
        assert_eq!(inbox.mark_read(TenantId::new(), user, mine[0].id), Err(DomainError::NotFound));
        assert_eq!(inbox.mark_read(tenant_id, user, mine[0].id), Ok(()));
        assert_eq!(inbox.unread_count(tenant_id, user), 0);
    }

    #[test]
    fn mark_all_read_only_touches_unread() {
        let inbox = NotificationInbox::new();
        let tenant_id = TenantId::new();
        let user = UserId::new();
        for minute in 0..3 {
            inbox.deliver(&envelope(tenant_id, user, minute));
        }
        let first = inbox.for_recipient(tenant_id, user)[0].id;
        inbox.mark_read(tenant_id, user, first).unwrap();

        assert_eq!(inbox.mark_all_read(tenant_id, user), 2);
        assert_eq!(inbox.mark_all_read(tenant_id, user), 0);
    }

    #[test]
    fn drains_from_the_bus() {
        let bus = InMemoryEventBus::new();
        let subscription = bus.subscribe();
        let inbox = NotificationInbox::new();
        let tenant_id = TenantId::new();
        let user = UserId::new();

        let env = envelope(tenant_id, user, 0);
        bus.publish(env.clone()).unwrap();
        bus.publish(env).unwrap();
        bus.publish(envelope(tenant_id, user, 1)).unwrap();

        assert_eq!(inbox.drain(&subscription), 2);
        assert_eq!(inbox.unread_count(tenant_id, user), 2);
    }
}
