//! Notification requests handed to the notification collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use benchledger_core::{JobId, UserId};

use crate::Event;

/// Notification type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    MaintenanceAssigned,
    MaintenanceStatusChanged,
    AccountApproved,
    NewRegistration,
    Message,
}

/// Event: a user should be told about something.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequested {
    pub recipient: UserId,
    pub kind: NotificationKind,
    pub message: String,
    pub link: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl NotificationRequested {
    pub fn maintenance_assigned(
        recipient: UserId,
        job_id: JobId,
        product_name: &str,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            recipient,
            kind: NotificationKind::MaintenanceAssigned,
            message: format!("You have been assigned a maintenance job: {product_name}"),
            link: Some(job_link(job_id)),
            occurred_at,
        }
    }

    /// `status` is rendered with underscores turned into spaces ("WAITING FOR PARTS").
    pub fn maintenance_status_changed(
        recipient: UserId,
        job_id: JobId,
        product_name: &str,
        status: impl core::fmt::Display,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        let status = status.to_string().replace('_', " ");
        Self {
            recipient,
            kind: NotificationKind::MaintenanceStatusChanged,
            message: format!("Maintenance job \"{product_name}\" status updated to: {status}"),
            link: Some(job_link(job_id)),
            occurred_at,
        }
    }

    pub fn account_approved(recipient: UserId, occurred_at: DateTime<Utc>) -> Self {
        Self {
            recipient,
            kind: NotificationKind::AccountApproved,
            message: "Your account has been approved. Welcome to the system!".to_string(),
            link: Some("/dashboard".to_string()),
            occurred_at,
        }
    }

    /// Sent to each active superuser when an account is waiting for approval.
    pub fn new_registration(
        recipient: UserId,
        name: &str,
        email: &str,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            recipient,
            kind: NotificationKind::NewRegistration,
            message: format!("New user registered: {name} ({email}), awaiting approval."),
            link: Some("/dashboard/users".to_string()),
            occurred_at,
        }
    }

    pub fn message(recipient: UserId, text: impl Into<String>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            recipient,
            kind: NotificationKind::Message,
            message: text.into(),
            link: Some("/dashboard".to_string()),
            occurred_at,
        }
    }
}

fn job_link(job_id: JobId) -> String {
    format!("/dashboard/maintenance/{job_id}")
}

impl Event for NotificationRequested {
    fn event_type(&self) -> &'static str {
        "notification.requested"
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
