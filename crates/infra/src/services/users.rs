use chrono::{DateTime, Utc};
use tracing::instrument;

use benchledger_auth::{NewUser, Permission, Principal, Role, User, UserStatus, authorize};
use benchledger_core::{DomainError, TenantId, UserId};
use benchledger_events::{EventBus, NotificationRequested};

use super::{NotificationEnvelope, Services};
use crate::error::{ServiceError, ServiceResult, StoreError};
use crate::store::{Store, StoreTx};

impl<S, B> Services<S, B>
where
    S: Store,
    B: EventBus<NotificationEnvelope>,
{
    /// Record an account handed over by the identity provider.
    ///
    /// A pending account is announced to every active superuser of the
    /// tenant.
    pub async fn register_user(
        &self,
        tenant_id: TenantId,
        input: NewUser,
        occurred_at: DateTime<Utc>,
    ) -> ServiceResult<User> {
        let user = User::register(tenant_id, UserId::new(), input, occurred_at)?;

        let mut tx = self.store().begin().await?;
        tx.insert_user(&user).await.map_err(|e| match e {
            StoreError::Duplicate(_) => {
                ServiceError::from(DomainError::validation("email", "Email is already registered"))
            }
            other => ServiceError::from(other),
        })?;
        let approvers: Vec<UserId> = if user.status == UserStatus::Pending {
            tx.list_users(tenant_id)
                .await?
                .into_iter()
                .filter(|u| u.role == Role::Superuser && u.status == UserStatus::Active)
                .map(|u| u.id)
                .collect()
        } else {
            Vec::new()
        };
        tx.commit().await?;

        tracing::info!(tenant_id = %tenant_id, user_id = %user.id, status = %user.status, "user registered");
        for approver in approvers {
            let notice =
                NotificationRequested::new_registration(approver, &user.name, &user.email, occurred_at);
            self.notify(tenant_id, notice);
        }
        Ok(user)
    }

    /// Accounts waiting for a decision, newest first.
    pub async fn list_pending_users(&self, principal: &Principal) -> ServiceResult<Vec<User>> {
        authorize(principal, &Permission::USERS_APPROVE)?;

        let mut tx = self.store().begin().await?;
        let mut pending: Vec<User> = tx
            .list_users(principal.tenant_id)
            .await?
            .into_iter()
            .filter(|u| u.status == UserStatus::Pending)
            .collect();
        tx.rollback().await?;

        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(pending)
    }

    #[instrument(skip(self, principal), fields(tenant_id = %principal.tenant_id), err)]
    pub async fn update_user_role(
        &self,
        principal: &Principal,
        user_id: UserId,
        role: Role,
    ) -> ServiceResult<User> {
        authorize(principal, &Permission::USERS_APPROVE)?;

        let mut tx = self.store().begin().await?;
        let mut user = tx
            .user_for_update(principal.tenant_id, user_id)
            .await?
            .ok_or(DomainError::NotFound)?;
        user.change_role(role)?;
        tx.update_user(&user).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, role = %role, "user role changed");
        Ok(user)
    }

    /// Send a free-text notification to one user of the tenant.
    #[instrument(skip(self, principal, text), fields(tenant_id = %principal.tenant_id), err)]
    pub async fn send_message(
        &self,
        principal: &Principal,
        recipient: UserId,
        text: &str,
        occurred_at: DateTime<Utc>,
    ) -> ServiceResult<()> {
        authorize(principal, &Permission::MESSAGE_SEND)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::validation("message", "Message is required").into());
        }

        let mut tx = self.store().begin().await?;
        let exists = tx.user_for_update(principal.tenant_id, recipient).await?.is_some();
        tx.rollback().await?;
        if !exists {
            return Err(DomainError::NotFound.into());
        }

        self.notify(
            principal.tenant_id,
            NotificationRequested::message(recipient, text, occurred_at),
        );
        Ok(())
    }

    #[instrument(skip(self, principal), fields(tenant_id = %principal.tenant_id), err)]
    pub async fn approve_user(
        &self,
        principal: &Principal,
        user_id: UserId,
        role: Role,
        occurred_at: DateTime<Utc>,
    ) -> ServiceResult<User> {
        authorize(principal, &Permission::USERS_APPROVE)?;

        let mut tx = self.store().begin().await?;
        let mut user = tx
            .user_for_update(principal.tenant_id, user_id)
            .await?
            .ok_or(DomainError::NotFound)?;
        user.approve(role)?;
        tx.update_user(&user).await?;
        tx.commit().await?;

        self.notify(
            principal.tenant_id,
            NotificationRequested::account_approved(user.id, occurred_at),
        );
        Ok(user)
    }

    #[instrument(skip(self, principal), fields(tenant_id = %principal.tenant_id), err)]
    pub async fn reject_user(&self, principal: &Principal, user_id: UserId) -> ServiceResult<User> {
        authorize(principal, &Permission::USERS_APPROVE)?;

        let mut tx = self.store().begin().await?;
        let mut user = tx
            .user_for_update(principal.tenant_id, user_id)
            .await?
            .ok_or(DomainError::NotFound)?;
        user.reject()?;
        tx.update_user(&user).await?;
        tx.commit().await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchledger_events::NotificationKind;

    use crate::services::testkit::{at, fixture, seed_user};

    fn applicant(email: &str) -> NewUser {
        NewUser {
            name: "New Hire".to_string(),
            email: email.to_string(),
            role: Role::User,
            status: UserStatus::Pending,
        }
    }

    #[tokio::test]
    async fn pending_registration_is_announced_to_active_superusers() {
        let f = fixture().await;
        let second = seed_user(
            f.services.store(),
            f.tenant_id,
            Role::Superuser,
            UserStatus::Active,
            "Owner",
        )
        .await;
        seed_user(f.services.store(), f.tenant_id, Role::Superuser, UserStatus::Pending, "Later")
            .await;

        f.services
            .register_user(f.tenant_id, applicant("hire@example.com"), at(2))
            .await
            .unwrap();

        let sent = f.published();
        let mut recipients: Vec<_> = sent.iter().map(|e| e.payload().recipient).collect();
        recipients.sort();
        let mut expected = vec![f.admin.user_id, second.id];
        expected.sort();
        assert_eq!(recipients, expected);
        assert!(sent.iter().all(|e| e.payload().kind == NotificationKind::NewRegistration));
        assert_eq!(
            sent[0].payload().message,
            "New user registered: New Hire (hire@example.com), awaiting approval."
        );
    }

    #[tokio::test]
    async fn active_registrations_are_not_announced() {
        let f = fixture().await;
        let mut input = applicant("boss@example.com");
        input.status = UserStatus::Active;
        f.services.register_user(f.tenant_id, input, at(2)).await.unwrap();
        assert!(f.published().is_empty());
    }

    #[tokio::test]
    async fn approval_activates_and_notifies() {
        let f = fixture().await;
        let pending = f
            .services
            .register_user(f.tenant_id, applicant("hire@example.com"), at(2))
            .await
            .unwrap();
        f.published();

        let user = f
            .services
            .approve_user(&f.admin, pending.id, Role::User, at(3))
            .await
            .unwrap();
        assert_eq!(user.status, UserStatus::Active);

        let sent = f.published();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload().recipient, pending.id);
        assert_eq!(sent[0].payload().kind, NotificationKind::AccountApproved);
    }

    #[tokio::test]
    async fn decided_accounts_cannot_be_decided_again() {
        let f = fixture().await;
        let pending = f
            .services
            .register_user(f.tenant_id, applicant("hire@example.com"), at(2))
            .await
            .unwrap();
        f.services.reject_user(&f.admin, pending.id).await.unwrap();
        f.published();

        let err = f
            .services
            .approve_user(&f.admin, pending.id, Role::User, at(3))
            .await
            .unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::InvalidTransition { .. })));
        assert!(f.published().is_empty());
    }

    #[tokio::test]
    async fn technicians_cannot_approve() {
        let f = fixture().await;
        let pending = f
            .services
            .register_user(f.tenant_id, applicant("hire@example.com"), at(2))
            .await
            .unwrap();
        let err = f.services.reject_user(&f.tech, pending.id).await.unwrap_err();
        assert_eq!(err.domain(), Some(&DomainError::Unauthorized));
    }

    #[tokio::test]
    async fn email_is_unique_per_tenant() {
        let f = fixture().await;
        f.services
            .register_user(f.tenant_id, applicant("hire@example.com"), at(2))
            .await
            .unwrap();

        let err = f
            .services
            .register_user(f.tenant_id, applicant("HIRE@example.com"), at(2))
            .await
            .unwrap_err();
        match err.domain() {
            Some(DomainError::Validation(errors)) => assert!(errors.field("email").is_some()),
            other => panic!("expected email validation error, got {other:?}"),
        }

        f.services
            .register_user(TenantId::new(), applicant("hire@example.com"), at(2))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn pending_users_are_listed_newest_first() {
        let f = fixture().await;
        let s = &f.services;
        let first = s.register_user(f.tenant_id, applicant("a@example.com"), at(2)).await.unwrap();
        let second = s.register_user(f.tenant_id, applicant("b@example.com"), at(3)).await.unwrap();
        let decided = s.register_user(f.tenant_id, applicant("c@example.com"), at(4)).await.unwrap();
        s.reject_user(&f.admin, decided.id).await.unwrap();

        let ids: Vec<_> = s
            .list_pending_users(&f.admin)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert!(s.list_pending_users(&f.tech).await.is_err());
    }

    #[tokio::test]
    async fn role_changes_apply_to_active_accounts() {
        let f = fixture().await;
        let s = &f.services;

        let promoted = s
            .update_user_role(&f.admin, f.tech.user_id, Role::Superuser)
            .await
            .unwrap();
        assert_eq!(promoted.role, Role::Superuser);

        let pending = s.register_user(f.tenant_id, applicant("a@example.com"), at(2)).await.unwrap();
        let err = s.update_user_role(&f.admin, pending.id, Role::User).await.unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::Conflict(_))));

        let err = s.update_user_role(&f.admin, UserId::new(), Role::User).await.unwrap_err();
        assert_eq!(err.domain(), Some(&DomainError::NotFound));
    }

    #[tokio::test]
    async fn superusers_can_message_existing_users() {
        let f = fixture().await;
        let s = &f.services;

        s.send_message(&f.admin, f.tech.user_id, "  Shop closes early today ", at(2))
            .await
            .unwrap();
        let sent = f.published();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload().kind, NotificationKind::Message);
        assert_eq!(sent[0].payload().message, "Shop closes early today");

        let err = s.send_message(&f.admin, UserId::new(), "hi", at(2)).await.unwrap_err();
        assert_eq!(err.domain(), Some(&DomainError::NotFound));
        let err = s.send_message(&f.tech, f.admin.user_id, "hi", at(2)).await.unwrap_err();
        assert_eq!(err.domain(), Some(&DomainError::Unauthorized));
        let err = s.send_message(&f.admin, f.tech.user_id, "   ", at(2)).await.unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::Validation(_))));
        assert!(f.published().is_empty());
    }
}
