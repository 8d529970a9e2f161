use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use benchledger_auth::{Permission, Principal, UserStatus, authorize, authorize_job_actor};
use benchledger_core::{DomainError, JobId, TenantId, UserId};
use benchledger_events::{EventBus, NotificationRequested};
use benchledger_maintenance::{JobStatus, MaintenanceJob, NewJob};

use super::parties::{ensure_customer, ensure_supplier};
use super::{NotificationEnvelope, Services, apply_stock_delta};
use crate::error::ServiceResult;
use crate::store::{Store, StoreTx};

/// Command: move a job to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionJob {
    pub job_id: JobId,
    pub target: JobStatus,
    pub occurred_at: DateTime<Utc>,
}

async fn ensure_assignable<T: StoreTx>(
    tx: &mut T,
    tenant_id: TenantId,
    user_id: UserId,
) -> ServiceResult<()> {
    match tx.user_for_update(tenant_id, user_id).await? {
        Some(user) if user.status == UserStatus::Active => Ok(()),
        _ => Err(DomainError::validation("assigned_user", "Assigned user not found").into()),
    }
}

async fn locked_job<T: StoreTx>(
    tx: &mut T,
    tenant_id: TenantId,
    job_id: JobId,
) -> ServiceResult<MaintenanceJob> {
    Ok(tx
        .job_for_update(tenant_id, job_id)
        .await?
        .ok_or(DomainError::NotFound)?)
}

impl<S, B> Services<S, B>
where
    S: Store,
    B: EventBus<NotificationEnvelope>,
{
    /// Intake a job in `Received`.
    ///
    /// A technician is assigned to the job they create; a superuser may name
    /// an assignee, who is notified.
    #[instrument(skip(self, principal, input), fields(tenant_id = %principal.tenant_id), err)]
    pub async fn create_job(
        &self,
        principal: &Principal,
        input: NewJob,
        occurred_at: DateTime<Utc>,
    ) -> ServiceResult<MaintenanceJob> {
        authorize(principal, &Permission::MAINTENANCE_CREATE)?;
        let tenant_id = principal.tenant_id;
        let admin = authorize(principal, &Permission::MAINTENANCE_ADMIN).is_ok();
        let assignee = if admin {
            input.assigned_user
        } else {
            Some(principal.user_id)
        };

        let job = MaintenanceJob::intake(tenant_id, JobId::new(), input, assignee, occurred_at)?;

        let mut tx = self.store().begin().await?;
        ensure_customer(&mut tx, tenant_id, job.customer_id).await?;
        if let Some(supplier_id) = job.handler.supplier_id() {
            ensure_supplier(&mut tx, tenant_id, supplier_id).await?;
        }
        if let Some(product_id) = job.product.product_id {
            match tx.product_for_update(tenant_id, product_id).await? {
                Some(product) if !product.is_deleted() => {}
                _ => return Err(DomainError::NotFound.into()),
            }
        }
        if let (true, Some(user_id)) = (admin, assignee) {
            ensure_assignable(&mut tx, tenant_id, user_id).await?;
        }
        tx.insert_job(&job).await?;
        tx.commit().await?;

        tracing::info!(job_id = %job.id, assigned_user = ?job.assigned_user, "maintenance job received");

        if let Some(user_id) = job.assigned_user.filter(|u| *u != principal.user_id) {
            self.notify(
                tenant_id,
                NotificationRequested::maintenance_assigned(
                    user_id,
                    job.id,
                    &job.product.name,
                    occurred_at,
                ),
            );
        }
        Ok(job)
    }

    /// Move a job through its workflow, applying its stock effect in the
    /// same transaction.
    #[instrument(
        skip(self, principal, command),
        fields(
            tenant_id = %principal.tenant_id,
            job_id = %command.job_id,
            target = %command.target
        ),
        err
    )]
    pub async fn transition_job(
        &self,
        principal: &Principal,
        command: TransitionJob,
    ) -> ServiceResult<MaintenanceJob> {
        authorize(principal, &Permission::MAINTENANCE_TRANSITION)?;
        let tenant_id = principal.tenant_id;

        let mut tx = self.store().begin().await?;
        let mut job = locked_job(&mut tx, tenant_id, command.job_id).await?;
        authorize_job_actor(principal, job.assigned_user)?;

        let transition = job.transition(command.target, command.occurred_at)?;
        if let Some(effect) = &transition.stock {
            apply_stock_delta(
                &mut tx,
                tenant_id,
                effect.product_id,
                effect.delta,
                effect.kind,
                &effect.reference,
                command.occurred_at,
            )
            .await?;
        }
        tx.update_job(&job).await?;
        tx.commit().await?;

        tracing::info!(
            from = %transition.from,
            to = %transition.to,
            stock_out = job.stock_out(),
            "maintenance job transitioned"
        );

        if let Some(assignee) = job.assigned_user.filter(|u| *u != principal.user_id) {
            self.notify(
                tenant_id,
                NotificationRequested::maintenance_status_changed(
                    assignee,
                    job.id,
                    &job.product.name,
                    transition.to,
                    command.occurred_at,
                ),
            );
        }
        Ok(job)
    }

    /// Hand a job to someone else, or to nobody. Closed jobs keep their assignee.
    #[instrument(skip(self, principal), fields(tenant_id = %principal.tenant_id), err)]
    pub async fn assign_job(
        &self,
        principal: &Principal,
        job_id: JobId,
        assignee: Option<UserId>,
        occurred_at: DateTime<Utc>,
    ) -> ServiceResult<MaintenanceJob> {
        authorize(principal, &Permission::MAINTENANCE_ADMIN)?;
        let tenant_id = principal.tenant_id;

        let mut tx = self.store().begin().await?;
        let mut job = locked_job(&mut tx, tenant_id, job_id).await?;
        let previous = job.assigned_user;
        if let Some(user_id) = assignee {
            ensure_assignable(&mut tx, tenant_id, user_id).await?;
        }
        job.assign(assignee)?;
        tx.update_job(&job).await?;
        tx.commit().await?;

        if let Some(user_id) = assignee.filter(|u| Some(*u) != previous && *u != principal.user_id)
        {
            self.notify(
                tenant_id,
                NotificationRequested::maintenance_assigned(
                    user_id,
                    job.id,
                    &job.product.name,
                    occurred_at,
                ),
            );
        }
        Ok(job)
    }

    pub async fn update_service_fee(
        &self,
        principal: &Principal,
        job_id: JobId,
        fee: u64,
    ) -> ServiceResult<MaintenanceJob> {
        authorize(principal, &Permission::MAINTENANCE_ADMIN)?;

        let mut tx = self.store().begin().await?;
        let mut job = locked_job(&mut tx, principal.tenant_id, job_id).await?;
        job.set_service_fee(fee)?;
        tx.update_job(&job).await?;
        tx.commit().await?;
        Ok(job)
    }

    /// One job, if the caller may see it. Hidden jobs read as `NotFound`.
    pub async fn get_job(
        &self,
        principal: &Principal,
        job_id: JobId,
    ) -> ServiceResult<MaintenanceJob> {
        authorize(principal, &Permission::MAINTENANCE_TRANSITION)?;
        let sees_everything = authorize(principal, &Permission::MAINTENANCE_TRANSITION_ANY).is_ok();

        let mut tx = self.store().begin().await?;
        let job = tx.job(principal.tenant_id, job_id).await?;
        tx.rollback().await?;

        Ok(job
            .filter(|job| job.is_visible_to(principal.user_id, sees_everything))
            .ok_or(DomainError::NotFound)?)
    }

    /// Jobs the caller may see, newest first. Technicians see their own and
    /// unassigned jobs.
    pub async fn list_jobs(&self, principal: &Principal) -> ServiceResult<Vec<MaintenanceJob>> {
        authorize(principal, &Permission::MAINTENANCE_TRANSITION)?;
        let sees_everything = authorize(principal, &Permission::MAINTENANCE_TRANSITION_ANY).is_ok();

        let mut tx = self.store().begin().await?;
        let mut jobs: Vec<MaintenanceJob> = tx
            .list_jobs(principal.tenant_id)
            .await?
            .into_iter()
            .filter(|job| job.is_visible_to(principal.user_id, sees_everything))
            .collect();
        tx.rollback().await?;

        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(jobs)
    }
}
