use chrono::{DateTime, Utc};
use tracing::instrument;

use benchledger_auth::{Permission, Principal, authorize};
use benchledger_events::EventBus;
use benchledger_kpi::{TechnicianKpi, report};

use super::{NotificationEnvelope, Services};
use crate::error::ServiceResult;
use crate::store::{Store, StoreTx};

impl<S, B> Services<S, B>
where
    S: Store,
    B: EventBus<NotificationEnvelope>,
{
    /// Per-technician performance for the month containing `as_of`, ordered
    /// by technician name.
    ///
    /// Users and jobs are read in one transaction so every row reflects the
    /// same snapshot.
    #[instrument(skip(self, principal), fields(tenant_id = %principal.tenant_id), err)]
    pub async fn get_kpi_data(
        &self,
        principal: &Principal,
        as_of: DateTime<Utc>,
    ) -> ServiceResult<Vec<TechnicianKpi>> {
        authorize(principal, &Permission::KPI_READ)?;

        let mut tx = self.store().begin().await?;
        let mut users = tx.list_users(principal.tenant_id).await?;
        let jobs = tx.list_jobs(principal.tenant_id).await?;
        tx.rollback().await?;

        users.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(report(&users, &jobs, as_of, &self.kpi))
    }
}
