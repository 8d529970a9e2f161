use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use benchledger_auth::User;
use benchledger_core::UserId;
use benchledger_maintenance::MaintenanceJob;

use crate::KpiConfig;

/// Performance band for a total score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Band {
    Excellent,
    VeryGood,
    NeedsImprovement,
    Unacceptable,
}

impl Band {
    pub fn for_score(score: u32) -> Self {
        match score {
            90.. => Band::Excellent,
            80..=89 => Band::VeryGood,
            70..=79 => Band::NeedsImprovement,
            _ => Band::Unacceptable,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Band::Excellent => "Excellent",
            Band::VeryGood => "Very Good",
            Band::NeedsImprovement => "Needs Improvement",
            Band::Unacceptable => "Unacceptable",
        }
    }
}

impl core::fmt::Display for Band {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Reported figures for one technician. Rates are whole percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiStats {
    pub total_jobs: usize,
    pub active_jobs: usize,
    pub closed_this_month: usize,
    pub throughput: usize,
    pub on_time_rate: u32,
    pub sla_breach_rate: u32,
    /// Days, one decimal place.
    pub avg_resolution_days: f64,
    pub first_time_fix_rate: u32,
    pub total_score: u32,
    pub band: Band,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicianKpi {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub stats: KpiStats,
}

/// 00:00 UTC on the first day of `as_of`'s month.
pub fn month_start(as_of: DateTime<Utc>) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(as_of.year(), as_of.month(), 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or(as_of)
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

struct Metrics {
    on_time_rate: f64,
    sla_breach_rate: f64,
    throughput: f64,
    avg_resolution_days: f64,
    first_time_fix_rate: f64,
}

fn score(m: &Metrics, config: &KpiConfig) -> u32 {
    let t = &config.targets;
    let w = &config.weights;

    let on_time = (m.on_time_rate / t.on_time_rate * w.on_time).min(w.on_time);
    let sla = ((t.sla_breach_rate - m.sla_breach_rate.min(t.sla_breach_rate)) / t.sla_breach_rate
        * w.sla)
        .min(w.sla);
    let throughput = if m.throughput >= t.throughput {
        w.throughput
    } else {
        m.throughput / t.throughput * w.throughput
    };
    let resolution = if m.avg_resolution_days <= t.resolution_days {
        w.resolution
    } else {
        (w.resolution - (m.avg_resolution_days - t.resolution_days)).max(0.0)
    };
    let ftf = (m.first_time_fix_rate / t.first_time_fix_rate * w.first_time_fix)
        .min(w.first_time_fix);

    (on_time + sla + throughput + resolution + ftf).round().max(0.0) as u32
}

/// Score one technician's jobs.
pub fn compute(jobs: &[&MaintenanceJob], as_of: DateTime<Utc>, config: &KpiConfig) -> KpiStats {
    let start = month_start(as_of);

    let month: Vec<&MaintenanceJob> = jobs
        .iter()
        .copied()
        .filter(|j| j.created_at >= start)
        .collect();
    let closed: Vec<&MaintenanceJob> = month
        .iter()
        .copied()
        .filter(|j| j.status().is_closed())
        .collect();
    let active = jobs.iter().filter(|j| j.status().is_active()).count();

    let resolution: Vec<f64> = closed.iter().filter_map(|j| j.resolution_days()).collect();
    let on_time = resolution.iter().filter(|d| **d <= config.sla_days).count();
    let fixed = closed.iter().filter(|j| j.status().is_fixed()).count();

    let avg_resolution_days = if resolution.is_empty() {
        0.0
    } else {
        resolution.iter().sum::<f64>() / resolution.len() as f64
    };

    let metrics = Metrics {
        on_time_rate: percent(on_time, closed.len()),
        sla_breach_rate: percent(closed.len() - on_time, closed.len()),
        throughput: month.len() as f64,
        avg_resolution_days,
        first_time_fix_rate: percent(fixed, closed.len()),
    };
    let total_score = score(&metrics, config);

    KpiStats {
        total_jobs: jobs.len(),
        active_jobs: active,
        closed_this_month: closed.len(),
        throughput: month.len(),
        on_time_rate: metrics.on_time_rate.round() as u32,
        sla_breach_rate: metrics.sla_breach_rate.round() as u32,
        avg_resolution_days: (metrics.avg_resolution_days * 10.0).round() / 10.0,
        first_time_fix_rate: metrics.first_time_fix_rate.round() as u32,
        total_score,
        band: Band::for_score(total_score),
    }
}

/// One row per active technician, in the order `users` is given.
pub fn report(
    users: &[User],
    jobs: &[MaintenanceJob],
    as_of: DateTime<Utc>,
    config: &KpiConfig,
) -> Vec<TechnicianKpi> {
    let mut by_assignee: HashMap<UserId, Vec<&MaintenanceJob>> = HashMap::new();
    for job in jobs {
        if let Some(user_id) = job.assigned_user {
            by_assignee.entry(user_id).or_default().push(job);
        }
    }

    users
        .iter()
        .filter(|u| u.is_technician())
        .map(|u| {
            let assigned = by_assignee.get(&u.id).map(Vec::as_slice).unwrap_or(&[]);
            TechnicianKpi {
                user_id: u.id,
                name: u.name.clone(),
                email: u.email.clone(),
                stats: compute(assigned, as_of, config),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchledger_auth::{NewUser, Role, UserStatus};
    use benchledger_core::{CustomerId, JobId, TenantId};
    use benchledger_maintenance::{HandlerKind, JobStatus, NewJob, ProductInfo};
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    fn received(user: UserId, when: DateTime<Utc>) -> MaintenanceJob {
        let input = NewJob {
            customer_id: Some(CustomerId::new()),
            product: ProductInfo {
                product_id: None,
                name: "Laptop".to_string(),
                brand: None,
                model: None,
                serial_number: None,
            },
            issue_description: "Broken hinge".to_string(),
            handler: HandlerKind::InHouse,
            supplier_id: None,
            vendor_name: None,
            service_fee: None,
            notes: None,
            assigned_user: None,
        };
        MaintenanceJob::intake(TenantId::new(), JobId::new(), input, Some(user), when).unwrap()
    }

    fn delivered(user: UserId, when: DateTime<Utc>, days: i64) -> MaintenanceJob {
        let mut job = received(user, when);
        job.transition(JobStatus::InProgress, when).unwrap();
        job.transition(JobStatus::Repaired, when + Duration::days(days)).unwrap();
        job.transition(JobStatus::Delivered, when + Duration::days(days)).unwrap();
        job
    }

    fn cancelled(user: UserId, when: DateTime<Utc>) -> MaintenanceJob {
        let mut job = received(user, when);
        job.transition(JobStatus::Cancelled, when + Duration::days(1)).unwrap();
        job
    }

    fn technician(status: UserStatus, role: Role) -> User {
        User::register(
            TenantId::new(),
            UserId::new(),
            NewUser {
                name: "Tech".to_string(),
                email: "tech@example.com".to_string(),
                role,
                status,
            },
            at(1, 0),
        )
        .unwrap()
    }

    fn stats(jobs: &[MaintenanceJob], as_of: DateTime<Utc>) -> KpiStats {
        let refs: Vec<&MaintenanceJob> = jobs.iter().collect();
        compute(&refs, as_of, &KpiConfig::default())
    }

    #[test]
    fn month_start_is_first_of_month_utc() {
        assert_eq!(month_start(at(17, 13)), at(1, 0));
    }

    #[test]
    fn ten_fast_deliveries_score_one_hundred() {
        let user = UserId::new();
        let jobs: Vec<_> = (1..=10).map(|d| delivered(user, at(d, 9), 2)).collect();

        let s = stats(&jobs, at(25, 12));
        assert_eq!(s.closed_this_month, 10);
        assert_eq!(s.throughput, 10);
        assert_eq!(s.on_time_rate, 100);
        assert_eq!(s.sla_breach_rate, 0);
        assert_eq!(s.avg_resolution_days, 2.0);
        assert_eq!(s.first_time_fix_rate, 100);
        assert_eq!(s.total_score, 100);
        assert_eq!(s.band, Band::Excellent);
    }

    #[test]
    fn no_jobs_keeps_sla_and_resolution_points_only() {
        let s = stats(&[], at(10, 0));
        assert_eq!(s.closed_this_month, 0);
        assert_eq!(s.on_time_rate, 0);
        assert_eq!(s.total_score, 25);
        assert_eq!(s.band, Band::Unacceptable);
    }

    #[test]
    fn late_and_cancelled_jobs_lower_rates() {
        let user = UserId::new();
        let jobs = vec![
            delivered(user, at(2, 0), 1),
            delivered(user, at(3, 0), 2),
            delivered(user, at(4, 0), 9),
            cancelled(user, at(5, 0)),
        ];

        let s = stats(&jobs, at(28, 0));
        assert_eq!(s.closed_this_month, 4);
        assert_eq!(s.on_time_rate, 50);
        assert_eq!(s.sla_breach_rate, 50);
        assert_eq!(s.first_time_fix_rate, 75);
        assert_eq!(s.avg_resolution_days, 4.0);
    }

    #[test]
    fn earlier_months_count_toward_totals_only() {
        let user = UserId::new();
        let february = Utc.with_ymd_and_hms(2026, 2, 20, 0, 0, 0).unwrap();
        let jobs = vec![
            delivered(user, february, 1),
            received(user, february),
            received(user, at(3, 0)),
        ];

        let s = stats(&jobs, at(15, 0));
        assert_eq!(s.total_jobs, 3);
        assert_eq!(s.active_jobs, 2);
        assert_eq!(s.throughput, 1);
        assert_eq!(s.closed_this_month, 0);
    }

    #[test]
    fn slow_average_loses_resolution_points() {
        let user = UserId::new();
        let jobs: Vec<_> = (1..=10).map(|d| delivered(user, at(d, 0), 10)).collect();
        let s = stats(&jobs, at(28, 0));
        // on-time 0, sla 0, throughput 20, resolution 15 - 3, ftf 20
        assert_eq!(s.total_score, 52);
    }

    #[test]
    fn bands_follow_thresholds() {
        assert_eq!(Band::for_score(90), Band::Excellent);
        assert_eq!(Band::for_score(89), Band::VeryGood);
        assert_eq!(Band::for_score(80), Band::VeryGood);
        assert_eq!(Band::for_score(79), Band::NeedsImprovement);
        assert_eq!(Band::for_score(70), Band::NeedsImprovement);
        assert_eq!(Band::for_score(69), Band::Unacceptable);
        assert_eq!(Band::VeryGood.label(), "Very Good");
    }

    #[test]
    fn report_covers_active_technicians_only() {
        let tech = technician(UserStatus::Active, Role::User);
        let idle = technician(UserStatus::Active, Role::User);
        let boss = technician(UserStatus::Active, Role::Superuser);
        let pending = technician(UserStatus::Pending, Role::User);

        let jobs = vec![delivered(tech.id, at(2, 0), 1), delivered(boss.id, at(2, 0), 1)];
        let rows = report(
            &[tech.clone(), idle.clone(), boss, pending],
            &jobs,
            at(20, 0),
            &KpiConfig::default(),
        );

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user_id, tech.id);
        assert_eq!(rows[0].stats.total_jobs, 1);
        assert_eq!(rows[1].user_id, idle.id);
        assert_eq!(rows[1].stats.total_jobs, 0);
    }

    proptest! {
        /// Property: scores stay within 0..=100 for any mix of outcomes, and
        /// recomputing over the same snapshot gives the same result.
        #[test]
        fn score_is_bounded_and_deterministic(
            outcomes in prop::collection::vec((1u32..28, 0i64..30, any::<bool>()), 0..30)
        ) {
            let user = UserId::new();
            let jobs: Vec<_> = outcomes
                .iter()
                .map(|(day, days, ok)| {
                    if *ok { delivered(user, at(*day, 0), *days) } else { cancelled(user, at(*day, 0)) }
                })
                .collect();

            let first = stats(&jobs, at(28, 23));
            prop_assert!(first.total_score <= 100);
            prop_assert_eq!(first.band, Band::for_score(first.total_score));
            prop_assert_eq!(first, stats(&jobs, at(28, 23)));
        }
    }
}
