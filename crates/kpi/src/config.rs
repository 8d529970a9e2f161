use serde::{Deserialize, Serialize};

use benchledger_core::{DomainResult, ValidationErrors};

/// Score weights. Must add up to 100 so a perfect technician scores 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KpiWeights {
    pub on_time: f64,
    pub sla: f64,
    pub throughput: f64,
    pub resolution: f64,
    pub first_time_fix: f64,
}

impl Default for KpiWeights {
    fn default() -> Self {
        Self {
            on_time: 35.0,
            sla: 10.0,
            throughput: 20.0,
            resolution: 15.0,
            first_time_fix: 20.0,
        }
    }
}

impl KpiWeights {
    pub fn sum(&self) -> f64 {
        self.on_time + self.sla + self.throughput + self.resolution + self.first_time_fix
    }
}

/// What "meeting the bar" means for each metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KpiTargets {
    /// Percent of closed jobs resolved within the SLA.
    pub on_time_rate: f64,
    /// Highest acceptable SLA breach percentage.
    pub sla_breach_rate: f64,
    /// Jobs opened per month.
    pub throughput: f64,
    /// Average days from receipt to resolution.
    pub resolution_days: f64,
    /// Percent of closed jobs that ended fixed.
    pub first_time_fix_rate: f64,
}

impl Default for KpiTargets {
    fn default() -> Self {
        Self {
            on_time_rate: 95.0,
            sla_breach_rate: 5.0,
            throughput: 10.0,
            resolution_days: 7.0,
            first_time_fix_rate: 90.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KpiConfig {
    /// A job resolved within this many days of receipt is on time.
    pub sla_days: f64,
    pub targets: KpiTargets,
    pub weights: KpiWeights,
}

impl Default for KpiConfig {
    fn default() -> Self {
        Self {
            sla_days: 5.0,
            targets: KpiTargets::default(),
            weights: KpiWeights::default(),
        }
    }
}

impl KpiConfig {
    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = ValidationErrors::new();

        if self.sla_days <= 0.0 {
            errors.add("kpi.sla_days", "SLA days must be positive");
        }

        let t = &self.targets;
        for (field, value) in [
            ("kpi.targets.on_time_rate", t.on_time_rate),
            ("kpi.targets.sla_breach_rate", t.sla_breach_rate),
            ("kpi.targets.throughput", t.throughput),
            ("kpi.targets.resolution_days", t.resolution_days),
            ("kpi.targets.first_time_fix_rate", t.first_time_fix_rate),
        ] {
            if value <= 0.0 {
                errors.add(field, "Target must be positive");
            }
        }

        let w = &self.weights;
        if [w.on_time, w.sla, w.throughput, w.resolution, w.first_time_fix]
            .iter()
            .any(|v| *v < 0.0)
        {
            errors.add("kpi.weights", "Weights cannot be negative");
        }
        if (w.sum() - 100.0).abs() > 1e-9 {
            errors.add("kpi.weights", format!("Weights must add up to 100 (got {})", w.sum()));
        }

        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchledger_core::DomainError;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(KpiWeights::default().sum(), 100.0);
        assert!(KpiConfig::default().validate().is_ok());
    }

    #[test]
    fn weights_must_total_one_hundred() {
        let mut config = KpiConfig::default();
        config.weights.on_time = 25.0;
        let DomainError::Validation(errors) = config.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert!(errors.field("kpi.weights").is_some());
    }

    #[test]
    fn zero_targets_are_rejected() {
        let mut config = KpiConfig::default();
        config.targets.throughput = 0.0;
        config.sla_days = 0.0;
        let DomainError::Validation(errors) = config.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors.fields().collect::<Vec<_>>(),
            vec!["kpi.sla_days", "kpi.targets.throughput"]
        );
    }
}
