//! Technician performance scoring.
//!
//! Pure functions over a snapshot of users and jobs; the same snapshot and
//! `as_of` always produce the same report.

pub mod config;
pub mod score;

pub use config::{KpiConfig, KpiTargets, KpiWeights};
pub use score::{Band, KpiStats, TechnicianKpi, compute, month_start, report};
