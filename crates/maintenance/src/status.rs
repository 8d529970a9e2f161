use serde::{Deserialize, Serialize};

/// Repair job status.
///
/// ```text
/// Received ─▶ InProgress ⇄ WaitingForParts
///                 │
///                 ▼
///             Repaired ─▶ Delivered
///
/// any non-terminal ─▶ Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Received,
    InProgress,
    WaitingForParts,
    Repaired,
    Delivered,
    Cancelled,
}

/// Allowed `(from, to)` pairs, excluding cancellation (see [`JobStatus::can_transition_to`]).
const TRANSITIONS: &[(JobStatus, JobStatus)] = &[
    (JobStatus::Received, JobStatus::InProgress),
    (JobStatus::InProgress, JobStatus::WaitingForParts),
    (JobStatus::WaitingForParts, JobStatus::InProgress),
    (JobStatus::InProgress, JobStatus::Repaired),
    (JobStatus::Repaired, JobStatus::Delivered),
];

impl JobStatus {
    pub const ALL: [JobStatus; 6] = [
        JobStatus::Received,
        JobStatus::InProgress,
        JobStatus::WaitingForParts,
        JobStatus::Repaired,
        JobStatus::Delivered,
        JobStatus::Cancelled,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Delivered | JobStatus::Cancelled)
    }

    /// Still on the bench.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            JobStatus::Received | JobStatus::InProgress | JobStatus::WaitingForParts
        )
    }

    /// Counted as closed by the KPI report (a repaired job is done from the technician's side).
    pub fn is_closed(self) -> bool {
        matches!(
            self,
            JobStatus::Repaired | JobStatus::Delivered | JobStatus::Cancelled
        )
    }

    /// Closed with a working unit.
    pub fn is_fixed(self) -> bool {
        matches!(self, JobStatus::Repaired | JobStatus::Delivered)
    }

    pub fn can_transition_to(self, target: JobStatus) -> bool {
        if target == JobStatus::Cancelled {
            return !self.is_terminal();
        }
        TRANSITIONS.contains(&(self, target))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Received => "RECEIVED",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::WaitingForParts => "WAITING_FOR_PARTS",
            JobStatus::Repaired => "REPAIRED",
            JobStatus::Delivered => "DELIVERED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        JobStatus::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_allow_nothing() {
        for from in [JobStatus::Delivered, JobStatus::Cancelled] {
            for to in JobStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn every_non_terminal_state_can_cancel() {
        for from in JobStatus::ALL.into_iter().filter(|s| !s.is_terminal()) {
            assert!(from.can_transition_to(JobStatus::Cancelled));
        }
    }

    #[test]
    fn same_state_is_never_a_transition() {
        for s in JobStatus::ALL {
            assert!(!s.can_transition_to(s));
        }
    }

    #[test]
    fn waiting_for_parts_returns_to_the_bench_before_repair() {
        assert!(JobStatus::InProgress.can_transition_to(JobStatus::WaitingForParts));
        assert!(JobStatus::WaitingForParts.can_transition_to(JobStatus::InProgress));
        assert!(!JobStatus::WaitingForParts.can_transition_to(JobStatus::Repaired));
        assert!(!JobStatus::Received.can_transition_to(JobStatus::Repaired));
    }

    #[test]
    fn active_and_closed_partition_the_states() {
        for s in JobStatus::ALL {
            assert_ne!(s.is_active(), s.is_closed(), "{s}");
        }
    }

    #[test]
    fn parse_accepts_column_values() {
        assert_eq!(JobStatus::parse("WAITING_FOR_PARTS"), Some(JobStatus::WaitingForParts));
        assert_eq!(JobStatus::parse("COMPLETED"), None);
    }
}
