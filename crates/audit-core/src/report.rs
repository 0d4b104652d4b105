//! Audit report types.

use crate::auditor::{AuditStage, AuditState};
use crate::compare::RowMismatch;
use crate::error::{error_chain, AuditError};
use crate::fetch::TableRef;
use crate::lag::Lag;
use crate::recency::RecencyReport;
use serde::Serialize;
use std::time::Duration;

/// Counters of the sampled row check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuditCounts {
    /// Ids whose rows matched on both sides.
    pub checked: u64,
    /// Ids with no row to compare.
    pub missing: u64,
    /// Ids whose rows diverged. At most one, since the run stops there.
    pub mismatched: u64,
}

/// Result of one audit run.
#[derive(Debug)]
pub struct AuditReport {
    pub table: TableRef,
    pub sampling: AuditCounts,
    /// Present once the recency check has succeeded.
    pub recency: Option<RecencyReport>,
    /// Present once the lag has been estimated.
    pub lag: Option<Lag>,
    /// Terminal state of the run.
    pub state: AuditState,
    pub duration: Duration,
}

impl AuditReport {
    pub(crate) fn new(table: TableRef) -> Self {
        Self {
            table,
            sampling: AuditCounts::default(),
            recency: None,
            lag: None,
            state: AuditState::Start,
            duration: Duration::ZERO,
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self.state, AuditState::Passed)
    }

    /// The error that ended the run, if it failed.
    pub fn failure(&self) -> Option<(AuditStage, &AuditError)> {
        match &self.state {
            AuditState::Failed { stage, cause } => Some((*stage, cause)),
            _ => None,
        }
    }

    /// Serializable view of the report.
    pub fn summary(&self) -> AuditSummary<'_> {
        let failure = self.failure();
        AuditSummary {
            table: &self.table,
            verdict: if self.is_passed() { "passed" } else { "failed" },
            failed_stage: failure.map(|(stage, _)| stage),
            error_class: failure.map(|(_, cause)| cause.class()),
            cause: failure.map(|(_, cause)| error_chain(cause)),
            mismatch: failure.and_then(|(_, cause)| cause.mismatch()),
            sampling: self.sampling,
            recency: self.recency.as_ref(),
            lag: self.lag.as_ref(),
            duration_ms: self.duration.as_millis() as u64,
        }
    }
}

/// JSON-friendly summary of an [`AuditReport`].
#[derive(Debug, Serialize)]
pub struct AuditSummary<'a> {
    pub table: &'a TableRef,
    pub verdict: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<AuditStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch: Option<&'a RowMismatch>,
    pub sampling: AuditCounts,
    pub recency: Option<&'a RecencyReport>,
    pub lag: Option<&'a Lag>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_of_failed_report() {
        let mut report = AuditReport::new(TableRef::new("users"));
        report.sampling.checked = 3;
        report.state = AuditState::Failed {
            stage: AuditStage::CheckingRecency,
            cause: AuditError::RecencyCount {
                primary: 10,
                downstream: 9,
            },
        };

        assert!(!report.is_passed());
        let json = serde_json::to_value(report.summary()).unwrap();
        assert_eq!(json["verdict"], "failed");
        assert_eq!(json["failed_stage"], "checking_recency");
        assert_eq!(json["error_class"], "recency_count");
        assert_eq!(json["sampling"]["checked"], 3);
        assert!(json.get("mismatch").is_none());
    }

    #[test]
    fn test_summary_of_passed_report() {
        let mut report = AuditReport::new(TableRef::new("users").with_schema("app"));
        report.state = AuditState::Passed;
        let json = serde_json::to_value(report.summary()).unwrap();
        assert_eq!(json["verdict"], "passed");
        assert_eq!(json["table"]["schema"], "app");
        assert!(json.get("cause").is_none());
    }
}
