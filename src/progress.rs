//! Progress logging for the audit CLI.

use replica_audit_core::{AuditObserver, AuditState, RowId, SampleOutcome};
use tracing::{debug, info};

/// Number of progress lines printed over the sampled row check.
const PROGRESS_STEPS: u64 = 10;

/// Observer that reports audit progress through `tracing`.
#[derive(Debug, Default)]
pub struct LoggingObserver {
    matched: u64,
    absent: u64,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sampled ids classified so far, as `(matched, absent)`.
    pub fn counts(&self) -> (u64, u64) {
        (self.matched, self.absent)
    }
}

/// Whether the sample at `index` closes one of the progress steps.
pub fn is_progress_point(index: u64, total: u64) -> bool {
    let step = (total / PROGRESS_STEPS).max(1);
    let done = index + 1;
    done % step == 0 && done < total
}

impl AuditObserver for LoggingObserver {
    fn on_state(&mut self, state: &AuditState) {
        match state {
            AuditState::Failed { stage, .. } => debug!("Audit state: failed in {:?}", stage),
            other => debug!("Audit state: {:?}", other),
        }
    }

    fn on_sample(&mut self, index: u64, total: u64, id: RowId, outcome: SampleOutcome) {
        match outcome {
            SampleOutcome::Match => self.matched += 1,
            SampleOutcome::Absent => self.absent += 1,
            SampleOutcome::Mismatch => return,
        }
        if is_progress_point(index, total) {
            info!(
                "Sampled {}/{} ids (up to id {}), OK: {}, missing: {}",
                index + 1,
                total,
                id,
                self.matched,
                self.absent
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_points() {
        let points: Vec<u64> = (0..100).filter(|&i| is_progress_point(i, 100)).collect();
        assert_eq!(points, vec![9, 19, 29, 39, 49, 59, 69, 79, 89]);
    }

    #[test]
    fn test_progress_points_small_total() {
        let points: Vec<u64> = (0..3).filter(|&i| is_progress_point(i, 3)).collect();
        assert_eq!(points, vec![0, 1]);
    }

    #[test]
    fn test_observer_counts() {
        let mut observer = LoggingObserver::new();
        observer.on_sample(0, 3, 0, SampleOutcome::Match);
        observer.on_sample(1, 3, 1, SampleOutcome::Absent);
        observer.on_sample(2, 3, 5, SampleOutcome::Mismatch);
        assert_eq!(observer.counts(), (1, 1));
    }
}
