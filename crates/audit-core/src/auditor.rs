//! Audit orchestrator.
//!
//! Runs the sampled row check, the recency check and the lag estimate in
//! that order, as an explicit state machine:
//!
//! ```text
//! Start -> SamplingRows -> CheckingRecency -> CheckingLag -> Passed
//!   \___________\_______________\_______________\_______-> Failed
//! ```
//!
//! Every step returns a `Result`; the first error moves the run to
//! [`AuditState::Failed`] and nothing after it is executed.

use crate::compare::{compare_rows, AbsencePolicy, RowComparison};
use crate::error::AuditError;
use crate::fetch::{RowFetcher, TableRef};
use crate::lag::{estimate_lag, DEFAULT_TIMESTAMP_COLUMN};
use crate::recency::{check_recent, DEFAULT_RECENT_LIMIT};
use crate::report::{AuditCounts, AuditReport};
use crate::row::RowId;
use crate::sample::{SampleSequence, DEFAULT_EXPONENT, DEFAULT_SAMPLE_COUNT};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

/// Everything one audit run needs besides the two connections.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditConfig {
    pub table: TableRef,
    /// Number of ids probed by the sampled row check.
    pub sample_count: u64,
    /// Exponent of the sampling curve.
    pub exponent: f64,
    /// Size of the recent-row window.
    pub recent_limit: usize,
    /// Last-modified column used for the lag estimate.
    pub timestamp_column: String,
    pub absence_policy: AbsencePolicy,
}

impl AuditConfig {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            sample_count: DEFAULT_SAMPLE_COUNT,
            exponent: DEFAULT_EXPONENT,
            recent_limit: DEFAULT_RECENT_LIMIT,
            timestamp_column: DEFAULT_TIMESTAMP_COLUMN.to_string(),
            absence_policy: AbsencePolicy::default(),
        }
    }

    pub fn with_sample_count(mut self, count: u64) -> Self {
        self.sample_count = count;
        self
    }

    pub fn with_recent_limit(mut self, limit: usize) -> Self {
        self.recent_limit = limit;
        self
    }

    pub fn with_timestamp_column(mut self, column: impl Into<String>) -> Self {
        self.timestamp_column = column.into();
        self
    }

    pub fn with_absence_policy(mut self, policy: AbsencePolicy) -> Self {
        self.absence_policy = policy;
        self
    }
}

/// Non-terminal stages, used to record where a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStage {
    Start,
    SamplingRows,
    CheckingRecency,
    CheckingLag,
}

#[derive(Debug)]
pub enum AuditState {
    Start,
    SamplingRows,
    CheckingRecency,
    CheckingLag,
    Passed,
    Failed { stage: AuditStage, cause: AuditError },
}

impl AuditState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuditState::Passed | AuditState::Failed { .. })
    }

    /// The stage to execute next, `None` once the run is over.
    pub fn stage(&self) -> Option<AuditStage> {
        match self {
            AuditState::Start => Some(AuditStage::Start),
            AuditState::SamplingRows => Some(AuditStage::SamplingRows),
            AuditState::CheckingRecency => Some(AuditStage::CheckingRecency),
            AuditState::CheckingLag => Some(AuditStage::CheckingLag),
            AuditState::Passed | AuditState::Failed { .. } => None,
        }
    }
}

/// Per-id outcome handed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    Absent,
    Match,
    Mismatch,
}

/// Progress callbacks. All methods default to doing nothing.
pub trait AuditObserver: Send {
    /// Called after every state transition, terminal states included.
    fn on_state(&mut self, _state: &AuditState) {}

    /// Called after each sampled id has been classified.
    fn on_sample(&mut self, _index: u64, _total: u64, _id: RowId, _outcome: SampleOutcome) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl AuditObserver for NoopObserver {}

/// One audit run over a primary and a downstream fetcher.
pub struct Auditor<'a, P: ?Sized, D: ?Sized> {
    primary: &'a P,
    downstream: &'a D,
    config: AuditConfig,
    observer: Box<dyn AuditObserver + 'a>,
}

impl<'a, P, D> Auditor<'a, P, D>
where
    P: RowFetcher + ?Sized,
    D: RowFetcher + ?Sized,
{
    pub fn new(primary: &'a P, downstream: &'a D, config: AuditConfig) -> Self {
        Self {
            primary,
            downstream,
            config,
            observer: Box::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: impl AuditObserver + 'a) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Run the audit to a terminal state.
    ///
    /// Failures are reported in the returned [`AuditReport`], never as an
    /// `Err`, so counts gathered before the failure stay available.
    pub async fn run(mut self) -> AuditReport {
        let started = Instant::now();
        let mut report = AuditReport::new(self.config.table.clone());
        let mut samples = None;
        let mut state = AuditState::Start;
        self.observer.on_state(&state);

        while let Some(stage) = state.stage() {
            let step = match stage {
                AuditStage::Start => {
                    SampleSequence::new(self.config.sample_count, self.config.exponent).map(|seq| {
                        samples = Some(seq);
                        AuditState::SamplingRows
                    })
                }
                AuditStage::SamplingRows => {
                    let seq = samples.take().unwrap_or_default();
                    self.sample_rows(seq, &mut report.sampling)
                        .await
                        .map(|()| AuditState::CheckingRecency)
                }
                AuditStage::CheckingRecency => self.check_recency(&mut report).await,
                AuditStage::CheckingLag => self.check_lag(&mut report).await,
            };
            state = match step {
                Ok(next) => next,
                Err(cause) => {
                    warn!(
                        "Audit of '{}' failed while {:?}: {}",
                        self.config.table, stage, cause
                    );
                    AuditState::Failed { stage, cause }
                }
            };
            self.observer.on_state(&state);
        }

        report.duration = started.elapsed();
        report.state = state;
        report
    }

    async fn sample_rows(
        &mut self,
        samples: SampleSequence,
        counts: &mut AuditCounts,
    ) -> Result<(), AuditError> {
        let table = &self.config.table;
        let total = samples.sample_count();
        info!(
            "Checking intermediate rows using f(i) = i^({}), i = [0, {}), up to id {}",
            samples.exponent(),
            total,
            samples.max_id()
        );

        for (index, id) in samples.enumerate() {
            let primary_row = self
                .primary
                .fetch_row(table, id)
                .await
                .map_err(AuditError::fetch(self.primary.side()))?;
            let downstream_row = self
                .downstream
                .fetch_row(table, id)
                .await
                .map_err(AuditError::fetch(self.downstream.side()))?;

            let index = index as u64;
            match compare_rows(id, primary_row, downstream_row, self.config.absence_policy) {
                RowComparison::Absent => {
                    counts.missing += 1;
                    self.observer.on_sample(index, total, id, SampleOutcome::Absent);
                }
                RowComparison::Match => {
                    counts.checked += 1;
                    self.observer.on_sample(index, total, id, SampleOutcome::Match);
                }
                RowComparison::Mismatch(mismatch) => {
                    counts.mismatched += 1;
                    self.observer.on_sample(index, total, id, SampleOutcome::Mismatch);
                    return Err(AuditError::SampleMismatch(mismatch));
                }
            }
        }

        info!("OK: {}, missing: {}", counts.checked, counts.missing);
        Ok(())
    }

    async fn check_recency(&mut self, report: &mut AuditReport) -> Result<AuditState, AuditError> {
        info!("Checking last {} rows", self.config.recent_limit);
        let recency = check_recent(
            self.primary,
            self.downstream,
            &self.config.table,
            self.config.recent_limit,
        )
        .await?;
        info!("OK: {}, missing: {}", recency.checked, recency.missing);
        report.recency = Some(recency);
        Ok(AuditState::CheckingLag)
    }

    async fn check_lag(&mut self, report: &mut AuditReport) -> Result<AuditState, AuditError> {
        let lag = estimate_lag(
            self.primary,
            self.downstream,
            &self.config.table,
            &self.config.timestamp_column,
        )
        .await?;
        info!("Current lag: {}", lag);
        report.lag = Some(lag);
        Ok(AuditState::Passed)
    }
}
