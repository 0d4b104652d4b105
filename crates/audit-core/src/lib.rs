//! Consistency audit between a primary table and its downstream copy.
//!
//! Three checks run in order against two [`RowFetcher`]s:
//!
//! 1. sampled rows: ids from a deterministic [`SampleSequence`] are looked up
//!    on both sides and compared column by column;
//! 2. recent rows: the newest ids visible downstream are re-read from both
//!    sides and must be identical;
//! 3. lag: the difference between the newest last-modified timestamps.
//!
//! # Example
//!
//! ```ignore
//! use replica_audit_core::{AuditConfig, Auditor, TableRef};
//!
//! let config = AuditConfig::new(TableRef::new("users"));
//! let report = Auditor::new(&primary, &replica, config).run().await;
//! assert!(report.is_passed());
//! ```

pub mod auditor;
pub mod compare;
pub mod error;
pub mod fetch;
pub mod lag;
pub mod recency;
pub mod report;
pub mod row;
pub mod sample;
pub mod testing;

pub use auditor::{
    AuditConfig, AuditObserver, AuditStage, AuditState, Auditor, NoopObserver, SampleOutcome,
};
pub use compare::{compare_rows, AbsencePolicy, MismatchKind, RowComparison, RowMismatch};
pub use error::{error_chain, AuditError, BoxError, FetchError};
pub use fetch::{RowFetcher, Side, TableRef};
pub use lag::{estimate_lag, Lag, DEFAULT_TIMESTAMP_COLUMN};
pub use recency::{check_recent, RecencyReport, DEFAULT_RECENT_LIMIT};
pub use report::{AuditCounts, AuditReport, AuditSummary};
pub use row::{ColumnDiff, Row, RowId, Value, ID_COLUMN};
pub use sample::{SampleSequence, DEFAULT_EXPONENT, DEFAULT_SAMPLE_COUNT};
