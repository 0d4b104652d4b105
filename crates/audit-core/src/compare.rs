//! Row comparison logic.

use crate::row::{ColumnDiff, Row, RowId};
use serde::Serialize;
use std::fmt;

/// Which rows count as "missing" rather than diverging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsencePolicy {
    /// Only an id absent on both sides is missing. A row present on one side
    /// only is a mismatch.
    #[default]
    BothAbsent,
    /// An id absent on either side is missing. Use while a replica is still
    /// catching up and one-sided rows are expected.
    EitherAbsent,
}

/// How two rows for the same id diverge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    /// Downstream has the row, primary does not.
    MissingOnPrimary,
    /// Primary has the row, downstream does not.
    MissingOnDownstream,
    /// Both rows exist and differ in at least one column.
    ColumnsDiffer,
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchKind::MissingOnPrimary => write!(f, "missing on primary"),
            MismatchKind::MissingOnDownstream => write!(f, "missing on downstream"),
            MismatchKind::ColumnsDiffer => write!(f, "columns differ"),
        }
    }
}

/// Diagnostics for a diverging id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowMismatch {
    pub id: RowId,
    pub kind: MismatchKind,
    pub primary: Option<Row>,
    pub downstream: Option<Row>,
    /// Empty unless both rows exist.
    pub diffs: Vec<ColumnDiff>,
}

/// Outcome of comparing the rows fetched for one id.
#[derive(Debug, Clone, PartialEq)]
pub enum RowComparison {
    /// Neither side has the row (or one side lacks it under
    /// [`AbsencePolicy::EitherAbsent`]).
    Absent,
    Match,
    Mismatch(Box<RowMismatch>),
}

impl RowComparison {
    pub fn is_mismatch(&self) -> bool {
        matches!(self, RowComparison::Mismatch(_))
    }
}

/// Classify the rows fetched for `id` from both sides.
pub fn compare_rows(
    id: RowId,
    primary: Option<Row>,
    downstream: Option<Row>,
    policy: AbsencePolicy,
) -> RowComparison {
    match (primary, downstream) {
        (None, None) => RowComparison::Absent,
        (Some(_), None) | (None, Some(_)) if policy == AbsencePolicy::EitherAbsent => {
            RowComparison::Absent
        }
        (Some(p), None) => RowComparison::Mismatch(Box::new(RowMismatch {
            id,
            kind: MismatchKind::MissingOnDownstream,
            primary: Some(p),
            downstream: None,
            diffs: Vec::new(),
        })),
        (None, Some(d)) => RowComparison::Mismatch(Box::new(RowMismatch {
            id,
            kind: MismatchKind::MissingOnPrimary,
            primary: None,
            downstream: Some(d),
            diffs: Vec::new(),
        })),
        (Some(p), Some(d)) => match compare_present(id, p, d) {
            Some(mismatch) => RowComparison::Mismatch(Box::new(mismatch)),
            None => RowComparison::Match,
        },
    }
}

/// Strict equality of two rows that are expected to exist on both sides.
pub fn compare_present(id: RowId, primary: Row, downstream: Row) -> Option<RowMismatch> {
    if primary == downstream {
        return None;
    }
    let diffs = primary.diff(&downstream);
    Some(RowMismatch {
        id,
        kind: MismatchKind::ColumnsDiffer,
        primary: Some(primary),
        downstream: Some(downstream),
        diffs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Value;

    fn row(id: i64, name: &str) -> Row {
        Row::new()
            .with("id", Value::Int(id))
            .with("name", Value::Text(name.to_string()))
    }

    #[test]
    fn test_both_absent() {
        assert_eq!(
            compare_rows(1, None, None, AbsencePolicy::BothAbsent),
            RowComparison::Absent
        );
    }

    #[test]
    fn test_match() {
        assert_eq!(
            compare_rows(
                1,
                Some(row(1, "a")),
                Some(row(1, "a")),
                AbsencePolicy::BothAbsent
            ),
            RowComparison::Match
        );
    }

    #[test]
    fn test_columns_differ_carries_diagnostics() {
        let result = compare_rows(
            9,
            Some(row(9, "primary")),
            Some(row(9, "stale")),
            AbsencePolicy::BothAbsent,
        );
        let RowComparison::Mismatch(m) = result else {
            panic!("expected mismatch, got {result:?}");
        };
        assert_eq!(m.id, 9);
        assert_eq!(m.kind, MismatchKind::ColumnsDiffer);
        assert_eq!(m.diffs.len(), 1);
        assert_eq!(m.diffs[0].column, "name");
        assert_eq!(m.primary, Some(row(9, "primary")));
        assert_eq!(m.downstream, Some(row(9, "stale")));
    }

    #[test]
    fn test_one_sided_rows_are_mismatches_by_default() {
        let missing_downstream =
            compare_rows(2, Some(row(2, "a")), None, AbsencePolicy::BothAbsent);
        assert!(matches!(
            missing_downstream,
            RowComparison::Mismatch(ref m) if m.kind == MismatchKind::MissingOnDownstream
        ));

        let missing_primary = compare_rows(2, None, Some(row(2, "a")), AbsencePolicy::BothAbsent);
        assert!(matches!(
            missing_primary,
            RowComparison::Mismatch(ref m) if m.kind == MismatchKind::MissingOnPrimary
        ));
    }

    #[test]
    fn test_either_absent_policy_tolerates_one_sided_rows() {
        assert_eq!(
            compare_rows(2, Some(row(2, "a")), None, AbsencePolicy::EitherAbsent),
            RowComparison::Absent
        );
        assert_eq!(
            compare_rows(2, None, Some(row(2, "a")), AbsencePolicy::EitherAbsent),
            RowComparison::Absent
        );
        // Differences in present rows are still caught.
        assert!(compare_rows(
            2,
            Some(row(2, "a")),
            Some(row(2, "b")),
            AbsencePolicy::EitherAbsent
        )
        .is_mismatch());
    }
}
