//! Check of the most recently written rows.
//!
//! The downstream copy decides which ids are checked: its newest `limit`
//! ids are re-read from both sides and joined by id. Every row in that
//! window is expected to exist on both sides already, so any difference is
//! a hard failure.

use crate::compare::{compare_present, MismatchKind, RowMismatch};
use crate::error::{AuditError, FetchError};
use crate::fetch::{RowFetcher, Side, TableRef};
use crate::row::{Row, RowId};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Default size of the recent-row window.
pub const DEFAULT_RECENT_LIMIT: usize = 1000;

/// Counts from a successful recency check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecencyReport {
    /// Size of the window that was asked for.
    pub requested: usize,
    /// Rows found on both sides and identical.
    pub checked: u64,
    /// Ids listed as recent by downstream whose row was gone from both sides
    /// when re-read, e.g. deleted in between.
    pub missing: u64,
}

/// Compare the newest `limit` downstream rows against primary.
pub async fn check_recent<P, D>(
    primary: &P,
    downstream: &D,
    table: &TableRef,
    limit: usize,
) -> Result<RecencyReport, AuditError>
where
    P: RowFetcher + ?Sized,
    D: RowFetcher + ?Sized,
{
    let mut report = RecencyReport {
        requested: limit,
        ..Default::default()
    };

    let ids = downstream
        .fetch_latest_ids(table, limit)
        .await
        .map_err(AuditError::fetch(downstream.side()))?;
    debug!(
        "Downstream reports {} recent ids for '{}' (window {})",
        ids.len(),
        table,
        limit
    );
    if ids.is_empty() {
        return Ok(report);
    }

    let primary_rows = primary
        .fetch_rows_by_ids(table, &ids)
        .await
        .map_err(AuditError::fetch(primary.side()))?;
    let downstream_rows = downstream
        .fetch_rows_by_ids(table, &ids)
        .await
        .map_err(AuditError::fetch(downstream.side()))?;

    if primary_rows.len() != downstream_rows.len() {
        return Err(AuditError::RecencyCount {
            primary: primary_rows.len(),
            downstream: downstream_rows.len(),
        });
    }

    let mut by_id = index_by_id(primary_rows, primary.side())?;
    // Downstream rows arrive newest first.
    let downstream_rows = keyed(downstream_rows, downstream.side())?;
    report.missing = ids.len().saturating_sub(downstream_rows.len()) as u64;

    for (id, downstream_row) in downstream_rows {
        // Equal counts with unique ids: an unmatched downstream id means the
        // id sets differ.
        let Some(primary_row) = by_id.remove(&id) else {
            return Err(missing_on_primary(id, downstream_row));
        };
        if let Some(mismatch) = compare_present(id, primary_row, downstream_row) {
            return Err(AuditError::RecencyMismatch(Box::new(mismatch)));
        }
        report.checked += 1;
    }

    Ok(report)
}

fn missing_on_primary(id: RowId, downstream: Row) -> AuditError {
    AuditError::RecencyMismatch(Box::new(RowMismatch {
        id,
        kind: MismatchKind::MissingOnPrimary,
        primary: None,
        downstream: Some(downstream),
        diffs: Vec::new(),
    }))
}

/// Pair every row with its id, rejecting rows without one and repeated ids.
fn keyed(rows: Vec<Row>, side: Side) -> Result<Vec<(RowId, Row)>, AuditError> {
    let mut seen = std::collections::HashSet::with_capacity(rows.len());
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let id = row.id().ok_or(AuditError::Fetch {
            side,
            source: FetchError::MissingId,
        })?;
        if !seen.insert(id) {
            return Err(AuditError::RecencyDuplicateId { side, id });
        }
        out.push((id, row));
    }
    Ok(out)
}

fn index_by_id(rows: Vec<Row>, side: Side) -> Result<HashMap<RowId, Row>, AuditError> {
    Ok(keyed(rows, side)?.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Value;

    fn row(id: i64) -> Row {
        Row::new().with("id", Value::Int(id))
    }

    #[test]
    fn test_keyed_rejects_duplicate_ids() {
        let err = keyed(vec![row(3), row(2), row(3)], Side::Primary).unwrap_err();
        assert!(matches!(
            err,
            AuditError::RecencyDuplicateId {
                side: Side::Primary,
                id: 3
            }
        ));
    }

    #[test]
    fn test_keyed_rejects_rows_without_id() {
        let no_id = Row::new().with("name", Value::Text("x".into()));
        let err = keyed(vec![no_id], Side::Downstream).unwrap_err();
        assert!(matches!(
            err,
            AuditError::Fetch {
                side: Side::Downstream,
                source: FetchError::MissingId
            }
        ));
    }

    #[test]
    fn test_keyed_preserves_order() {
        let ids: Vec<RowId> = keyed(vec![row(9), row(4), row(1)], Side::Downstream)
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec![9, 4, 1]);
    }
}
