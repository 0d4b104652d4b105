//! In-memory [`RowFetcher`] used by tests.
//!
//! A [`MemoryTable`] holds the rows of a single table keyed by id and
//! answers the fetcher queries the same way PostgreSQL would, including
//! descending id order and `MAX()` over a timestamp column.

use crate::error::FetchError;
use crate::fetch::{RowFetcher, Side, TableRef};
use crate::row::{Row, RowId, Value};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct MemoryTable {
    side: Side,
    table: TableRef,
    rows: BTreeMap<RowId, Row>,
    unreachable: bool,
    queries: AtomicU64,
}

impl MemoryTable {
    pub fn new(side: Side, table: TableRef) -> Self {
        Self {
            side,
            table,
            rows: BTreeMap::new(),
            unreachable: false,
            queries: AtomicU64::new(0),
        }
    }

    /// Add rows. Rows without an integer `id` column are ignored.
    pub fn with_rows(mut self, rows: impl IntoIterator<Item = Row>) -> Self {
        for row in rows {
            self.insert(row);
        }
        self
    }

    /// Make every query fail as if the server could not be reached.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Same rows, same table, seen from another side.
    pub fn copy_as(&self, side: Side) -> Self {
        Self {
            side,
            table: self.table.clone(),
            rows: self.rows.clone(),
            unreachable: self.unreachable,
            queries: AtomicU64::new(0),
        }
    }

    pub fn insert(&mut self, row: Row) {
        if let Some(id) = row.id() {
            self.rows.insert(id, row);
        }
    }

    pub fn remove(&mut self, id: RowId) -> Option<Row> {
        self.rows.remove(&id)
    }

    /// Overwrite one column of an existing row. Returns false if there is no
    /// row with that id.
    pub fn set(&mut self, id: RowId, column: &str, value: Value) -> bool {
        match self.rows.get_mut(&id) {
            Some(row) => {
                row.push(column, value);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of queries answered so far.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    fn begin(&self, table: &TableRef) -> Result<(), FetchError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        if self.unreachable {
            return Err(FetchError::Connection(
                format!("{} database is unreachable", self.side).into(),
            ));
        }
        if *table != self.table {
            return Err(FetchError::Query(
                format!("relation \"{table}\" does not exist").into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RowFetcher for MemoryTable {
    fn side(&self) -> Side {
        self.side
    }

    async fn fetch_row(&self, table: &TableRef, id: RowId) -> Result<Option<Row>, FetchError> {
        self.begin(table)?;
        Ok(self.rows.get(&id).cloned())
    }

    async fn fetch_latest_ids(
        &self,
        table: &TableRef,
        limit: usize,
    ) -> Result<Vec<RowId>, FetchError> {
        self.begin(table)?;
        Ok(self.rows.keys().rev().take(limit).copied().collect())
    }

    async fn fetch_rows_by_ids(
        &self,
        table: &TableRef,
        ids: &[RowId],
    ) -> Result<Vec<Row>, FetchError> {
        self.begin(table)?;
        let mut rows: Vec<(RowId, Row)> = ids
            .iter()
            .filter_map(|id| self.rows.get(id).map(|row| (*id, row.clone())))
            .collect();
        rows.sort_by(|a, b| b.0.cmp(&a.0));
        rows.dedup_by_key(|(id, _)| *id);
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }

    async fn fetch_max_timestamp(
        &self,
        table: &TableRef,
        column: &str,
    ) -> Result<Option<DateTime<Utc>>, FetchError> {
        self.begin(table)?;
        let mut max = None;
        for row in self.rows.values() {
            let ts = match row.get(column) {
                Some(Value::TimestampTz(ts)) => *ts,
                Some(Value::Timestamp(ts)) => ts.and_utc(),
                Some(Value::Null) | None => continue,
                Some(other) => {
                    return Err(FetchError::UnsupportedType {
                        column: column.to_string(),
                        type_name: format!("{other:?}"),
                    })
                }
            };
            max = max.max(Some(ts));
        }
        Ok(max)
    }
}
