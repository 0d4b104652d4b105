//! Row fetcher trait definition.
//!
//! The audit never talks to a database driver directly. Each side of the
//! comparison is a [`RowFetcher`], so the same checks run against
//! PostgreSQL in production and against in-memory tables in tests.

use crate::error::FetchError;
use crate::row::{Row, RowId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Which database a fetcher reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Primary,
    Downstream,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Primary => write!(f, "primary"),
            Side::Downstream => write!(f, "downstream"),
        }
    }
}

/// An audited table, optionally qualified by its schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Read-only access to one side of the comparison.
///
/// Implementations execute plain queries and return raw rows; they hold no
/// comparison logic and never retry.
#[async_trait]
pub trait RowFetcher: Send + Sync {
    /// The side this fetcher reads from.
    fn side(&self) -> Side;

    /// Point lookup of the row with the given id.
    async fn fetch_row(&self, table: &TableRef, id: RowId) -> Result<Option<Row>, FetchError>;

    /// The `limit` highest ids present, in descending order.
    async fn fetch_latest_ids(
        &self,
        table: &TableRef,
        limit: usize,
    ) -> Result<Vec<RowId>, FetchError>;

    /// Rows whose id is in `ids`, in descending id order.
    ///
    /// Ids without a row are skipped, so the result may be shorter than
    /// `ids`.
    async fn fetch_rows_by_ids(
        &self,
        table: &TableRef,
        ids: &[RowId],
    ) -> Result<Vec<Row>, FetchError>;

    /// Largest value of the last-modified `column`, `None` for an empty table.
    async fn fetch_max_timestamp(
        &self,
        table: &TableRef,
        column: &str,
    ) -> Result<Option<DateTime<Utc>>, FetchError>;
}
