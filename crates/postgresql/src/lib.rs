//! PostgreSQL support for pg-replica-auditor
//!
//! Provides [`PostgresFetcher`], a [`RowFetcher`](replica_audit_core::RowFetcher)
//! backed by a single `tokio-postgres` connection, and the SQL it runs.

mod fetcher;
pub mod query;
mod value;

pub use fetcher::{describe_target, PostgresFetcher};
pub use value::decode_row;
