//! pg-replica-auditor
//!
//! Runs a few sanity checks on a logical PostgreSQL replica (or a migrated
//! copy) to make sure it matches the primary, without scanning whole tables:
//!
//! - sampled rows: about eight thousand ids spread from 0 to two billion are
//!   compared column by column;
//! - recent rows: the newest rows visible on the replica must be identical on
//!   the primary;
//! - lag: the difference between the newest `updated_at` on each side.
//!
//! # CLI Usage
//!
//! ```bash
//! pg-replica-auditor \
//!   --primary postgresql://app@primary.internal/app \
//!   --replica postgresql://app@replica.internal/app \
//!   --table users
//! ```
//!
//! Connection strings can also come from `PRIMARY_DB_URL` and
//! `REPLICA_DB_URL`. `--debug` prints every query with the side it ran on.

use clap::{Args, Parser};
use replica_audit_core::{
    AbsencePolicy, AuditConfig, TableRef, DEFAULT_RECENT_LIMIT, DEFAULT_SAMPLE_COUNT,
    DEFAULT_TIMESTAMP_COLUMN,
};

pub mod output;
pub mod progress;

/// Log filter used with `--debug`.
pub const DEBUG_FILTER: &str =
    "pg_replica_auditor=debug,replica_audit_core=debug,replica_audit_postgresql=debug";

#[derive(Parser, Clone, Debug)]
#[command(name = "pg-replica-auditor")]
#[command(version)]
#[command(
    about = "Check that a logical PostgreSQL replica has reasonably identical rows to its primary"
)]
pub struct Cli {
    /// Database connection options
    #[command(flatten)]
    pub connection: ConnectionOpts,

    /// Audit options
    #[command(flatten)]
    pub audit: AuditOpts,

    /// Print every query and the side it ran on
    #[arg(long)]
    pub debug: bool,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Log filter directive for this invocation. `RUST_LOG` wins unless
    /// `--debug` is given.
    pub fn log_filter(&self) -> String {
        if self.debug {
            return DEBUG_FILTER.to_string();
        }
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
    }
}

#[derive(Args, Clone, Debug)]
pub struct ConnectionOpts {
    /// Primary (source of truth) PostgreSQL connection string
    #[arg(long, env = "PRIMARY_DB_URL")]
    pub primary: String,

    /// Replica (downstream copy) PostgreSQL connection string
    #[arg(long, visible_alias = "downstream", env = "REPLICA_DB_URL")]
    pub replica: String,
}

#[derive(Args, Clone, Debug)]
pub struct AuditOpts {
    /// Table to audit. Must have an integer "id" column
    #[arg(long)]
    pub table: String,

    /// Schema of the table (default: the connection's search_path)
    #[arg(long)]
    pub schema: Option<String>,

    /// Number of ids to sample
    #[arg(
        long,
        default_value_t = DEFAULT_SAMPLE_COUNT,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub rows: u64,

    /// Number of most recent replica rows to compare
    #[arg(long, default_value_t = DEFAULT_RECENT_LIMIT)]
    pub recent: usize,

    /// Last-modified column used to estimate the lag
    #[arg(long, default_value = DEFAULT_TIMESTAMP_COLUMN)]
    pub timestamp_column: String,

    /// Count sampled ids present on only one side as missing instead of failing
    #[arg(long)]
    pub tolerate_missing: bool,
}

impl AuditOpts {
    pub fn to_config(&self) -> AuditConfig {
        let mut table = TableRef::new(&self.table);
        if let Some(schema) = &self.schema {
            table = table.with_schema(schema);
        }
        let policy = if self.tolerate_missing {
            AbsencePolicy::EitherAbsent
        } else {
            AbsencePolicy::BothAbsent
        };
        AuditConfig::new(table)
            .with_sample_count(self.rows)
            .with_recent_limit(self.recent)
            .with_timestamp_column(&self.timestamp_column)
            .with_absence_policy(policy)
    }
}
