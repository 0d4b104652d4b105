//! [`RowFetcher`] over one `tokio-postgres` connection.

use crate::query;
use crate::value::{decode_id, decode_row, decode_timestamp};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use replica_audit_core::{FetchError, Row, RowFetcher, RowId, Side, TableRef};
use std::str::FromStr;
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, info};

/// A read-only connection to one side of the audit.
///
/// The connection is released when the fetcher is dropped; [`close`]
/// additionally waits for the connection task to finish.
///
/// [`close`]: PostgresFetcher::close
pub struct PostgresFetcher {
    client: Client,
    side: Side,
    connection: JoinHandle<()>,
}

impl PostgresFetcher {
    /// Connect to the database at `url`.
    pub async fn connect(url: &str, side: Side) -> Result<Self, FetchError> {
        debug!("Connecting to {} database at {}", side, describe_target(url));
        let (client, connection) = tokio_postgres::connect(url, NoTls)
            .await
            .map_err(|e| FetchError::Connection(Box::new(e)))?;

        // Spawn connection handler
        let connection = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("{side} connection error: {e}");
            }
        });

        info!("Connected to {} database", side);
        Ok(Self {
            client,
            side,
            connection,
        })
    }

    /// Close the connection and wait for its task to end.
    pub async fn close(self) {
        let Self {
            client,
            side,
            connection,
        } = self;
        drop(client);
        if let Err(e) = connection.await {
            error!("{side} connection task failed: {e}");
        }
        debug!("Closed {} database connection", side);
    }

    async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<tokio_postgres::Row>, FetchError> {
        debug!("{}: {} {:?}", self.side, sql, params);
        self.client.query(sql, params).await.map_err(query_error)
    }
}

fn query_error(e: tokio_postgres::Error) -> FetchError {
    if e.is_closed() {
        FetchError::Connection(Box::new(e))
    } else {
        FetchError::Query(Box::new(e))
    }
}

fn to_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl RowFetcher for PostgresFetcher {
    fn side(&self) -> Side {
        self.side
    }

    async fn fetch_row(&self, table: &TableRef, id: RowId) -> Result<Option<Row>, FetchError> {
        let rows = self
            .query(&query::point_lookup_query(table), &[&id])
            .await?;
        rows.first().map(decode_row).transpose()
    }

    async fn fetch_latest_ids(
        &self,
        table: &TableRef,
        limit: usize,
    ) -> Result<Vec<RowId>, FetchError> {
        let rows = self
            .query(&query::latest_ids_query(table), &[&to_limit(limit)])
            .await?;
        rows.iter()
            .map(|row| decode_id(row, 0)?.ok_or(FetchError::MissingId))
            .collect()
    }

    async fn fetch_rows_by_ids(
        &self,
        table: &TableRef,
        ids: &[RowId],
    ) -> Result<Vec<Row>, FetchError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.to_vec();
        let rows = self
            .query(
                &query::rows_by_ids_query(table),
                &[&ids, &to_limit(ids.len())],
            )
            .await?;
        rows.iter().map(decode_row).collect()
    }

    async fn fetch_max_timestamp(
        &self,
        table: &TableRef,
        column: &str,
    ) -> Result<Option<DateTime<Utc>>, FetchError> {
        let rows = self
            .query(&query::max_timestamp_query(table, column), &[])
            .await?;
        match rows.first() {
            Some(row) => decode_timestamp(row, 0),
            None => Ok(None),
        }
    }
}

/// Human-readable connection target with the password left out,
/// e.g. `postgres@db.internal:5432/app`.
pub fn describe_target(url: &str) -> String {
    let config = match tokio_postgres::Config::from_str(url) {
        Ok(config) => config,
        Err(_) => return "<invalid connection string>".to_string(),
    };

    let hosts: Vec<String> = config
        .get_hosts()
        .iter()
        .enumerate()
        .map(|(i, host)| {
            let name = match host {
                tokio_postgres::config::Host::Tcp(name) => name.clone(),
                #[cfg(unix)]
                tokio_postgres::config::Host::Unix(path) => path.display().to_string(),
            };
            match config.get_ports().get(i).or(config.get_ports().first()) {
                Some(port) => format!("{name}:{port}"),
                None => name,
            }
        })
        .collect();

    let mut target = String::new();
    if let Some(user) = config.get_user() {
        target.push_str(user);
        target.push('@');
    }
    if hosts.is_empty() {
        target.push_str("localhost");
    } else {
        target.push_str(&hosts.join(","));
    }
    if let Some(dbname) = config.get_dbname() {
        target.push('/');
        target.push_str(dbname);
    }
    target
}
