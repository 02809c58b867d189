//! SQLite-backed durable metric store.
//!
//! The backend is opened lazily. Its lifecycle is published on a
//! `tokio::sync::watch` channel so concurrent callers coalesce onto one
//! in-flight open and later callers observe the outcome without polling.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use callstats_core::DurableMetricStore;
use callstats_domain::{
    CallStatsError, Dimension, MetricRecord, Result as DomainResult, StorageConfig,
};
use rusqlite::{params, Connection, Row};
use tokio::sync::watch;
use tokio::task;
use tracing::{debug, info, warn};

use super::manager::{map_sql_error, DbManager};

const SELECT_COLUMNS: &str = "id, timestamp, provider, model, input_format, status, latency,
    tokens_used, prompt_tokens, completion_tokens, estimated_cost, prompt_length,
    response_length, error_message, confidence";

const INSERT_SQL: &str = "INSERT INTO metric_records (
        id, timestamp, provider, model, input_format, status, latency,
        tokens_used, prompt_tokens, completion_tokens, estimated_cost, prompt_length,
        response_length, error_message, confidence
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)";

#[derive(Clone)]
enum StoreState {
    Uninitialized,
    Initializing,
    Ready(Arc<DbManager>),
    Failed(String),
    Closed,
}

/// Durable metric store backed by SQLite.
pub struct SqliteMetricStore {
    path: PathBuf,
    pool_size: u32,
    state: watch::Sender<StoreState>,
    opens: AtomicUsize,
}

impl SqliteMetricStore {
    /// Create an unopened store; the database is opened on first use.
    pub fn new(path: impl Into<PathBuf>, pool_size: u32) -> Self {
        let (state, _) = watch::channel(StoreState::Uninitialized);
        Self { path: path.into(), pool_size, state, opens: AtomicUsize::new(0) }
    }

    /// Store at `config.path` with the configured pool size.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.path, config.pool_size)
    }

    /// Number of backend opens attempted so far.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Resolve the open database, initialising it first if nobody has.
    async fn ready_db(&self) -> DomainResult<Arc<DbManager>> {
        loop {
            let current = self.state.borrow().clone();
            match current {
                StoreState::Ready(db) => return Ok(db),
                StoreState::Failed(reason) => return Err(CallStatsError::Unavailable(reason)),
                StoreState::Closed => {
                    return Err(CallStatsError::Unavailable("metric store is closed".into()))
                }
                StoreState::Uninitialized => self.init().await?,
                StoreState::Initializing => self.wait_until_settled().await?,
            }
        }
    }

    async fn wait_until_settled(&self) -> DomainResult<()> {
        let mut rx = self.state.subscribe();
        rx.wait_for(|state| !matches!(state, StoreState::Initializing))
            .await
            .map(|_| ())
            .map_err(|_| CallStatsError::Internal("metric store state channel closed".into()))
    }

    async fn open(&self) -> DomainResult<Arc<DbManager>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let path = self.path.clone();
        let pool_size = self.pool_size;

        task::spawn_blocking(move || -> DomainResult<Arc<DbManager>> {
            let db = DbManager::new(&path, pool_size)?;
            db.run_migrations()?;
            Ok(Arc::new(db))
        })
        .await
        .map_err(map_join_error)?
    }

    async fn with_connection<T, F>(&self, op: F) -> DomainResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> DomainResult<T> + Send + 'static,
    {
        let db = self.ready_db().await?;

        task::spawn_blocking(move || -> DomainResult<T> {
            let mut conn = db.get_connection()?;
            op(&mut *conn)
        })
        .await
        .map_err(map_join_error)?
    }
}

/// Marks the store `Failed` if an init future is dropped mid-open.
struct InitGuard<'a> {
    state: &'a watch::Sender<StoreState>,
    armed: bool,
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.send_replace(StoreState::Failed("initialisation was cancelled".into()));
        }
    }
}

#[async_trait]
impl DurableMetricStore for SqliteMetricStore {
    async fn init(&self) -> DomainResult<()> {
        loop {
            let current = self.state.borrow().clone();
            match current {
                StoreState::Ready(_) => return Ok(()),
                StoreState::Closed => {
                    return Err(CallStatsError::Unavailable("metric store is closed".into()))
                }
                StoreState::Initializing => {
                    self.wait_until_settled().await?;
                    // Surface a concurrent failure to this caller as well.
                    let settled = self.state.borrow().clone();
                    if let StoreState::Failed(reason) = settled {
                        return Err(CallStatsError::Unavailable(reason));
                    }
                }
                StoreState::Uninitialized | StoreState::Failed(_) => {
                    let claimed = self.state.send_if_modified(|state| {
                        if matches!(state, StoreState::Uninitialized | StoreState::Failed(_)) {
                            *state = StoreState::Initializing;
                            true
                        } else {
                            false
                        }
                    });
                    if !claimed {
                        continue;
                    }

                    let mut guard = InitGuard { state: &self.state, armed: true };
                    let outcome = self.open().await;
                    guard.armed = false;

                    return match outcome {
                        Ok(db) => {
                            info!(db_path = %self.path.display(), "metric store opened");
                            self.state.send_replace(StoreState::Ready(db));
                            Ok(())
                        }
                        Err(err) => {
                            let reason = format!("failed to open metric store: {err}");
                            warn!(db_path = %self.path.display(), error = %err, "metric store open failed");
                            self.state.send_replace(StoreState::Failed(reason.clone()));
                            Err(CallStatsError::Unavailable(reason))
                        }
                    };
                }
            }
        }
    }

    fn is_ready(&self) -> bool {
        matches!(*self.state.borrow(), StoreState::Ready(_))
    }

    async fn insert(&self, record: &MetricRecord) -> DomainResult<()> {
        let record = record.clone();

        self.with_connection(move |conn| {
            insert_record(conn, &record).map_err(map_sql_error)?;
            debug!(id = %record.id, "inserted metric record");
            Ok(())
        })
        .await
    }

    async fn insert_batch(&self, records: &[MetricRecord]) -> DomainResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let records = records.to_vec();

        self.with_connection(move |conn| {
            let tx = conn.transaction().map_err(map_sql_error)?;
            for record in &records {
                insert_record(&tx, record).map_err(map_sql_error)?;
            }
            tx.commit().map_err(map_sql_error)?;
            debug!(count = records.len(), "inserted metric batch");
            Ok(records.len())
        })
        .await
    }

    async fn query_range(&self, start: i64, end: i64) -> DomainResult<Vec<MetricRecord>> {
        self.with_connection(move |conn| {
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM metric_records
                 WHERE timestamp >= ?1 AND timestamp <= ?2
                 ORDER BY timestamp ASC, id ASC"
            );
            query_records(conn, &sql, params![start, end])
        })
        .await
    }

    async fn query_by_dimension(
        &self,
        dimension: Dimension,
        value: &str,
        limit: Option<usize>,
    ) -> DomainResult<Vec<MetricRecord>> {
        let value = value.to_string();
        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.map_or(-1, to_sql_count);

        self.with_connection(move |conn| {
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM metric_records
                 WHERE {} = ?1
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?2",
                dimension_column(dimension)
            );
            query_records(conn, &sql, params![value, limit])
        })
        .await
    }

    async fn query_recent(&self, limit: usize) -> DomainResult<Vec<MetricRecord>> {
        let limit = to_sql_count(limit);

        self.with_connection(move |conn| {
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM metric_records
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?1"
            );
            query_records(conn, &sql, params![limit])
        })
        .await
    }

    async fn query_all(&self) -> DomainResult<Vec<MetricRecord>> {
        self.with_connection(move |conn| {
            let sql =
                format!("SELECT {SELECT_COLUMNS} FROM metric_records ORDER BY timestamp ASC, id ASC");
            query_records(conn, &sql, params![])
        })
        .await
    }

    async fn count(&self) -> DomainResult<u64> {
        self.with_connection(move |conn| {
            let total: i64 = conn
                .query_row("SELECT COUNT(*) FROM metric_records", [], |row| row.get(0))
                .map_err(map_sql_error)?;
            Ok(from_sql_int(total))
        })
        .await
    }

    async fn delete_older_than(&self, cutoff: i64) -> DomainResult<u64> {
        self.with_connection(move |conn| {
            let deleted = conn
                .execute("DELETE FROM metric_records WHERE timestamp < ?1", params![cutoff])
                .map_err(map_sql_error)?;
            debug!(cutoff, deleted, "deleted expired metric records");
            Ok(deleted as u64)
        })
        .await
    }

    async fn clear(&self) -> DomainResult<()> {
        self.with_connection(move |conn| {
            conn.execute("DELETE FROM metric_records", []).map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> DomainResult<()> {
        loop {
            let current = self.state.borrow().clone();
            match current {
                StoreState::Uninitialized | StoreState::Closed => return Ok(()),
                StoreState::Initializing => self.wait_until_settled().await?,
                StoreState::Ready(_) | StoreState::Failed(_) => {
                    // Dropping the last `Arc<DbManager>` releases the pool.
                    self.state.send_replace(StoreState::Closed);
                    info!(db_path = %self.path.display(), "metric store closed");
                    return Ok(());
                }
            }
        }
    }
}

fn dimension_column(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Provider => "provider",
        Dimension::Model => "model",
        Dimension::Status => "status",
    }
}

fn insert_record(conn: &Connection, record: &MetricRecord) -> rusqlite::Result<usize> {
    conn.prepare_cached(INSERT_SQL)?.execute(params![
        record.id,
        record.timestamp,
        record.provider,
        record.model,
        record.input_format.to_string(),
        record.status.to_string(),
        to_sql_int(record.latency),
        to_sql_int(record.tokens_used),
        to_sql_int(record.prompt_tokens),
        to_sql_int(record.completion_tokens),
        record.estimated_cost,
        to_sql_int(record.prompt_length),
        to_sql_int(record.response_length),
        record.error_message,
        record.confidence,
    ])
}

/// Run a record query, skipping rows that no longer decode.
fn query_records(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> DomainResult<Vec<MetricRecord>> {
    let mut stmt = conn.prepare(sql).map_err(map_sql_error)?;
    let rows = stmt.query_map(params, map_record_row).map_err(map_sql_error)?;

    let mut records = Vec::new();
    for row in rows {
        match row {
            Ok(record) => records.push(record),
            Err(
                err @ (rusqlite::Error::FromSqlConversionFailure(..)
                | rusqlite::Error::InvalidColumnType(..)),
            ) => {
                warn!(error = %err, "skipping undecodable metric row");
            }
            Err(err) => return Err(map_sql_error(err)),
        }
    }
    Ok(records)
}

fn map_record_row(row: &Row<'_>) -> rusqlite::Result<MetricRecord> {
    Ok(MetricRecord {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        provider: row.get(2)?,
        model: row.get(3)?,
        input_format: parse_column(row, 4)?,
        status: parse_column(row, 5)?,
        latency: from_sql_int(row.get(6)?),
        tokens_used: from_sql_int(row.get(7)?),
        prompt_tokens: from_sql_int(row.get(8)?),
        completion_tokens: from_sql_int(row.get(9)?),
        estimated_cost: row.get(10)?,
        prompt_length: from_sql_int(row.get(11)?),
        response_length: from_sql_int(row.get(12)?),
        error_message: row.get(13)?,
        confidence: row.get(14)?,
    })
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, err)),
        )
    })
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_sql_count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_int(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn map_join_error(err: task::JoinError) -> CallStatsError {
    CallStatsError::from(crate::errors::InfraError::from(err))
}
