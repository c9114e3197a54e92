//! DuckDB-backed store
//!
//! Persists raw pages and usage rows in a single DuckDB database file.
//! Upserts use `INSERT OR REPLACE` against the tables' primary keys.

use super::traits::{DomainStore, RawRecord, RawStore};
use crate::error::{Error, Result};
use crate::model::{Breakdown, UsageRecord};
use crate::scope::{ScopeFingerprint, DAY_FORMAT};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use duckdb::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS raw_usage (
    scope_key     VARCHAR NOT NULL,
    page_ordinal  BIGINT  NOT NULL,
    connection_id BIGINT  NOT NULL,
    resource_id   VARCHAR NOT NULL,
    payload       BLOB    NOT NULL,
    ingested_at   VARCHAR NOT NULL,
    PRIMARY KEY (scope_key, page_ordinal)
);

CREATE TABLE IF NOT EXISTS usage_daily (
    connection_id              BIGINT  NOT NULL,
    resource_id                VARCHAR NOT NULL,
    day                        DATE    NOT NULL,
    total_seats                BIGINT  NOT NULL,
    total_active_users         BIGINT  NOT NULL,
    total_engaged_users        BIGINT  NOT NULL,
    total_suggestions_count    BIGINT  NOT NULL,
    total_acceptances_count    BIGINT  NOT NULL,
    total_lines_suggested      BIGINT  NOT NULL,
    total_lines_accepted       BIGINT  NOT NULL,
    total_active_users_chat    BIGINT  NOT NULL,
    total_active_chat_sessions BIGINT  NOT NULL,
    language_breakdown         VARCHAR,
    editor_breakdown           VARCHAR,
    PRIMARY KEY (connection_id, resource_id, day)
);
";

/// Raw and domain storage in DuckDB
#[derive(Clone)]
pub struct DuckDbStore {
    conn: Arc<Mutex<Connection>>,
    /// Database file, `None` when in memory
    path: Option<PathBuf>,
}

impl DuckDbStore {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        Self::initialize(conn, Some(path))
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn, None)
    }

    fn initialize(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        debug!(path = ?path, "DuckDB store ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::store("DuckDB connection lock poisoned"))?;
        f(&conn)
    }
}

impl std::fmt::Debug for DuckDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn to_i64(value: u64, field: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| Error::store(format!("{field} {value} out of range")))
}

fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::store(format!("{field} {value} out of range")))
}

fn breakdown_json(breakdown: Option<&Breakdown>) -> Result<Option<String>> {
    breakdown.map(Breakdown::to_json).transpose()
}

fn parse_breakdown(json: Option<String>) -> Result<Option<Breakdown>> {
    json.as_deref()
        .map(|s| {
            Breakdown::from_json(s)
                .map_err(|e| Error::store(format!("Corrupt breakdown column: {e}")))
        })
        .transpose()
}

#[async_trait]
impl RawStore for DuckDbStore {
    async fn put(
        &self,
        fingerprint: &ScopeFingerprint,
        ordinal: u32,
        payload: Bytes,
    ) -> Result<()> {
        let record = RawRecord::new(fingerprint.clone(), ordinal, payload);
        let connection_id = to_i64(fingerprint.connection_id, "connection_id")?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO raw_usage
                 (scope_key, page_ordinal, connection_id, resource_id, payload, ingested_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    fingerprint.storage_key(),
                    i64::from(ordinal),
                    connection_id,
                    fingerprint.resource_id,
                    record.payload.to_vec(),
                    record.ingested_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    async fn list_all(&self, fingerprint: &ScopeFingerprint) -> Result<Vec<RawRecord>> {
        let rows: Vec<(i64, String, i64, Vec<u8>, String)> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT connection_id, resource_id, page_ordinal, payload, ingested_at
                 FROM raw_usage WHERE scope_key = ? ORDER BY page_ordinal",
            )?;
            let rows = stmt.query_map(params![fingerprint.storage_key()], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })?;
            Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
        })?;

        rows.into_iter()
            .map(|(connection_id, resource_id, ordinal, payload, ingested_at)| {
                let page_ordinal = u32::try_from(ordinal)
                    .map_err(|_| Error::store(format!("page_ordinal {ordinal} out of range")))?;
                let ingested_at = DateTime::parse_from_rfc3339(&ingested_at)
                    .map(|ts| ts.with_timezone(&Utc))
                    .map_err(|e| Error::store(format!("Corrupt ingested_at: {e}")))?;
                Ok(RawRecord {
                    fingerprint: ScopeFingerprint::new(
                        to_u64(connection_id, "connection_id")?,
                        resource_id,
                    ),
                    page_ordinal,
                    payload: Bytes::from(payload),
                    ingested_at,
                })
            })
            .collect()
    }

    async fn count(&self, fingerprint: &ScopeFingerprint) -> Result<usize> {
        let count: i64 = self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM raw_usage WHERE scope_key = ?",
                params![fingerprint.storage_key()],
                |row| row.get(0),
            )?)
        })?;
        Ok(count as usize)
    }
}

#[async_trait]
impl DomainStore for DuckDbStore {
    async fn upsert(&self, record: &UsageRecord) -> Result<()> {
        let connection_id = to_i64(record.connection_id, "connection_id")?;
        let languages = breakdown_json(record.language_breakdown.as_ref())?;
        let editors = breakdown_json(record.editor_breakdown.as_ref())?;
        let day = record.day.format(DAY_FORMAT).to_string();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO usage_daily VALUES
                 (?, ?, CAST(? AS DATE), ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    connection_id,
                    record.resource_id,
                    day,
                    record.total_seats,
                    record.total_active_users,
                    record.total_engaged_users,
                    record.total_suggestions_count,
                    record.total_acceptances_count,
                    record.total_lines_suggested,
                    record.total_lines_accepted,
                    record.total_active_users_chat,
                    record.total_active_chat_sessions,
                    languages,
                    editors,
                ],
            )?;
            Ok(())
        })
    }

    async fn list(&self, connection_id: u64, resource_id: &str) -> Result<Vec<UsageRecord>> {
        type Row = (String, [i64; 9], Option<String>, Option<String>);

        let connection_key = to_i64(connection_id, "connection_id")?;
        let rows: Vec<Row> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT CAST(day AS VARCHAR),
                        total_seats, total_active_users, total_engaged_users,
                        total_suggestions_count, total_acceptances_count,
                        total_lines_suggested, total_lines_accepted,
                        total_active_users_chat, total_active_chat_sessions,
                        language_breakdown, editor_breakdown
                 FROM usage_daily
                 WHERE connection_id = ? AND resource_id = ?
                 ORDER BY day",
            )?;
            let rows = stmt.query_map(params![connection_key, resource_id], |row| {
                let mut metrics = [0i64; 9];
                for (i, slot) in metrics.iter_mut().enumerate() {
                    *slot = row.get(i + 1)?;
                }
                Ok((row.get(0)?, metrics, row.get(10)?, row.get(11)?))
            })?;
            Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
        })?;

        let fingerprint = ScopeFingerprint::new(connection_id, resource_id);
        rows.into_iter()
            .map(|(day, m, languages, editors)| {
                let day = NaiveDate::parse_from_str(&day, DAY_FORMAT)
                    .map_err(|e| Error::store(format!("Corrupt day '{day}': {e}")))?;
                Ok(UsageRecord {
                    total_seats: m[0],
                    total_active_users: m[1],
                    total_engaged_users: m[2],
                    total_suggestions_count: m[3],
                    total_acceptances_count: m[4],
                    total_lines_suggested: m[5],
                    total_lines_accepted: m[6],
                    total_active_users_chat: m[7],
                    total_active_chat_sessions: m[8],
                    language_breakdown: parse_breakdown(languages)?,
                    editor_breakdown: parse_breakdown(editors)?,
                    ..UsageRecord::empty(&fingerprint, day)
                })
            })
            .collect()
    }
}
