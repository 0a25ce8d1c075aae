//! Client event log in DuckDB
//!
//! Commands and flows record what happened in `events.duckdb` inside the data
//! directory: the command that ran, the transaction kind and endpoint a flow
//! used, how the flow ended, and the error class when it failed.
//! Credentials, wallet addresses, amounts and transaction ids are never
//! recorded.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use duckdb::{Connection, ToSql};
use serde::{Deserialize, Serialize};

use crate::domain::result::Error;
use crate::domain::TransactionKind;
use crate::log_migrations::{BOOTSTRAP_MIGRATION, LOG_MIGRATIONS};

pub const EVENTS_DB_FILE: &str = "events.duckdb";

pub const COMMAND_EXECUTED: &str = "command_executed";
pub const FLOW_COMPLETED: &str = "flow_completed";
pub const FLOW_FAILED: &str = "flow_failed";
pub const FLOW_CANCELLED: &str = "flow_cancelled";
pub const SESSION_EXPIRED: &str = "session_expired";

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Millisecond timestamp shifted up, 16-bit counter below
fn next_id() -> u64 {
    let timestamp = now_ms().max(0) as u64;
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    (timestamp << 16) | counter
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Which front end produced the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPoint {
    Cli,
    /// Library embedded in another application
    Embedded,
}

impl EntryPoint {
    fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Cli => "cli",
            EntryPoint::Embedded => "embedded",
        }
    }
}

/// How a flow ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Completed,
    Failed,
    Cancelled,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::Failed => "failed",
            Outcome::Cancelled => "cancelled",
        }
    }
}

/// An event to record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientEvent {
    pub event: String,
    pub command: Option<String>,
    pub kind: Option<TransactionKind>,
    /// Backend path template, never one with an id in it
    pub endpoint: Option<String>,
    pub outcome: Option<Outcome>,
    pub http_status: Option<u16>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub demo: bool,
}

impl ClientEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            command: None,
            kind: None,
            endpoint: None,
            outcome: None,
            http_status: None,
            error_code: None,
            error_message: None,
            demo: false,
        }
    }

    /// A CLI command started
    pub fn command(name: &str) -> Self {
        Self {
            command: Some(name.to_string()),
            ..Self::new(COMMAND_EXECUTED)
        }
    }

    pub fn session_expired() -> Self {
        Self::new(SESSION_EXPIRED)
    }

    /// A flow of `kind` ended with `result`
    pub fn flow_finished<T>(kind: TransactionKind, result: &std::result::Result<T, Error>) -> Self {
        let (event, outcome) = match result {
            Ok(_) => (FLOW_COMPLETED, Outcome::Completed),
            Err(Error::Cancelled) => (FLOW_CANCELLED, Outcome::Cancelled),
            Err(_) => (FLOW_FAILED, Outcome::Failed),
        };
        let event = Self {
            kind: Some(kind),
            endpoint: Some(kind.create_path().to_string()),
            outcome: Some(outcome),
            ..Self::new(event)
        };
        match result {
            Err(error) if outcome == Outcome::Failed => event.with_error(error),
            _ => event,
        }
    }

    pub fn with_kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Record the error class, plus the HTTP status and user-facing text
    pub fn with_error(mut self, error: &Error) -> Self {
        self.error_code = Some(error.code().to_string());
        if let Error::Http { status, .. } = error {
            self.http_status = Some(*status);
        }
        // Validation text can echo what the user typed
        if !matches!(error, Error::Validation(_)) {
            self.error_message = Some(error.user_message());
        }
        self
    }

    pub fn in_demo(mut self, demo: bool) -> Self {
        self.demo = demo;
        self
    }
}

/// An event as stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: u64,
    pub timestamp: i64,
    pub entry_point: String,
    pub app_version: String,
    pub event: String,
    pub command: Option<String>,
    pub kind: Option<String>,
    pub endpoint: Option<String>,
    pub outcome: Option<String>,
    pub http_status: Option<u16>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub demo: bool,
}

const SELECT_COLUMNS: &str = "SELECT id, timestamp, entry_point, app_version, event, command, \
     kind, endpoint, outcome, http_status, error_code, error_message, demo FROM client_events";

fn row_to_record(row: &duckdb::Row<'_>) -> duckdb::Result<EventRecord> {
    let http_status: Option<i32> = row.get(9)?;
    Ok(EventRecord {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        entry_point: row.get(2)?,
        app_version: row.get(3)?,
        event: row.get(4)?,
        command: row.get(5)?,
        kind: row.get(6)?,
        endpoint: row.get(7)?,
        outcome: row.get(8)?,
        http_status: http_status.and_then(|s| u16::try_from(s).ok()),
        error_code: row.get(10)?,
        error_message: row.get(11)?,
        demo: row.get(12)?,
    })
}

/// Which events to read back, newest first
#[derive(Debug, Clone)]
pub struct EventFilter {
    pub limit: usize,
    pub kind: Option<TransactionKind>,
    pub event: Option<String>,
    pub errors_only: bool,
    /// Only events at or after this unix ms timestamp
    pub since_ms: Option<i64>,
}

impl EventFilter {
    pub fn latest(limit: usize) -> Self {
        Self {
            limit,
            kind: None,
            event: None,
            errors_only: false,
            since_ms: None,
        }
    }

    pub fn with_kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn errors(mut self) -> Self {
        self.errors_only = true;
        self
    }

    pub fn since(mut self, timestamp_ms: i64) -> Self {
        self.since_ms = Some(timestamp_ms);
        self
    }

    fn to_sql(&self) -> (String, Vec<Box<dyn ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(kind) = self.kind {
            conditions.push("kind = ?");
            params.push(Box::new(kind.as_str().to_string()));
        }
        if let Some(event) = &self.event {
            conditions.push("event = ?");
            params.push(Box::new(event.clone()));
        }
        if self.errors_only {
            conditions.push("error_code IS NOT NULL");
        }
        if let Some(since) = self.since_ms {
            conditions.push("timestamp >= ?");
            params.push(Box::new(since));
        }

        let mut sql = SELECT_COLUMNS.to_string();
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY timestamp DESC, id DESC LIMIT ?");
        params.push(Box::new(self.limit as i64));
        (sql, params)
    }
}

/// Flow outcomes for one transaction kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindSummary {
    pub kind: String,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventSummary {
    pub total: u64,
    pub errors: u64,
    pub session_expiries: u64,
    pub by_kind: Vec<KindSummary>,
}

/// Event log backed by `events.duckdb`
pub struct EventLog {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    entry_point: EntryPoint,
    app_version: String,
}

impl EventLog {
    /// Open or create the database in `data_dir` and apply pending migrations
    pub fn open(data_dir: &Path, entry_point: EntryPoint, app_version: impl Into<String>) -> Result<Self> {
        let db_path = data_dir.join(EVENTS_DB_FILE);
        let conn = Connection::open(&db_path)?;
        migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            entry_point,
            app_version: app_version.into(),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))
    }

    pub fn record(&self, event: &ClientEvent) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO client_events (
                id, timestamp, entry_point, app_version, event, command, kind,
                endpoint, outcome, http_status, error_code, error_message, demo
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            duckdb::params![
                next_id(),
                now_ms(),
                self.entry_point.as_str(),
                &self.app_version,
                &event.event,
                &event.command,
                event.kind.map(|k| k.as_str()),
                &event.endpoint,
                event.outcome.map(|o| o.as_str()),
                event.http_status.map(i32::from),
                &event.error_code,
                &event.error_message,
                event.demo,
            ],
        )?;
        Ok(())
    }

    pub fn query(&self, filter: &EventFilter) -> Result<Vec<EventRecord>> {
        let (sql, params) = filter.to_sql();
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(param_refs.as_slice(), row_to_record)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn summary(&self) -> Result<EventSummary> {
        let conn = self.conn()?;
        let (total, errors, session_expiries): (u64, u64, u64) = conn.query_row(
            "SELECT COUNT(*), \
                    COUNT(*) FILTER (WHERE error_code IS NOT NULL), \
                    COUNT(*) FILTER (WHERE event = ?) \
             FROM client_events",
            [SESSION_EXPIRED],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let mut stmt = conn.prepare(
            "SELECT kind, \
                    COUNT(*) FILTER (WHERE outcome = 'completed'), \
                    COUNT(*) FILTER (WHERE outcome = 'failed'), \
                    COUNT(*) FILTER (WHERE outcome = 'cancelled') \
             FROM client_events \
             WHERE kind IS NOT NULL AND outcome IS NOT NULL \
             GROUP BY kind ORDER BY kind",
        )?;
        let by_kind = stmt
            .query_map([], |row| {
                Ok(KindSummary {
                    kind: row.get(0)?,
                    completed: row.get(1)?,
                    failed: row.get(2)?,
                    cancelled: row.get(3)?,
                })
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;

        Ok(EventSummary {
            total,
            errors,
            session_expiries,
            by_kind,
        })
    }

    /// Delete events older than `timestamp_ms` (unix ms)
    pub fn prune_before(&self, timestamp_ms: i64) -> Result<u64> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM client_events WHERE timestamp < ?", [timestamp_ms])?;
        Ok(deleted as u64)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

/// Create the bookkeeping table, then apply every migration not yet recorded
fn migrate(conn: &Connection) -> Result<()> {
    if let Some((_, sql)) = LOG_MIGRATIONS
        .iter()
        .find(|(name, _)| *name == BOOTSTRAP_MIGRATION)
    {
        conn.execute_batch(sql)?;
    }

    let mut stmt = conn.prepare("SELECT migration_name FROM sys_migrations")?;
    let applied = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<duckdb::Result<Vec<_>>>()?;

    for (name, sql) in LOG_MIGRATIONS {
        if applied.iter().any(|a| a == name) {
            continue;
        }
        conn.execute_batch(sql)?;
        conn.execute(
            "INSERT INTO sys_migrations (migration_name) VALUES (?)",
            [name],
        )?;
    }
    Ok(())
}
