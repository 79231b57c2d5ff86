//! SQLite store
//!
//! One `scenarios` table whose columns carry the record's field names.
//! Timestamps are RFC 3339 text with fixed nanosecond precision, so string
//! order is time order and `created_before` filters run in SQL.
//!
//! rusqlite is blocking; every call hops onto the blocking pool.

use crate::error::{StoreError, StoreResult};
use crate::filter::ScenarioFilter;
use crate::store::{validate, ScenarioStore};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use devlab_types::{Scenario, ScenarioId, ScenarioStatus};
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS scenarios (
    scenario_id   TEXT PRIMARY KEY NOT NULL,
    user_id       TEXT NOT NULL,
    scenario_type TEXT NOT NULL,
    container_id  TEXT NOT NULL,
    status        TEXT NOT NULL,
    terminal_port INTEGER NOT NULL,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_scenarios_status_created ON scenarios (status, created_at);
CREATE INDEX IF NOT EXISTS idx_scenarios_user ON scenarios (user_id);
";

const COLUMNS: &str =
    "scenario_id, user_id, scenario_type, container_id, status, terminal_port, created_at, updated_at";

/// SQLite-backed [`ScenarioStore`]
#[derive(Debug, Clone)]
pub struct SqliteScenarioStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteScenarioStore {
    /// Open (or create) the database at `path`
    ///
    /// # Errors
    /// - `StoreError::Backend` if the file cannot be opened or migrated
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        tracing::info!(path = %path.display(), "opened scenario database");
        Self::from_connection(conn)
    }

    /// Private in-memory database
    ///
    /// # Errors
    /// - `StoreError::Backend` if SQLite cannot allocate it
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn blocking<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await?
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(id: &str, raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            reason: format!("bad timestamp {raw:?}: {e}"),
        })
}

/// Raw column values; decoded outside the rusqlite closure so decode
/// failures surface as `Corrupt` rather than SQL errors
struct RawRow {
    scenario_id: String,
    user_id: String,
    scenario_type: String,
    container_id: String,
    status: String,
    terminal_port: i64,
    created_at: String,
    updated_at: String,
}

impl RawRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            scenario_id: row.get(0)?,
            user_id: row.get(1)?,
            scenario_type: row.get(2)?,
            container_id: row.get(3)?,
            status: row.get(4)?,
            terminal_port: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn decode(self) -> StoreResult<Scenario> {
        let id = self.scenario_id;
        let status: ScenarioStatus = self.status.parse().map_err(|e| StoreError::Corrupt {
            id: id.clone(),
            reason: format!("{e}"),
        })?;
        let terminal_port = u16::try_from(self.terminal_port).map_err(|_| StoreError::Corrupt {
            id: id.clone(),
            reason: format!("terminal port {} out of range", self.terminal_port),
        })?;
        let created_at = parse_timestamp(&id, &self.created_at)?;
        let updated_at = parse_timestamp(&id, &self.updated_at)?;
        Ok(Scenario {
            scenario_id: ScenarioId::new(id),
            user_id: self.user_id,
            scenario_type: self.scenario_type,
            container_id: self.container_id,
            status,
            terminal_port,
            created_at,
            updated_at,
        })
    }
}

/// WHERE clause and its positional parameters
fn where_clause(filter: &ScenarioFilter) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut args = Vec::new();

    if !filter.statuses.is_empty() {
        let marks = vec!["?"; filter.statuses.len()].join(", ");
        clauses.push(format!("status IN ({marks})"));
        args.extend(filter.statuses.iter().map(|s| s.as_str().to_string()));
    }
    if let Some(cutoff) = filter.created_before {
        clauses.push("created_at < ?".to_string());
        args.push(timestamp(cutoff));
    }
    if filter.container_id_present {
        clauses.push("container_id <> ''".to_string());
    }
    if let Some(user) = &filter.user_id {
        clauses.push("user_id = ?".to_string());
        args.push(user.clone());
    }

    if clauses.is_empty() {
        (String::new(), args)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), args)
    }
}

#[async_trait]
impl ScenarioStore for SqliteScenarioStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn insert(&self, scenario: &Scenario) -> StoreResult<()> {
        validate(scenario)?;
        let s = scenario.clone();
        self.blocking(move |conn| {
            let result = conn.execute(
                &format!("INSERT INTO scenarios ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                params![
                    s.scenario_id.as_str(),
                    s.user_id,
                    s.scenario_type,
                    s.container_id,
                    s.status.as_str(),
                    i64::from(s.terminal_port),
                    timestamp(s.created_at),
                    timestamp(s.updated_at),
                ],
            );
            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::Duplicate(s.scenario_id.to_string()))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn find(&self, id: &ScenarioId) -> StoreResult<Option<Scenario>> {
        let id = id.as_str().to_string();
        self.blocking(move |conn| {
            let raw = conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM scenarios WHERE scenario_id = ?1"),
                    params![id],
                    RawRow::read,
                )
                .optional()?;
            raw.map(RawRow::decode).transpose()
        })
        .await
    }

    async fn update(&self, scenario: &Scenario) -> StoreResult<()> {
        validate(scenario)?;
        let s = scenario.clone();
        self.blocking(move |conn| {
            let changed = conn.execute(
                "UPDATE scenarios SET user_id = ?2, scenario_type = ?3, container_id = ?4, \
                 status = ?5, terminal_port = ?6, created_at = ?7, updated_at = ?8 \
                 WHERE scenario_id = ?1",
                params![
                    s.scenario_id.as_str(),
                    s.user_id,
                    s.scenario_type,
                    s.container_id,
                    s.status.as_str(),
                    i64::from(s.terminal_port),
                    timestamp(s.created_at),
                    timestamp(s.updated_at),
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(s.scenario_id.to_string()));
            }
            Ok(())
        })
        .await
    }

    async fn update_if(&self, scenario: &Scenario, expected: ScenarioStatus) -> StoreResult<bool> {
        validate(scenario)?;
        let s = scenario.clone();
        self.blocking(move |conn| {
            let changed = conn.execute(
                "UPDATE scenarios SET user_id = ?2, scenario_type = ?3, container_id = ?4, \
                 status = ?5, terminal_port = ?6, created_at = ?7, updated_at = ?8 \
                 WHERE scenario_id = ?1 AND status = ?9",
                params![
                    s.scenario_id.as_str(),
                    s.user_id,
                    s.scenario_type,
                    s.container_id,
                    s.status.as_str(),
                    i64::from(s.terminal_port),
                    timestamp(s.created_at),
                    timestamp(s.updated_at),
                    expected.as_str(),
                ],
            )?;
            if changed > 0 {
                return Ok(true);
            }
            // same connection lock: nothing can slip in between
            let exists = conn
                .query_row(
                    "SELECT 1 FROM scenarios WHERE scenario_id = ?1",
                    params![s.scenario_id.as_str()],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if exists {
                Ok(false)
            } else {
                Err(StoreError::NotFound(s.scenario_id.to_string()))
            }
        })
        .await
    }

    async fn find_where(&self, filter: &ScenarioFilter) -> StoreResult<Vec<Scenario>> {
        let (clause, args) = where_clause(filter);
        self.blocking(move |conn| {
            let sql = format!(
                "SELECT {COLUMNS} FROM scenarios{clause} ORDER BY created_at, scenario_id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(args.iter()), RawRow::read)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(RawRow::decode).collect()
        })
        .await
    }
}
