//! Append-only query log backed by SQLite.
//!
//! Every acquisition attempt becomes one row in `queries`. Rows are never
//! updated or deleted (triggers reject both); the cache is a read projection
//! over this history.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::outcome::{AcquisitionOutcome, ErrorKind, OutcomeError};
use crate::types::{CaseKey, CaseRecord, CourtError, CourtResult};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS queries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    attempt_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    case_type TEXT NOT NULL,
    case_number TEXT NOT NULL,
    case_year TEXT NOT NULL,
    was_successful INTEGER NOT NULL CHECK (was_successful IN (0, 1)),
    error_kind TEXT,
    error_message TEXT,
    warnings_json TEXT NOT NULL DEFAULT '[]',
    parsed_data_json TEXT,
    raw_response_html TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_case_lookup ON queries(case_type, case_number, case_year);
CREATE INDEX IF NOT EXISTS idx_timestamp ON queries(timestamp);

CREATE TRIGGER IF NOT EXISTS trg_queries_no_update
BEFORE UPDATE ON queries
BEGIN
  SELECT RAISE(FAIL, 'queries is append-only');
END;

CREATE TRIGGER IF NOT EXISTS trg_queries_no_delete
BEFORE DELETE ON queries
BEGIN
  SELECT RAISE(FAIL, 'queries is append-only');
END;
";

const SELECT_COLUMNS: &str = "SELECT id, attempt_id, timestamp, case_type, case_number, case_year,
        was_successful, error_kind, error_message, warnings_json, parsed_data_json,
        raw_response_html, created_at
     FROM queries";

/// One persisted acquisition attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    /// When the row was inserted (not when the attempt ran).
    pub created_at: DateTime<Utc>,
    pub success: bool,
    pub outcome: AcquisitionOutcome,
    /// Set when the stored record could not be deserialized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unreadable_record: Option<String>,
}

/// Optional filters for [`CaseLog::search`]. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseFilter {
    pub case_type: Option<String>,
    pub case_number: Option<String>,
    pub case_year: Option<String>,
    pub limit: Option<usize>,
}

impl CaseFilter {
    /// Exact match on all three key fields.
    pub fn for_key(key: &CaseKey) -> Self {
        Self {
            case_type: Some(key.case_type().to_string()),
            case_number: Some(key.case_number().to_string()),
            case_year: Some(key.case_year().to_string()),
            limit: None,
        }
    }
}

/// Aggregate counters over the whole log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    /// Percentage of successful attempts, two decimals; 0 when empty.
    pub success_rate: f64,
    pub most_recent: Option<DateTime<Utc>>,
}

/// The persistence contract the case store depends on.
pub trait CaseLog: Send + Sync {
    /// Append one outcome; returns the generated entry id.
    fn append(&self, outcome: &AcquisitionOutcome) -> CourtResult<i64>;

    fn entry(&self, id: i64) -> CourtResult<Option<LogEntry>>;

    /// Matching entries, most recent first.
    fn search(&self, filter: &CaseFilter) -> CourtResult<Vec<LogEntry>>;

    /// All entries for `key`, most recent first.
    fn lookup(&self, key: &CaseKey) -> CourtResult<Vec<LogEntry>> {
        self.search(&CaseFilter::for_key(key))
    }

    /// Most recent successful entry for `key` with a complete record.
    ///
    /// An unreadable stored record counts as a miss.
    fn latest_complete(&self, key: &CaseKey) -> CourtResult<Option<LogEntry>>;

    fn recent(&self, limit: usize) -> CourtResult<Vec<LogEntry>>;

    fn stats(&self) -> CourtResult<StoreStats>;
}

/// [`CaseLog`] over a single SQLite connection.
pub struct SqliteCaseLog {
    conn: Mutex<Connection>,
}

impl SqliteCaseLog {
    /// Open or create the log at `path`.
    pub fn open(path: &Path) -> CourtResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Self::init(conn)
    }

    /// In-memory log, gone when dropped.
    pub fn open_in_memory() -> CourtResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> CourtResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> CourtResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CourtError::Storage("query log lock poisoned".into()))
    }

    fn query(&self, sql: &str, args: &[&str]) -> CourtResult<Vec<LogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), parse_entry_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

impl CaseLog for SqliteCaseLog {
    fn append(&self, outcome: &AcquisitionOutcome) -> CourtResult<i64> {
        let record_json = outcome
            .record
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let warnings_json = serde_json::to_string(&outcome.warnings)?;
        let key = &outcome.key;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO queries (
                attempt_id, timestamp, case_type, case_number, case_year,
                was_successful, error_kind, error_message, warnings_json,
                parsed_data_json, raw_response_html, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                outcome.attempt_id.to_string(),
                format_ts(&outcome.timestamp),
                key.case_type(),
                key.case_number(),
                key.case_year(),
                outcome.is_success(),
                outcome.error.as_ref().map(|e| e.kind.as_str()),
                outcome.error.as_ref().map(|e| e.message.as_str()),
                warnings_json,
                record_json,
                outcome.raw_snapshot,
                format_ts(&Utc::now()),
            ],
        )?;
        let id = conn.last_insert_rowid();
        tracing::debug!(id, attempt_id = %outcome.attempt_id, "logged acquisition attempt");
        Ok(id)
    }

    fn entry(&self, id: i64) -> CourtResult<Option<LogEntry>> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                parse_entry_row,
            )
            .optional()?;
        Ok(entry)
    }

    fn search(&self, filter: &CaseFilter) -> CourtResult<Vec<LogEntry>> {
        let mut sql = String::from(SELECT_COLUMNS);
        let mut clauses = Vec::new();
        let mut args: Vec<&str> = Vec::new();
        for (column, value) in [
            ("case_type", &filter.case_type),
            ("case_number", &filter.case_number),
            ("case_year", &filter.case_year),
        ] {
            if let Some(value) = value {
                args.push(value);
                clauses.push(format!("{column} = ?{}", args.len()));
            }
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY timestamp DESC, id DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        self.query(&sql, &args)
    }

    fn latest_complete(&self, key: &CaseKey) -> CourtResult<Option<LogEntry>> {
        let sql = format!(
            "{SELECT_COLUMNS}
             WHERE case_type = ?1 AND case_number = ?2 AND case_year = ?3
               AND was_successful = 1 AND parsed_data_json IS NOT NULL
             ORDER BY timestamp DESC, id DESC
             LIMIT 1"
        );
        let latest = self
            .query(&sql, &[key.case_type(), key.case_number(), key.case_year()])?
            .into_iter()
            .next();

        match latest {
            Some(entry) if entry.unreadable_record.is_some() => {
                tracing::warn!(
                    id = entry.id,
                    "stored record for {key} is unreadable, treating as a miss"
                );
                Ok(None)
            }
            Some(entry) if entry.outcome.is_complete() => Ok(Some(entry)),
            _ => Ok(None),
        }
    }

    fn recent(&self, limit: usize) -> CourtResult<Vec<LogEntry>> {
        self.search(&CaseFilter {
            limit: Some(limit),
            ..CaseFilter::default()
        })
    }

    fn stats(&self) -> CourtResult<StoreStats> {
        let conn = self.conn()?;
        let (total, successful, latest): (i64, i64, Option<String>) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(was_successful), 0), MAX(timestamp) FROM queries",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let total = total.max(0) as u64;
        let successful = successful.max(0) as u64;
        let success_rate = if total == 0 {
            0.0
        } else {
            (successful as f64 / total as f64 * 10_000.0).round() / 100.0
        };
        let most_recent = latest
            .as_deref()
            .map(DateTime::parse_from_rfc3339)
            .transpose()
            .map_err(|e| CourtError::Storage(format!("bad timestamp in log: {e}")))?
            .map(|ts| ts.with_timezone(&Utc));

        Ok(StoreStats {
            total,
            successful,
            failed: total - successful,
            success_rate,
            most_recent,
        })
    }
}

/// Fixed-width RFC 3339 so lexical order matches time order.
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_entry_row(row: &Row<'_>) -> rusqlite::Result<LogEntry> {
    let attempt_raw: String = row.get(1)?;
    let attempt_id = Uuid::parse_str(&attempt_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
    let key = CaseKey::new(
        row.get::<_, String>(3)?,
        row.get::<_, String>(4)?,
        row.get::<_, String>(5)?,
    );
    let success: bool = row.get(6)?;
    let error_kind: Option<String> = row.get(7)?;
    let error_message: Option<String> = row.get(8)?;
    let warnings_json: String = row.get(9)?;
    let record_json: Option<String> = row.get(10)?;

    let (record, unreadable_record) = match record_json {
        Some(json) => match serde_json::from_str::<CaseRecord>(&json) {
            Ok(record) => (Some(record), None),
            Err(e) => (None, Some(e.to_string())),
        },
        None => (None, None),
    };

    let error = error_message.map(|message| {
        let kind = error_kind
            .as_deref()
            .and_then(ErrorKind::parse)
            .unwrap_or(if record.is_some() {
                ErrorKind::ExtractionFailure
            } else {
                ErrorKind::Session
            });
        OutcomeError::new(kind, message)
    });
    let warnings: Vec<OutcomeError> = serde_json::from_str(&warnings_json).unwrap_or_default();

    Ok(LogEntry {
        id: row.get(0)?,
        created_at: parse_ts(row, 12)?,
        success,
        outcome: AcquisitionOutcome {
            attempt_id,
            key,
            record,
            raw_snapshot: row.get(11)?,
            error,
            warnings,
            timestamp: parse_ts(row, 2)?,
        },
        unreadable_record,
    })
}
