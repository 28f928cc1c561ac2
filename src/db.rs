use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{SchemaTag, StoreError};

/// 'wen'
pub const APPLICATION_ID: i64 = 0x6e6577;
pub const SCHEMA_VERSION: i64 = 7;

/// SQLite date functions only cover years 0000 through 9999.
pub const MIN_TIMESTAMP: i64 = -62_167_219_200;
pub const MAX_TIMESTAMP: i64 = 253_402_300_799;

pub fn check_timestamp(timestamp: i64) -> Result<(), StoreError> {
    if (MIN_TIMESTAMP..=MAX_TIMESTAMP).contains(&timestamp) {
        Ok(())
    } else {
        Err(StoreError::InvalidInput(format!(
            "timestamp {timestamp} outside {MIN_TIMESTAMP}..={MAX_TIMESTAMP}"
        )))
    }
}

const CREATE_TABLES: &str = "
    CREATE TABLE IF NOT EXISTS entries (
        entrytype INTEGER,
        ts        DATETIME,
        pid       INTEGER,
        cmdline   TEXT
    );

    CREATE INDEX IF NOT EXISTS entries_ts_idx ON entries (ts);
    CREATE INDEX IF NOT EXISTS entries_pid_ts_idx ON entries (pid, ts);
";

const SELECT_EVENT: &str =
    "SELECT entrytype, CAST(strftime('%s', ts) AS INTEGER), pid, cmdline FROM entries";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    History,
    SessionStart,
    SessionStop,
}

impl EventKind {
    fn code(self) -> i64 {
        match self {
            Self::History => 0,
            Self::SessionStart => 1,
            Self::SessionStop => 2,
        }
    }
}

impl ToSql for EventKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for EventKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_i64()? {
            0 => Ok(Self::History),
            1 => Ok(Self::SessionStart),
            2 => Ok(Self::SessionStop),
            other => Err(FromSqlError::OutOfRange(other)),
        }
    }
}

/// One row of the log. Never updated once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub pid: i64,
    pub command: Option<String>,
}

impl Event {
    pub fn history(timestamp: i64, pid: i64, command: impl Into<String>) -> Self {
        Self {
            kind: EventKind::History,
            timestamp,
            pid,
            command: Some(command.into()),
        }
    }

    pub fn session_start(timestamp: i64, pid: i64) -> Self {
        Self {
            kind: EventKind::SessionStart,
            timestamp,
            pid,
            command: None,
        }
    }

    pub fn session_stop(timestamp: i64, pid: i64) -> Self {
        Self {
            kind: EventKind::SessionStop,
            timestamp,
            pid,
            command: None,
        }
    }

    /// `None` for rows whose `ts` does not parse as a date.
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Option<Self>> {
        let Some(timestamp) = row.get::<_, Option<i64>>(1)? else {
            return Ok(None);
        };
        Ok(Some(Self {
            kind: row.get(0)?,
            timestamp,
            pid: row.get(2)?,
            command: row.get(3)?,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    OldestFirst,
    NewestFirst,
}

impl Order {
    fn sql(self) -> &'static str {
        match self {
            Self::OldestFirst => "ORDER BY ts ASC, rowid ASC",
            Self::NewestFirst => "ORDER BY ts DESC, rowid DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Replace an incompatible or corrupt file instead of failing.
    pub repair: bool,
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            repair: false,
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

pub struct Db {
    pub(crate) conn: Connection,
}

impl Db {
    /// Opens the store at `path`, creating and initializing it when the file
    /// does not exist yet. The existing file must carry the expected tags;
    /// with `options.repair` an incompatible file is renamed aside and a
    /// fresh store takes its place.
    pub fn open_checked(path: &Path, options: &StoreOptions) -> Result<Self, StoreError> {
        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
            }
            let db = Self::open(path, options.busy_timeout)?;
            db.init_schema()?;
            tracing::info!("initialized new history database at {}", path.display());
            eprintln!("wen: Initialized new database.");
            return Ok(db);
        }

        let db = Self::open(path, options.busy_timeout)?;
        let err = match db.check_schema() {
            Ok(()) => return Ok(db),
            Err(e) if e.is_repairable() => e,
            Err(e) => return Err(e),
        };

        eprintln!("wen: Database Error: {err}");
        if !options.repair {
            return Err(err);
        }
        db.close()?;

        let backup = backup_path(path, chrono::Local::now());
        eprintln!(
            "wen: Replacing invalid database file, saving old file as {}",
            backup.display()
        );
        std::fs::rename(path, &backup).map_err(|e| StoreError::io(path, e))?;
        tracing::warn!(
            "moved incompatible database {} to {}",
            path.display(),
            backup.display()
        );

        let db = Self::open(path, options.busy_timeout)?;
        db.init_schema()?;
        Ok(db)
    }

    fn open(path: &Path, busy_timeout: Duration) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.init_schema()?;
        Ok(db)
    }

    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, e)| StoreError::from(e))
    }

    /// Writes the tags and creates the table. Only meant for a new, empty file.
    pub fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        self.conn.execute_batch(&format!(
            "BEGIN IMMEDIATE;
             PRAGMA application_id = {APPLICATION_ID};
             PRAGMA user_version = {SCHEMA_VERSION};
             {CREATE_TABLES}
             COMMIT;"
        ))?;
        Ok(())
    }

    pub fn check_schema(&self) -> Result<(), StoreError> {
        let app_id = self.pragma_i64("application_id")?;
        if app_id != APPLICATION_ID {
            return Err(StoreError::SchemaMismatch {
                tag: SchemaTag::ApplicationId,
                expected: APPLICATION_ID,
                found: app_id,
            });
        }
        let version = self.pragma_i64("user_version")?;
        if version != SCHEMA_VERSION {
            return Err(StoreError::SchemaMismatch {
                tag: SchemaTag::Version,
                expected: SCHEMA_VERSION,
                found: version,
            });
        }
        Ok(())
    }

    fn pragma_i64(&self, name: &str) -> Result<i64, StoreError> {
        self.conn
            .pragma_query_value(None, name, |row| row.get(0))
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(ref f, _)
                    if f.code == rusqlite::ErrorCode::NotADatabase =>
                {
                    StoreError::Corrupt(e.to_string())
                }
                other => StoreError::Storage(other),
            })
    }

    // ── Events ─────────────────────────────────────────────────────

    pub fn append(&self, event: &Event) -> Result<(), StoreError> {
        check_timestamp(event.timestamp)?;
        self.conn.execute(
            "INSERT INTO entries (entrytype, ts, pid, cmdline) \
             VALUES (?, datetime(?, 'unixepoch'), ?, ?)",
            params![event.kind, event.timestamp, event.pid, event.command],
        )?;
        Ok(())
    }

    /// All events in `order`. With a limit, only the first `limit` rows of
    /// that order are returned, so `NewestFirst` yields the most recent ones.
    pub fn query_all(&self, order: Order, limit: Option<usize>) -> Result<Vec<Event>, StoreError> {
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        let sql = format!("{SELECT_EVENT} {} LIMIT ?", order.sql());
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit], Event::from_row)?;
        collect_events(rows)
    }

    /// Events with `since <= timestamp <= until`, oldest first.
    pub fn events_between(&self, since: i64, until: i64) -> Result<Vec<Event>, StoreError> {
        let sql = format!(
            "{SELECT_EVENT} WHERE ts BETWEEN datetime(?, 'unixepoch') AND datetime(?, 'unixepoch') {}",
            Order::OldestFirst.sql()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![since, until], Event::from_row)?;
        collect_events(rows)
    }

    pub fn most_recent_history_for(&self, pid: i64) -> Result<Option<String>, StoreError> {
        let cmdline: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT cmdline FROM entries WHERE entrytype = ? AND pid = ? \
                 ORDER BY ts DESC, rowid DESC LIMIT 1",
                params![EventKind::History, pid],
                |row| row.get(0),
            )
            .optional()?;
        Ok(cmdline.flatten())
    }
}

fn collect_events<I>(rows: I) -> Result<Vec<Event>, StoreError>
where
    I: Iterator<Item = rusqlite::Result<Option<Event>>>,
{
    let mut events = Vec::new();
    let mut skipped = 0usize;
    for row in rows {
        match row? {
            Some(event) => events.push(event),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!(skipped, "ignoring entries without a readable timestamp");
    }
    Ok(events)
}

fn backup_path(path: &Path, now: chrono::DateTime<chrono::Local>) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(now.format("_%Y%m%d_%H%M%S").to_string());
    PathBuf::from(name)
}
