//! SQLite sink: owns the connection, the checkpoint store and the importer.
//!
//! Opening a sink creates any missing tables. Existing tables are never
//! altered.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;

use zendb_core::{ConflictPolicy, DatabaseConfig};

use crate::checkpoint::CheckpointStore;
use crate::error::{io_err, SyncError};
use crate::importer::{BatchImporter, BatchOutcome};
use crate::record::Record;
use crate::statements::StatementCache;

/// Tables the synchronizer writes to.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS checkpoints (
    name        TEXT PRIMARY KEY,
    last_value  INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS ticket_fields (
    id     INTEGER PRIMARY KEY,
    title  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS groups (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS organizations (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL,
    group_id    INTEGER
);
CREATE TABLE IF NOT EXISTS users (
    id                INTEGER PRIMARY KEY,
    email             TEXT,
    name              TEXT NOT NULL,
    created_at        INTEGER NOT NULL,
    organization_id   INTEGER,
    default_group_id  INTEGER,
    role              TEXT NOT NULL,
    time_zone         TEXT,
    updated_at        INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS tickets (
    id               INTEGER PRIMARY KEY,
    subject          TEXT,
    status           TEXT NOT NULL,
    requester_id     INTEGER,
    submitter_id     INTEGER,
    assignee_id      INTEGER,
    organization_id  INTEGER,
    group_id         INTEGER,
    created_at       INTEGER NOT NULL,
    updated_at       INTEGER NOT NULL,
    version          TEXT NOT NULL DEFAULT '',
    component        TEXT NOT NULL DEFAULT '',
    priority         TEXT NOT NULL DEFAULT '',
    solved_at        INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS ticket_metadata (
    ticket_id  INTEGER NOT NULL,
    field_id   INTEGER NOT NULL,
    value      TEXT,
    PRIMARY KEY (ticket_id, field_id)
);
CREATE TABLE IF NOT EXISTS ticket_metrics (
    id          INTEGER PRIMARY KEY,
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL,
    ticket_id   INTEGER NOT NULL,
    replies     INTEGER NOT NULL,
    solved_at   INTEGER NOT NULL
);
";

#[derive(Debug)]
pub struct SqliteSink {
    conn: Connection,
    checkpoints: CheckpointStore,
    importer: BatchImporter,
}

impl SqliteSink {
    /// Open (creating if needed) the database named in `config`.
    pub fn open(config: &DatabaseConfig) -> Result<Self, SyncError> {
        if let Some(dir) = config.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        Self::with_connection(Connection::open(&config.path)?, config.on_conflict)
    }

    /// Open a database file with the default conflict policy.
    pub fn open_path(path: &Path) -> Result<Self, SyncError> {
        Self::open(&DatabaseConfig {
            path: path.to_path_buf(),
            on_conflict: ConflictPolicy::default(),
        })
    }

    pub fn open_in_memory(on_conflict: ConflictPolicy) -> Result<Self, SyncError> {
        Self::with_connection(Connection::open_in_memory()?, on_conflict)
    }

    fn with_connection(conn: Connection, on_conflict: ConflictPolicy) -> Result<Self, SyncError> {
        conn.execute_batch(SCHEMA)?;
        let statements = Arc::new(StatementCache::new());
        Ok(Self {
            conn,
            checkpoints: CheckpointStore::new(Arc::clone(&statements)),
            importer: BatchImporter::new(statements, on_conflict),
        })
    }

    /// Apply one batch of records in a single transaction.
    pub fn import<R: Record>(&mut self, batch: &[R]) -> BatchOutcome {
        self.importer
            .apply(&mut self.conn, &mut self.checkpoints, batch)
    }

    /// Update `columns` of one stored record matched on its key column.
    pub fn update<R: Record>(&self, record: &R, columns: &[&str]) -> Result<usize, SyncError> {
        self.importer.update(&self.conn, record, columns)
    }

    /// Last committed cursor for `feed`.
    pub fn checkpoint(&mut self, feed: &str) -> i64 {
        self.checkpoints.get(&self.conn, feed)
    }

    /// Every stored checkpoint.
    pub fn fetch_checkpoints(&mut self) -> HashMap<String, i64> {
        self.checkpoints.snapshot(&self.conn).clone()
    }

    pub fn commit_checkpoint(&mut self, feed: &str, value: i64) -> Result<(), SyncError> {
        self.checkpoints.set(&self.conn, feed, value)
    }

    /// Execute one operator-supplied statement verbatim.
    ///
    /// No parameter binding, no transaction, no identifier checks: the text
    /// goes to SQLite exactly as given. Only pass trusted statements.
    pub fn exec_raw_unchecked(&self, sql: &str) -> Result<usize, SyncError> {
        Ok(self.conn.execute(sql, [])?)
    }

    pub fn checkpoint_store(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
