//! Checkpoint store: last processed cursor per feed.
//!
//! Checkpoints persist in the sink's `checkpoints` table, one row per feed.
//! The store keeps an in-memory copy plus a staleness flag:
//!
//! - a new store starts stale, so the first read always reloads;
//! - a successful [`CheckpointStore::set`] writes through and marks the copy
//!   stale instead of patching it;
//! - the next read after that reloads every checkpoint at once.
//!
//! A failed write leaves both the copy and the flag as they were.

use std::collections::HashMap;
use std::sync::Arc;

use rusqlite::{params, Connection};

use crate::error::SyncError;
use crate::statements::StatementCache;

pub const CHECKPOINT_TABLE: &str = "checkpoints";
const NAME_COLUMN: &str = "name";
const VALUE_COLUMN: &str = "last_value";

/// Cursor reported for feeds that were never synchronized.
pub const EPOCH: i64 = 0;

#[derive(Debug)]
pub struct CheckpointStore {
    statements: Arc<StatementCache>,
    values: HashMap<String, i64>,
    stale: bool,
    reloads: u64,
}

impl CheckpointStore {
    pub fn new(statements: Arc<StatementCache>) -> Self {
        Self {
            statements,
            values: HashMap::new(),
            stale: true,
            reloads: 0,
        }
    }

    /// Last known cursor for `feed`, or [`EPOCH`] if it has none.
    pub fn get(&mut self, conn: &Connection, feed: &str) -> i64 {
        self.refresh(conn);
        self.values.get(feed).copied().unwrap_or(EPOCH)
    }

    /// Every known checkpoint, refreshed first if stale.
    pub fn snapshot(&mut self, conn: &Connection) -> &HashMap<String, i64> {
        self.refresh(conn);
        &self.values
    }

    /// Persist `value` for `feed` (upsert by name) and mark the copy stale.
    pub fn set(&mut self, conn: &Connection, feed: &str, value: i64) -> Result<(), SyncError> {
        match self.write(conn, feed, value) {
            Ok(()) => {
                self.stale = true;
                tracing::debug!("checkpoint {feed} -> {value}");
                Ok(())
            }
            Err(err) => {
                tracing::error!("failed to commit checkpoint {feed} -> {value}: {err}");
                Err(err)
            }
        }
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Number of reloads from the sink attempted so far.
    pub fn reload_count(&self) -> u64 {
        self.reloads
    }

    fn refresh(&mut self, conn: &Connection) {
        if !self.stale {
            return;
        }
        self.reloads += 1;
        match self.load(conn) {
            Ok(values) => {
                self.values = values;
                self.stale = false;
            }
            Err(err) => {
                tracing::warn!("failed to reload checkpoints, using last known values: {err}");
            }
        }
    }

    fn load(&self, conn: &Connection) -> Result<HashMap<String, i64>, SyncError> {
        let sql = self
            .statements
            .select(CHECKPOINT_TABLE, &[NAME_COLUMN, VALUE_COLUMN], None)?;
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        let values = rows.collect::<Result<HashMap<_, _>, _>>()?;
        Ok(values)
    }

    fn write(&self, conn: &Connection, feed: &str, value: i64) -> Result<(), SyncError> {
        let update = self
            .statements
            .update(CHECKPOINT_TABLE, &[VALUE_COLUMN], &[NAME_COLUMN])?;
        let changed = conn.execute(&update, params![value, feed])?;
        if changed == 0 {
            let insert = self
                .statements
                .insert(CHECKPOINT_TABLE, &[NAME_COLUMN, VALUE_COLUMN])?;
            conn.execute(&insert, params![feed, value])?;
        }
        Ok(())
    }
}
