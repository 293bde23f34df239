//! Batch importer: applies one batch of records inside one transaction.
//!
//! Row failures (constraint violations, bad values) are logged and skipped;
//! the rows around them still commit. Transaction failures (begin, prepare,
//! commit) discard the whole batch and report no progress.
//!
//! The cursor of the last row that was actually applied is handed to the
//! checkpoint store under the record's table name once the batch commits.

use std::sync::Arc;

use rusqlite::{params_from_iter, Connection, ErrorCode};
use serde::Serialize;

use zendb_core::ConflictPolicy;

use crate::checkpoint::CheckpointStore;
use crate::error::SyncError;
use crate::record::Record;
use crate::statements::StatementCache;

const CHILD_SAVEPOINT: &str = "child_import";

/// Result of applying one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// Records in the batch.
    pub records: usize,
    /// Rows inserted (or updated under [`ConflictPolicy::Update`]).
    pub applied: usize,
    /// Rows that failed and were skipped.
    pub failed: usize,
    /// Cursor of the last applied row, if any row was applied.
    pub last_cursor: Option<i64>,
    /// Whether the batch's transaction committed.
    pub committed: bool,
}

impl BatchOutcome {
    fn discarded(records: usize) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
pub struct BatchImporter {
    statements: Arc<StatementCache>,
    on_conflict: ConflictPolicy,
}

/// Handle given to [`Record::import_children`] for importing nested
/// collections inside the parent's transaction.
pub struct ChildImport<'a> {
    importer: &'a BatchImporter,
    conn: &'a Connection,
}

impl ChildImport<'_> {
    /// Import a child batch under a savepoint of the parent transaction.
    pub fn apply<C: Record>(&mut self, records: &[C]) -> BatchOutcome {
        self.importer.apply_nested(self.conn, records)
    }
}

impl BatchImporter {
    pub fn new(statements: Arc<StatementCache>, on_conflict: ConflictPolicy) -> Self {
        Self {
            statements,
            on_conflict,
        }
    }

    /// Apply `records` in one transaction and record progress in `checkpoints`.
    pub fn apply<R: Record>(
        &self,
        conn: &mut Connection,
        checkpoints: &mut CheckpointStore,
        records: &[R],
    ) -> BatchOutcome {
        let outcome = match self.run_transaction(conn, records) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(
                    "discarding batch of {} {} records: {err}",
                    records.len(),
                    R::TABLE
                );
                return BatchOutcome::discarded(records.len());
            }
        };

        if let Some(cursor) = outcome.last_cursor {
            // A failed write is logged by the store and leaves it unchanged.
            let _ = checkpoints.set(conn, R::TABLE, cursor);
        }
        tracing::debug!(
            "{}: {} applied, {} failed of {}",
            R::TABLE,
            outcome.applied,
            outcome.failed,
            outcome.records
        );
        outcome
    }

    /// Update `columns` of one stored record, matched on all of its key
    /// columns.
    ///
    /// The statement is built for this call only.
    pub fn update<R: Record>(
        &self,
        conn: &Connection,
        record: &R,
        columns: &[&str],
    ) -> Result<usize, SyncError> {
        if R::KEYS.is_empty() {
            return Err(SyncError::NoKeyColumn {
                entity: R::TABLE.to_string(),
            });
        }
        let values = record.values();
        let value_of = |column: &str| {
            R::COLUMNS
                .iter()
                .position(|c| *c == column)
                .and_then(|i| values.get(i).cloned())
                .ok_or_else(|| SyncError::UnknownColumn {
                    entity: R::TABLE.to_string(),
                    column: column.to_string(),
                })
        };

        let bound = columns
            .iter()
            .chain(R::KEYS)
            .map(|column| value_of(column))
            .collect::<Result<Vec<_>, _>>()?;

        let sql = self.statements.update(R::TABLE, columns, R::KEYS)?;
        Ok(conn.execute(&sql, params_from_iter(bound))?)
    }

    fn run_transaction<R: Record>(
        &self,
        conn: &mut Connection,
        records: &[R],
    ) -> Result<BatchOutcome, SyncError> {
        let tx = conn.transaction()?;
        let mut outcome = self.insert_all(&tx, records)?;
        tx.commit()?;
        outcome.committed = true;
        Ok(outcome)
    }

    fn apply_nested<R: Record>(&self, conn: &Connection, records: &[R]) -> BatchOutcome {
        match self.run_savepoint(conn, records) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(
                    "discarding nested batch of {} {} records: {err}",
                    records.len(),
                    R::TABLE
                );
                BatchOutcome::discarded(records.len())
            }
        }
    }

    fn run_savepoint<R: Record>(
        &self,
        conn: &Connection,
        records: &[R],
    ) -> Result<BatchOutcome, SyncError> {
        conn.execute_batch(&format!("SAVEPOINT {CHILD_SAVEPOINT}"))?;
        match self.insert_all(conn, records) {
            Ok(mut outcome) => {
                conn.execute_batch(&format!("RELEASE {CHILD_SAVEPOINT}"))?;
                outcome.committed = true;
                Ok(outcome)
            }
            Err(err) => {
                let _ = conn.execute_batch(&format!(
                    "ROLLBACK TO {CHILD_SAVEPOINT}; RELEASE {CHILD_SAVEPOINT}"
                ));
                Err(err)
            }
        }
    }

    fn insert_all<R: Record>(
        &self,
        conn: &Connection,
        records: &[R],
    ) -> Result<BatchOutcome, SyncError> {
        let sql = self.statements.insert(R::TABLE, R::COLUMNS)?;
        let mut stmt = conn.prepare_cached(&sql)?;
        let mut children = ChildImport {
            importer: self,
            conn,
        };
        let mut outcome = BatchOutcome {
            records: records.len(),
            ..BatchOutcome::default()
        };

        for record in records {
            let inserted = stmt.execute(params_from_iter(record.values()));
            // Children go in before the parent's result is looked at.
            record.import_children(&mut children);

            let result = match inserted {
                Err(err)
                    if self.on_conflict == ConflictPolicy::Update
                        && is_constraint_violation(&err) =>
                {
                    self.update_all_columns(conn, record)
                }
                other => other.map_err(SyncError::from),
            };

            match result {
                Ok(_) => {
                    outcome.applied += 1;
                    outcome.last_cursor = Some(record.cursor());
                }
                Err(err) => {
                    outcome.failed += 1;
                    tracing::warn!(
                        "failed to insert {} into {}: {err}",
                        record.cursor(),
                        R::TABLE
                    );
                }
            }
        }
        Ok(outcome)
    }

    fn update_all_columns<R: Record>(
        &self,
        conn: &Connection,
        record: &R,
    ) -> Result<usize, SyncError> {
        let columns: Vec<&str> = R::COLUMNS
            .iter()
            .copied()
            .filter(|column| !R::KEYS.contains(column) && !R::PRESERVED.contains(column))
            .collect();
        self.update(conn, record, &columns)
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation
    )
}
