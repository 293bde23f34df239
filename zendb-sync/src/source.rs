//! Source seam: where record pages come from.
//!
//! The engine only ever asks a source for two things: every record of a
//! lookup collection, or every record changed since a cursor. Batches are
//! pushed to `on_batch` as pages arrive, so a long export never sits fully
//! in memory.

use zendb_core::Resource;

use crate::error::SourceError;

pub trait Source {
    /// Stream every record changed since `since`, returning the cursor of
    /// the newest change observed (or `since` when nothing changed).
    fn export_since<R: Resource>(
        &mut self,
        since: i64,
        on_batch: &mut dyn FnMut(Vec<R>),
    ) -> Result<i64, SourceError>;

    /// Stream every record of a collection.
    fn list_all<R: Resource>(&mut self, on_batch: &mut dyn FnMut(Vec<R>))
        -> Result<(), SourceError>;
}
