//! # zendb-sync
//!
//! Incremental synchronization engine: statement cache, checkpoint store,
//! transactional batch importer, SQLite sink, and the pass orchestrator.
//!
//! Build a [`SyncEngine`] from any [`Source`] and a [`SqliteSink`], then call
//! [`SyncEngine::run_once`] for each pass.

pub mod checkpoint;
pub mod engine;
pub mod error;
pub mod importer;
pub mod record;
pub mod sink;
pub mod source;
pub mod statements;
pub mod zendesk;

pub use checkpoint::CheckpointStore;
pub use engine::{FeedReport, FeedStatus, PassReport, SyncEngine};
pub use error::{SourceError, SyncError};
pub use importer::{BatchImporter, BatchOutcome};
pub use record::Record;
pub use sink::SqliteSink;
pub use source::Source;
pub use statements::{StatementCache, StatementKind};
pub use zendesk::ZendeskSource;
