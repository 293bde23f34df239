//! Error types for zendb-sync.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the sink side: statement building, SQLite, checkpoints.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from SQLite (open, prepare, execute, commit).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A table or column name that is not a plain SQL identifier.
    #[error("invalid SQL identifier '{0}'")]
    InvalidIdentifier(String),

    /// A statement was requested without any value columns.
    #[error("no columns given for '{entity}'")]
    EmptyColumns { entity: String },

    /// An update named a column the record does not have.
    #[error("unknown column '{column}' for '{entity}'")]
    UnknownColumn { entity: String, column: String },

    /// An update was requested for a record type without a key column.
    #[error("'{entity}' has no key column to match updates on")]
    NoKeyColumn { entity: String },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors reported by a [`Source`](crate::source::Source) while fetching pages.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport-level failure (DNS, TLS, connection reset, ...).
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// Non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Still throttled after the retry budget was spent.
    #[error("rate limited by {url} after {attempts} attempts")]
    RateLimited { url: String, attempts: u32 },

    /// The page body was not the JSON shape we expect.
    #[error("malformed page from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The page body did not carry the expected record array.
    #[error("page from {url} has no '{collection}' array")]
    MissingCollection { url: String, collection: String },

    /// Free-form failure from non-HTTP sources.
    #[error("{0}")]
    Other(String),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
