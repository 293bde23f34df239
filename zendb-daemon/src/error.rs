use std::path::PathBuf;

use thiserror::Error;

use crate::scheduler::SchedulerState;

/// Error surface for the scheduler and the daemon runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] zendb_core::ConfigError),

    #[error("sink error: {0}")]
    Sync(#[from] zendb_sync::SyncError),

    #[error("source error: {0}")]
    Source(#[from] zendb_sync::SourceError),

    #[error("scheduler cannot start from state {0:?}")]
    AlreadyStarted(SchedulerState),

    #[error("{task} task join failure: {message}")]
    Join { task: &'static str, message: String },

    #[error("ctrl-c handler failed: {0}")]
    Signal(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
