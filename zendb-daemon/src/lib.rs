//! Scheduler runtime: drives sync passes on a fixed interval.

mod error;
mod runtime;
pub mod scheduler;

pub use error::DaemonError;
pub use runtime::{init_tracing, log_pass, prepare, run, start_blocking};
pub use scheduler::{Scheduler, SchedulerState};
