//! Fixed-interval pass scheduler.
//!
//! `idle -> running -> stopped`. The first pass runs one full period after
//! `start`; passes never overlap and ticks missed while a pass runs are
//! skipped. `stop` only prevents the next pass, it never interrupts one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::DaemonError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug)]
pub struct Scheduler {
    period: Duration,
    state: SchedulerState,
    stop_tx: watch::Sender<bool>,
    passes: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(period: Duration) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            period,
            state: SchedulerState::Idle,
            stop_tx,
            passes: Arc::new(AtomicU64::new(0)),
            handle: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Passes completed so far.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }

    /// Begin invoking `job` every period on the blocking pool.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn start<F>(&mut self, job: F) -> Result<(), DaemonError>
    where
        F: FnMut() + Send + 'static,
    {
        if self.state != SchedulerState::Idle {
            return Err(DaemonError::AlreadyStarted(self.state));
        }
        let stop_rx = self.stop_tx.subscribe();
        let passes = Arc::clone(&self.passes);
        self.handle = Some(tokio::spawn(drive(self.period, job, stop_rx, passes)));
        self.state = SchedulerState::Running;
        tracing::info!(period_secs = self.period.as_secs(), "scheduler started");
        Ok(())
    }

    /// Idempotent. No pass begins after this returns.
    pub fn stop(&mut self) {
        match self.state {
            SchedulerState::Stopped => {}
            SchedulerState::Idle => self.state = SchedulerState::Stopped,
            SchedulerState::Running => {
                self.stop_tx.send_replace(true);
                self.state = SchedulerState::Stopped;
                tracing::info!("scheduler stopping");
            }
        }
    }

    /// Wait for the background loop, including a pass in progress.
    pub async fn join(&mut self) -> Result<(), DaemonError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        handle.await.map_err(|err| DaemonError::Join {
            task: "scheduler",
            message: err.to_string(),
        })
    }
}

async fn drive<F>(
    period: Duration,
    mut job: F,
    mut stop_rx: watch::Receiver<bool>,
    passes: Arc<AtomicU64>,
) where
    F: FnMut() + Send + 'static,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await; // consume the first immediate tick

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            _ = interval.tick() => {
                if *stop_rx.borrow() {
                    break;
                }
                // The job moves onto the blocking pool and comes back with the result.
                let outcome = tokio::task::spawn_blocking(move || {
                    job();
                    job
                })
                .await;
                match outcome {
                    Ok(returned) => {
                        job = returned;
                        passes.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "sync pass panicked, scheduler exiting");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use tokio::time::{advance, sleep};

    fn counting_job() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        (calls, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_first_tick_runs_no_pass() {
        let (calls, job) = counting_job();
        let mut scheduler = Scheduler::new(Duration::from_secs(60));

        scheduler.start(job).expect("start");
        advance(Duration::from_secs(30)).await;
        scheduler.stop();
        scheduler.join().await.expect("join");
        advance(Duration::from_secs(600)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.passes(), 0);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn passes_run_once_per_period() {
        let (calls, job) = counting_job();
        let mut scheduler = Scheduler::new(Duration::from_secs(10));

        scheduler.start(job).expect("start");
        sleep(Duration::from_secs(35)).await;
        scheduler.stop();
        scheduler.join().await.expect("join");

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.passes(), 3);

        sleep(Duration::from_secs(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3, "no pass after stop");
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_start_is_single_use() {
        let (_calls, job) = counting_job();
        let mut scheduler = Scheduler::new(Duration::from_secs(60));

        scheduler.start(job).expect("start");
        assert_eq!(scheduler.state(), SchedulerState::Running);
        scheduler.stop();
        scheduler.stop();
        scheduler.join().await.expect("join");
        scheduler.join().await.expect("second join is a no-op");

        let (_calls, job) = counting_job();
        let err = scheduler.start(job).unwrap_err();
        assert!(matches!(
            err,
            DaemonError::AlreadyStarted(SchedulerState::Stopped)
        ));
    }

    #[test]
    fn stop_while_idle_is_terminal() {
        let mut scheduler = Scheduler::new(Duration::from_secs(1));
        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }
}
