use zendb_core::Config;
use zendb_sync::{FeedStatus, PassReport, SqliteSink, SyncEngine, ZendeskSource};

use crate::error::{io_err, DaemonError};
use crate::scheduler::Scheduler;

const LOG_JSON_ENV: &str = "ZENDB_LOG_JSON";

/// Start the scheduler runtime and block the current thread until ctrl-c.
pub fn start_blocking(config: Config) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Open the sink and source, then run passes on the configured interval
/// until ctrl-c.
pub async fn run(config: Config) -> Result<(), DaemonError> {
    let mut scheduler = prepare(&config)?;

    let signal = tokio::signal::ctrl_c().await;
    match &signal {
        Ok(()) => tracing::info!("received ctrl-c, stopping scheduler"),
        Err(err) => tracing::error!(error = %err, "ctrl-c handler failed, stopping scheduler"),
    }
    scheduler.stop();
    scheduler.join().await?;
    signal.map_err(|err| DaemonError::Signal(err.to_string()))
}

/// Build the engine and hand it to a started scheduler.
///
/// Any failure here is fatal: nothing has been scheduled yet.
pub fn prepare(config: &Config) -> Result<Scheduler, DaemonError> {
    let sink = SqliteSink::open(&config.database)?;
    let source = ZendeskSource::new(&config.zendesk)?;
    let mut engine = SyncEngine::new(source, sink).with_post_process(config.post_process.clone());

    tracing::info!(
        database = %config.database.path.display(),
        interval_secs = config.schedule.interval_secs,
        "sync engine ready",
    );

    let mut scheduler = Scheduler::new(config.schedule.interval());
    scheduler.start(move || log_pass(&engine.run_once()))?;
    Ok(scheduler)
}

/// Emit one structured line per feed plus a pass summary.
pub fn log_pass(report: &PassReport) {
    for feed in &report.feeds {
        match &feed.status {
            FeedStatus::Failed { error } => {
                tracing::error!(feed = %feed.feed, error = %error, "feed failed");
            }
            FeedStatus::Held { at } => {
                tracing::warn!(
                    feed = %feed.feed,
                    checkpoint = at,
                    discarded_batches = feed.discarded_batches,
                    "feed held at checkpoint",
                );
            }
            status => {
                tracing::info!(
                    feed = %feed.feed,
                    status = ?status,
                    applied = feed.applied,
                    failed = feed.failed,
                    "feed synced",
                );
            }
        }
    }
    tracing::info!(
        feeds = report.feeds.len(),
        failed_feeds = report.failed_feeds(),
        post_process = report.post_process.len(),
        duration_ms = report.duration_ms as u64,
        "sync pass completed",
    );
}

/// Install the fmt subscriber; `RUST_LOG` overrides the `info` default and
/// a set `ZENDB_LOG_JSON` switches to one JSON object per line.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = if std::env::var_os(LOG_JSON_ENV).is_some() {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
