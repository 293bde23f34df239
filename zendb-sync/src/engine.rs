//! Sync engine: one full pass across every feed.
//!
//! Feeds run in [`Feed::PASS_ORDER`]. Lookup feeds are re-listed in full;
//! cursor feeds read their checkpoint, stream everything newer from the
//! source into the sink, then commit the cursor the source returned.
//!
//! A cursor feed only advances when every one of its batches committed and
//! the source finished cleanly. Each feed fails on its own: a broken feed is
//! logged in the report and the pass moves on.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use zendb_core::types::{Feed, Group, Organization, Ticket, TicketField, TicketMetric, User};
use zendb_core::Resource;

use crate::importer::BatchOutcome;
use crate::record::Record;
use crate::sink::SqliteSink;
use crate::source::Source;

/// How a single feed ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FeedStatus {
    /// Lookup feed listed and imported in full.
    Listed,
    /// Checkpoint advanced from `from` to `to`.
    Synced { from: i64, to: i64 },
    /// The source reported nothing newer than `at`.
    Unchanged { at: i64 },
    /// Some batches were discarded, so the checkpoint stays at `at`.
    Held { at: i64 },
    /// The source or the checkpoint commit failed.
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedReport {
    pub feed: Feed,
    #[serde(flatten)]
    pub status: FeedStatus,
    pub batches: usize,
    pub applied: usize,
    pub failed: usize,
    pub discarded_batches: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostProcessReport {
    pub statement: String,
    pub rows: Option<usize>,
    pub error: Option<String>,
}

/// Outcome of one pass.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub feeds: Vec<FeedReport>,
    pub post_process: Vec<PostProcessReport>,
    pub duration_ms: u128,
}

impl PassReport {
    pub fn feed(&self, feed: Feed) -> Option<&FeedReport> {
        self.feeds.iter().find(|report| report.feed == feed)
    }

    pub fn failed_feeds(&self) -> usize {
        self.feeds
            .iter()
            .filter(|report| matches!(report.status, FeedStatus::Failed { .. }))
            .count()
    }
}

#[derive(Debug, Default)]
struct Tally {
    batches: usize,
    applied: usize,
    failed: usize,
    discarded: usize,
}

impl Tally {
    fn add(&mut self, outcome: BatchOutcome) {
        self.batches += 1;
        self.applied += outcome.applied;
        self.failed += outcome.failed;
        if !outcome.committed {
            self.discarded += 1;
        }
    }

    fn finish(self, feed: Feed, status: FeedStatus) -> FeedReport {
        FeedReport {
            feed,
            status,
            batches: self.batches,
            applied: self.applied,
            failed: self.failed,
            discarded_batches: self.discarded,
        }
    }
}

pub struct SyncEngine<S> {
    source: S,
    sink: SqliteSink,
    post_process: Vec<String>,
}

impl<S: Source> SyncEngine<S> {
    pub fn new(source: S, sink: SqliteSink) -> Self {
        Self {
            source,
            sink,
            post_process: Vec::new(),
        }
    }

    /// Raw statements to run verbatim after every pass.
    pub fn with_post_process(mut self, statements: Vec<String>) -> Self {
        self.post_process = statements;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn sink(&self) -> &SqliteSink {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut SqliteSink {
        &mut self.sink
    }

    /// Run every feed once. Never fails; problems land in the report.
    pub fn run_once(&mut self) -> PassReport {
        let started = Instant::now();
        let feeds: Vec<FeedReport> = Feed::PASS_ORDER
            .into_iter()
            .map(|feed| self.run_feed(feed))
            .collect();
        let post_process = self.run_post_process();

        let report = PassReport {
            feeds,
            post_process,
            duration_ms: started.elapsed().as_millis(),
        };
        tracing::info!(
            "pass finished in {}ms: {} feeds, {} failed",
            report.duration_ms,
            report.feeds.len(),
            report.failed_feeds()
        );
        report
    }

    fn run_feed(&mut self, feed: Feed) -> FeedReport {
        match feed {
            Feed::TicketFields => self.list::<TicketField>(feed),
            Feed::Groups => self.list::<Group>(feed),
            Feed::Organizations => self.export::<Organization>(feed),
            Feed::Users => self.export::<User>(feed),
            Feed::Tickets => self.export::<Ticket>(feed),
            Feed::TicketMetrics => self.list::<TicketMetric>(feed),
        }
    }

    fn list<R: Resource + Record>(&mut self, feed: Feed) -> FeedReport {
        let Self { source, sink, .. } = self;
        let mut tally = Tally::default();

        tracing::info!("listing {feed}");
        let result = source.list_all::<R>(&mut |batch: Vec<R>| tally.add(sink.import(&batch)));

        let status = match result {
            Ok(()) => FeedStatus::Listed,
            Err(err) => {
                tracing::error!("{feed}: source failed: {err}");
                FeedStatus::Failed {
                    error: err.to_string(),
                }
            }
        };
        tally.finish(feed, status)
    }

    fn export<R: Resource + Record>(&mut self, feed: Feed) -> FeedReport {
        let name = feed.checkpoint_name().unwrap_or(feed.as_str());
        let Self { source, sink, .. } = self;
        let mut tally = Tally::default();

        let from = sink.checkpoint(name);
        tracing::info!("fetching {feed} updates since {}", format_cursor(from));
        let result =
            source.export_since::<R>(from, &mut |batch: Vec<R>| tally.add(sink.import(&batch)));

        let status = match result {
            Err(err) => {
                tracing::error!("{feed}: source failed: {err}");
                FeedStatus::Failed {
                    error: err.to_string(),
                }
            }
            Ok(_) if tally.discarded > 0 => {
                tracing::warn!(
                    "{feed}: {} batch(es) discarded, holding {name} at {from}",
                    tally.discarded
                );
                FeedStatus::Held { at: from }
            }
            Ok(to) if to <= from => FeedStatus::Unchanged { at: from },
            Ok(to) => match sink.commit_checkpoint(name, to) {
                Ok(()) => FeedStatus::Synced { from, to },
                Err(err) => FeedStatus::Failed {
                    error: format!("checkpoint commit failed: {err}"),
                },
            },
        };
        tally.finish(feed, status)
    }

    fn run_post_process(&self) -> Vec<PostProcessReport> {
        self.post_process
            .iter()
            .map(|statement| match self.sink.exec_raw_unchecked(statement) {
                Ok(rows) => {
                    tracing::debug!("post-process statement affected {rows} rows");
                    PostProcessReport {
                        statement: statement.clone(),
                        rows: Some(rows),
                        error: None,
                    }
                }
                Err(err) => {
                    tracing::warn!("post-process statement failed: {err}");
                    PostProcessReport {
                        statement: statement.clone(),
                        rows: None,
                        error: Some(err.to_string()),
                    }
                }
            })
            .collect()
    }
}

/// Render a cursor as a timestamp when it looks like one.
pub fn format_cursor(cursor: i64) -> String {
    match DateTime::<Utc>::from_timestamp(cursor, 0) {
        Some(ts) if cursor > 0 => ts.to_rfc3339(),
        _ => cursor.to_string(),
    }
}
