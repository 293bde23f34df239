//! Full-pass behaviour of the sync engine against an in-process source.

use std::collections::{HashMap, HashSet};

use serde_json::{json, Value};
use tempfile::TempDir;

use zendb_core::types::Feed;
use zendb_core::{ConflictPolicy, Resource};
use zendb_sync::{FeedStatus, Source, SourceError, SqliteSink, SyncEngine};

/// Serves canned pages per collection and records every call it receives.
#[derive(Default)]
struct ScriptedSource {
    pages: HashMap<&'static str, Vec<Vec<Value>>>,
    end_cursors: HashMap<&'static str, i64>,
    failing: HashSet<&'static str>,
    calls: Vec<String>,
}

impl ScriptedSource {
    fn page(mut self, collection: &'static str, records: Vec<Value>) -> Self {
        self.pages.entry(collection).or_default().push(records);
        self
    }

    fn ends_at(mut self, collection: &'static str, cursor: i64) -> Self {
        self.end_cursors.insert(collection, cursor);
        self
    }

    fn failing(mut self, collection: &'static str) -> Self {
        self.failing.insert(collection);
        self
    }

    fn replay<R: Resource>(
        &self,
        on_batch: &mut dyn FnMut(Vec<R>),
    ) -> Result<(), SourceError> {
        if self.failing.contains(R::COLLECTION) {
            return Err(SourceError::Other(format!("{} endpoint unavailable", R::COLLECTION)));
        }
        for page in self.pages.get(R::COLLECTION).cloned().unwrap_or_default() {
            let records: Vec<R> =
                serde_json::from_value(Value::Array(page)).expect("fixture page deserializes");
            on_batch(records);
        }
        Ok(())
    }
}

impl Source for ScriptedSource {
    fn export_since<R: Resource>(
        &mut self,
        since: i64,
        on_batch: &mut dyn FnMut(Vec<R>),
    ) -> Result<i64, SourceError> {
        self.calls.push(format!("export {} since {since}", R::COLLECTION));
        self.replay(on_batch)?;
        Ok(self.end_cursors.get(R::COLLECTION).copied().unwrap_or(since))
    }

    fn list_all<R: Resource>(
        &mut self,
        on_batch: &mut dyn FnMut(Vec<R>),
    ) -> Result<(), SourceError> {
        self.calls.push(format!("list {}", R::COLLECTION));
        self.replay(on_batch)
    }
}

fn user(id: i64) -> Value {
    json!({
        "id": id,
        "name": format!("user {id}"),
        "email": format!("user{id}@example.com"),
        "role": "end-user",
        "created_at": "2017-03-01T00:00:00Z",
        "updated_at": "2017-03-02T00:00:00Z"
    })
}

fn organization(id: i64) -> Value {
    json!({
        "id": id,
        "name": format!("org {id}"),
        "created_at": "2017-03-01T00:00:00Z",
        "updated_at": "2017-03-02T00:00:00Z"
    })
}

fn ticket(id: i64) -> Value {
    json!({
        "id": id,
        "subject": "broker down",
        "status": "open",
        "created_at": "2017-03-01T00:00:00Z",
        "updated_at": "2017-03-02T00:00:00Z",
        "custom_fields": [{"id": 360, "value": "p1"}]
    })
}

fn count(sink: &SqliteSink, table: &str) -> i64 {
    sink.connection()
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .expect("count")
}

fn memory_sink() -> SqliteSink {
    SqliteSink::open_in_memory(ConflictPolicy::Skip).expect("sink")
}

#[test]
fn duplicate_user_is_skipped_and_checkpoint_reaches_last_committed() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut sink = memory_sink();
    sink.commit_checkpoint("user_export", 1000).expect("seed checkpoint");
    let seeded = sink.import::<zendb_core::User>(&[serde_json::from_value(user(1002)).unwrap()]);
    assert!(seeded.committed);

    let source = ScriptedSource::default()
        .page("users", vec![user(1001), user(1002), user(1003)])
        .ends_at("users", 1003);
    let mut engine = SyncEngine::new(source, sink);

    let report = engine.run_once();

    let users = report.feed(Feed::Users).expect("users report");
    assert_eq!(users.status, FeedStatus::Synced { from: 1000, to: 1003 });
    assert_eq!(users.applied, 2);
    assert_eq!(users.failed, 1);
    assert!(engine
        .source()
        .calls
        .contains(&"export users since 1000".to_string()));

    let sink = engine.sink_mut();
    assert_eq!(sink.checkpoint("user_export"), 1003);
    assert_eq!(sink.checkpoint("users"), 1003);
    assert_eq!(count(sink, "users"), 3);
}

#[test]
fn feeds_run_in_dependency_order() {
    let mut engine = SyncEngine::new(ScriptedSource::default(), memory_sink());
    engine.run_once();

    assert_eq!(
        engine.source().calls,
        vec![
            "list ticket_fields",
            "list groups",
            "export organizations since 0",
            "export users since 0",
            "export tickets since 0",
            "list ticket_metrics",
        ]
    );
}

#[test]
fn failing_feed_does_not_stop_later_feeds() {
    let source = ScriptedSource::default()
        .failing("organizations")
        .page("organizations", vec![organization(1)])
        .page("users", vec![user(1)])
        .ends_at("users", 1_490_000_000)
        .page("tickets", vec![ticket(1)])
        .ends_at("tickets", 1_490_000_500);
    let mut engine = SyncEngine::new(source, memory_sink());

    let report = engine.run_once();

    assert!(matches!(
        report.feed(Feed::Organizations).map(|r| &r.status),
        Some(FeedStatus::Failed { .. })
    ));
    assert_eq!(report.failed_feeds(), 1);
    assert!(matches!(
        report.feed(Feed::Users).map(|r| &r.status),
        Some(FeedStatus::Synced { .. })
    ));
    assert!(matches!(
        report.feed(Feed::Tickets).map(|r| &r.status),
        Some(FeedStatus::Synced { .. })
    ));
    assert!(engine
        .source()
        .calls
        .contains(&"list ticket_metrics".to_string()));

    let sink = engine.sink_mut();
    assert_eq!(sink.checkpoint("organization_export"), 0);
    assert_eq!(sink.checkpoint("ticket_export"), 1_490_000_500);
    assert_eq!(count(sink, "ticket_metadata"), 1);
}

#[test]
fn discarded_batch_holds_the_feed_checkpoint() {
    let mut sink = memory_sink();
    sink.commit_checkpoint("ticket_export", 1_400_000_000).unwrap();
    sink.exec_raw_unchecked("DROP TABLE tickets").unwrap();

    let source = ScriptedSource::default()
        .page("tickets", vec![ticket(5), ticket(6)])
        .ends_at("tickets", 1_490_000_000);
    let mut engine = SyncEngine::new(source, sink);

    let report = engine.run_once();

    let tickets = report.feed(Feed::Tickets).expect("tickets report");
    assert_eq!(tickets.status, FeedStatus::Held { at: 1_400_000_000 });
    assert_eq!(tickets.discarded_batches, 1);
    assert_eq!(engine.sink_mut().checkpoint("ticket_export"), 1_400_000_000);
}

#[test]
fn cursor_that_did_not_move_is_not_committed() {
    let mut sink = memory_sink();
    sink.commit_checkpoint("organization_export", 500).unwrap();
    let source = ScriptedSource::default().ends_at("organizations", 400);
    let mut engine = SyncEngine::new(source, sink);

    let report = engine.run_once();

    assert_eq!(
        report.feed(Feed::Organizations).map(|r| &r.status),
        Some(&FeedStatus::Unchanged { at: 500 })
    );
    assert_eq!(engine.sink_mut().checkpoint("organization_export"), 500);
}

#[test]
fn restart_resumes_from_committed_checkpoint() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("zendb.sqlite");

    {
        let source = ScriptedSource::default()
            .page("users", vec![user(1), user(2)])
            .ends_at("users", 1_490_000_000);
        let mut engine = SyncEngine::new(source, SqliteSink::open_path(&path).unwrap());
        engine.run_once();
    }

    let mut engine = SyncEngine::new(
        ScriptedSource::default(),
        SqliteSink::open_path(&path).unwrap(),
    );
    engine.run_once();
    assert!(engine
        .source()
        .calls
        .contains(&"export users since 1490000000".to_string()));
}

#[test]
fn post_process_failures_are_reported_not_raised() {
    let source = ScriptedSource::default().page(
        "ticket_fields",
        vec![json!({"id": 360, "title": "Case Priority"})],
    );
    let mut engine = SyncEngine::new(source, memory_sink()).with_post_process(vec![
        "UPDATE ticket_fields SET title = upper(title)".to_string(),
        "UPDATE no_such_table SET x = 1".to_string(),
    ]);

    let report = engine.run_once();

    assert_eq!(report.post_process.len(), 2);
    assert_eq!(report.post_process[0].rows, Some(1));
    assert!(report.post_process[1].error.is_some());
    assert_eq!(report.failed_feeds(), 0);
}

#[test]
fn report_serializes_with_flat_status() {
    let mut engine = SyncEngine::new(ScriptedSource::default(), memory_sink());
    let report = engine.run_once();
    let json = serde_json::to_value(&report).expect("json");
    assert_eq!(json["feeds"][0]["feed"], "ticket_fields");
    assert_eq!(json["feeds"][0]["status"], "listed");
    assert_eq!(json["feeds"][2]["status"], "unchanged");
}
