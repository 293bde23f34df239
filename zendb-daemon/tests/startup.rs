use std::fs;
use std::path::Path;

use tempfile::TempDir;

use zendb_core::{Config, ConflictPolicy, DatabaseConfig, ScheduleConfig, ZendeskConfig};
use zendb_daemon::{prepare, DaemonError, SchedulerState};

fn config(db: &Path) -> Config {
    Config {
        zendesk: ZendeskConfig {
            subdomain: None,
            url: Some("http://127.0.0.1:9/api/v2".to_string()),
            user: "ops@example.com".to_string(),
            token: "secret".to_string(),
        },
        database: DatabaseConfig {
            path: db.to_path_buf(),
            on_conflict: ConflictPolicy::Skip,
        },
        schedule: ScheduleConfig {
            interval_secs: 3600,
        },
        post_process: Vec::new(),
    }
}

#[test]
fn unopenable_database_is_fatal() {
    let tmp = TempDir::new().expect("tmp");
    let blocker = tmp.path().join("not-a-dir");
    fs::write(&blocker, "plain file").expect("write blocker");

    let err = prepare(&config(&blocker.join("zendb.sqlite"))).unwrap_err();

    assert!(matches!(err, DaemonError::Io { .. } | DaemonError::Sync(_)));
}

#[tokio::test]
async fn prepared_scheduler_bootstraps_database_and_stops_cleanly() {
    let tmp = TempDir::new().expect("tmp");
    let db = tmp.path().join("data").join("zendb.sqlite");

    let mut scheduler = prepare(&config(&db)).expect("prepare");
    assert_eq!(scheduler.state(), SchedulerState::Running);
    assert!(db.exists());

    scheduler.stop();
    scheduler.join().await.expect("join");
    assert_eq!(scheduler.passes(), 0);
}
