use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn zendb_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("zendb"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1");
    cmd
}

/// Config pointing at a scratch database and an unreachable source.
fn write_config(dir: &Path, file_name: &str) -> PathBuf {
    let db = dir.join("data").join("zendb.sqlite");
    let path = dir.join(file_name);
    let contents = format!(
        "zendesk:\n  url: http://127.0.0.1:9/api/v2\n  user: ops@example.com\n  token: secret\n\
         database:\n  path: {}\nschedule:\n  interval_secs: 60\n",
        db.display()
    );
    fs::write(&path, contents).expect("write config");
    path
}

#[test]
fn checkpoints_on_fresh_database_reports_none() {
    let home = TempDir::new().expect("home");
    let config = write_config(home.path(), "config.yaml");

    zendb_cmd(home.path())
        .arg("checkpoints")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(contains("No checkpoints stored yet."));

    assert!(home.path().join("data").join("zendb.sqlite").exists());
}

#[test]
fn exec_runs_raw_statement_and_checkpoints_lists_it() {
    let home = TempDir::new().expect("home");
    let config = write_config(home.path(), "config.yaml");

    zendb_cmd(home.path())
        .arg("exec")
        .arg("--config")
        .arg(&config)
        .arg("INSERT INTO checkpoints (name, last_value) VALUES ('ticket_export', 1490000000)")
        .assert()
        .success()
        .stdout(contains("1 row(s) affected"));

    zendb_cmd(home.path())
        .arg("checkpoints")
        .arg("--json")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(contains("\"name\": \"ticket_export\""))
        .stdout(contains("\"last_value\": 1490000000"))
        .stdout(contains("2017-03-20T08:53:20+00:00"));
}

#[test]
fn exec_reports_broken_statement() {
    let home = TempDir::new().expect("home");
    let config = write_config(home.path(), "config.yaml");

    zendb_cmd(home.path())
        .arg("exec")
        .arg("--config")
        .arg(&config)
        .arg("UPDATE no_such_table SET x = 1")
        .assert()
        .failure()
        .stderr(contains("statement failed"));
}

#[test]
fn default_config_path_is_under_home() {
    let home = TempDir::new().expect("home");
    let dir = home.path().join(".zendb");
    fs::create_dir_all(&dir).expect("config dir");
    write_config(&dir, "config.yaml");

    zendb_cmd(home.path())
        .arg("checkpoints")
        .assert()
        .success()
        .stdout(contains("No checkpoints stored yet."));
}

#[test]
fn missing_config_is_fatal() {
    let home = TempDir::new().expect("home");

    zendb_cmd(home.path())
        .arg("checkpoints")
        .arg("--config")
        .arg(home.path().join("absent.yaml"))
        .assert()
        .failure()
        .stderr(contains("failed to load config"));
}

#[test]
fn invalid_interval_is_fatal() {
    let home = TempDir::new().expect("home");
    let path = home.path().join("config.yaml");
    fs::write(
        &path,
        "zendesk:\n  subdomain: acme\n  user: a\n  token: b\n\
         database:\n  path: zendb.sqlite\nschedule:\n  interval_secs: 0\n",
    )
    .expect("write config");

    zendb_cmd(home.path())
        .arg("run")
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(contains("failed to load config"));
}

#[test]
fn sync_against_unreachable_source_reports_every_feed_failed() {
    let home = TempDir::new().expect("home");
    let config = write_config(home.path(), "config.yaml");

    zendb_cmd(home.path())
        .arg("sync")
        .arg("--json")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stdout(contains("\"feed\": \"tickets\""))
        .stdout(contains("\"status\": \"failed\""))
        .stderr(contains("6 feed(s) failed"));
}
