use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn sunset(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("sunset").expect("binary");
    cmd.current_dir(home)
        .env("SUNSET_HOME", home)
        .env("SUNSET_CONFIG_PATH", home.join("missing.toml"))
        .env("SUNSET_ENDPOINT", "http://127.0.0.1:1")
        .env("SUNSET_TIMEOUT_SECS", "2")
        .env_remove("SUNSET_THRESHOLD_GB")
        .env_remove("SUNSET_POLL_INTERVAL_SECS")
        .env_remove("SUNSET_DEADLINE_SECS")
        .env_remove("SUNSET_WEBHOOK_URL")
        .env_remove("SUNSET_USERNAME")
        .env_remove("SUNSET_PASSWORD")
        .env_remove("SUNSET_LOGS_DIR");
    cmd
}

#[test]
fn step_rejects_unknown_step_naming_the_payload() {
    let tmp = tempdir().expect("tempdir");

    sunset(tmp.path())
        .arg("step")
        .arg("--payload")
        .arg("{\"step\":\"defragment_everything\"}")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid or missing 'step'"))
        .stderr(predicate::str::contains("defragment_everything"));
}

#[test]
fn step_rejects_payload_that_is_not_json() {
    let tmp = tempdir().expect("tempdir");

    sunset(tmp.path())
        .arg("step")
        .arg("--payload")
        .arg("not json at all")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not valid JSON"));
}

#[test]
fn step_kickoff_requires_an_index_field() {
    let tmp = tempdir().expect("tempdir");

    sunset(tmp.path())
        .arg("step")
        .arg("--payload")
        .arg("{\"step\":\"kickoff_archival\"}")
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing 'index'"));
}

#[test]
fn step_poll_rejects_incomplete_task_state() {
    let tmp = tempdir().expect("tempdir");

    sunset(tmp.path())
        .arg("step")
        .arg("--payload")
        .arg("{\"step\":\"poll_reindex_task\",\"index\":\"telemetry-data\"}")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid task state payload"));
}

#[test]
fn step_reads_the_payload_from_a_file() {
    let tmp = tempdir().expect("tempdir");
    let payload_path = tmp.path().join("request.json");
    std::fs::write(&payload_path, "{\"step\":\"compact_everything\"}\n").expect("write payload");

    sunset(tmp.path())
        .arg("step")
        .arg("--payload-file")
        .arg(&payload_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("compact_everything"));
}
