#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A config that never waits on hardware: ports are missing, so both links
/// degrade to mocked immediately, and media is mocked.
const OFFLINE_CONFIG: &str = "\
hardware:
  mode: production
  media: mock
timing:
  connect_timeout_ms: 0
  poll_interval_ms: 10
  shutdown_grace_ms: 1000
server:
  enabled: false
";

fn diorama(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("diorama").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("DIORAMA_CONFIG")
        .env_remove("AUM_ENVIRONMENT")
        .env_remove("MAIN_CONTROLLER_PORT")
        .env_remove("ROBOTIC_ARM_PORT")
        .env_remove("GEMINI_API_KEY")
        .env_remove("GOOGLE_API_KEY");
    cmd
}

fn offline(dir: &TempDir) -> Command {
    let path = dir.path().join("diorama.yaml");
    std::fs::write(&path, OFFLINE_CONFIG).unwrap();
    let mut cmd = diorama(dir);
    cmd.arg("--config").arg(path);
    cmd
}

// ---------------------------------------------------------------------------
// diorama scenes
// ---------------------------------------------------------------------------

#[test]
fn scenes_lists_primary_scenes_only() {
    let dir = TempDir::new().unwrap();
    diorama(&dir)
        .arg("scenes")
        .assert()
        .success()
        .stdout(predicate::str::contains("AUMS_HOME"))
        .stdout(predicate::str::contains("INTERNET_CAFE"))
        .stdout(predicate::str::contains("GUIDED_MODE_").not());
}

#[test]
fn scenes_all_includes_aliases() {
    let dir = TempDir::new().unwrap();
    diorama(&dir)
        .args(["scenes", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ALIAS OF"))
        .stdout(predicate::str::contains("GUIDED_MODE_MARKET"));
}

#[test]
fn scenes_json_is_machine_readable() {
    let dir = TempDir::new().unwrap();
    let output = diorama(&dir)
        .args(["--json", "scenes", "--all"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rows = rows.as_array().unwrap();
    assert!(rows
        .iter()
        .any(|r| r["name"] == "GUIDED_MODE_GOOGLE_MAP" && r["alias_of"] == "GOOGLE_MAP"));
    assert!(rows
        .iter()
        .any(|r| r["name"] == "IDLE" && r.get("alias_of").is_none()));
}

#[test]
fn scenes_reads_custom_table() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("scenes.yaml"),
        "LOBBY:\n  - action: trigger_scene\n    params: { scene_command_id: 1 }\nFRONT: LOBBY\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("diorama.yaml"), "scenes_file: scenes.yaml\n").unwrap();
    diorama(&dir)
        .args(["--config", "diorama.yaml", "scenes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("LOBBY"))
        .stdout(predicate::str::contains("AUMS_HOME").not());
}

#[test]
fn missing_config_file_fails() {
    let dir = TempDir::new().unwrap();
    diorama(&dir)
        .args(["--config", "nope.yaml", "scenes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

// ---------------------------------------------------------------------------
// diorama turn
// ---------------------------------------------------------------------------

#[test]
fn turn_without_credentials_fails() {
    let dir = TempDir::new().unwrap();
    offline(&dir)
        .args(["turn", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GEMINI_API_KEY"));
}

#[test]
fn story_without_credentials_fails() {
    let dir = TempDir::new().unwrap();
    offline(&dir)
        .args(["story", "a lost kitten"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GEMINI_API_KEY"));
}

// ---------------------------------------------------------------------------
// diorama scene
// ---------------------------------------------------------------------------

#[test]
fn scene_runs_against_mocked_hardware() {
    let dir = TempDir::new().unwrap();
    let output = offline(&dir)
        .args(["--json", "scene", "GUIDED_MODE_MARKET"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["requested"], "GUIDED_MODE_MARKET");
    assert_eq!(report["resolution"]["kind"], "resolved");
    assert_eq!(report["resolution"]["scene"], "MARKET");
    let actions = report["actions"].as_array().unwrap();
    assert_eq!(actions.len(), 3);
    assert!(actions.iter().all(|a| a["status"] == "completed"));
    assert_eq!(actions[0]["detail"]["kind"], "mocked");
}

#[test]
fn scene_reports_rejected_parameters() {
    let dir = TempDir::new().unwrap();
    // IDLE triggers scene id 0, which the controller range rejects.
    offline(&dir)
        .args(["scene", "IDLE"])
        .assert()
        .success()
        .stdout(predicate::str::contains("failed"))
        .stdout(predicate::str::contains("1/2 actions completed"));
}

#[test]
fn unknown_scene_fails() {
    let dir = TempDir::new().unwrap();
    offline(&dir)
        .args(["scene", "ATLANTIS"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("scene 'ATLANTIS' not found"));
}
