//! Integration tests for the stride binary.
//!
//! These tests stay offline: plan creation uses --no-generate, and no test
//! touches the generative endpoint. They verify:
//! - Plan lifecycle (create, list, rename, delete with cascade)
//! - Day logging and the calendar view
//! - CSV export
//! - Data persistence across runs

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Helper to get the path to the CLI binary
fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("stride"))
}

/// Create a plan without a generation call and return its short id
fn create_plan(data_dir: &std::path::Path, goal: &str) -> String {
    let output = cli()
        .arg("new")
        .arg(goal)
        .arg("--start")
        .arg("2025-01-01")
        .arg("--race")
        .arg("2025-06-01")
        .arg("--no-generate")
        .arg("--data-dir")
        .arg(data_dir)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8_lossy(&output);
    let line = stdout
        .lines()
        .find(|l| l.contains("Plan created"))
        .expect("missing creation line");
    // "✓ Plan created: <title> (<short id>)"
    let start = line.rfind('(').unwrap() + 1;
    let end = line.rfind(')').unwrap();
    line[start..end].to_string()
}

#[test]
fn test_cli_help() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Race-training plan tracker with a generative coach",
        ));
}

#[test]
fn test_new_plan_is_listed() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    create_plan(&data_dir, "Sub-50 10k");

    cli()
        .arg("list")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Sub-50 10k"))
        .stdout(predicate::str::contains("2025-01-01 to 2025-06-01"));
}

#[test]
fn test_new_plan_creates_store_namespace() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    create_plan(&data_dir, "Sub-50 10k");

    assert!(data_dir.join("identity.json").exists());
    let users: Vec<_> = fs::read_dir(data_dir.join("users"))
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(users.len(), 1);
    assert!(users[0].path().join("store.json").exists());
}

#[test]
fn test_inverted_range_is_rejected() {
    let temp_dir = setup_test_dir();

    cli()
        .arg("new")
        .arg("5k")
        .arg("--start")
        .arg("2025-06-01")
        .arg("--race")
        .arg("2025-01-01")
        .arg("--no-generate")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .failure();
}

#[test]
fn test_log_appears_in_calendar() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    create_plan(&data_dir, "Marathon");

    cli()
        .arg("log")
        .arg("--date")
        .arg("2025-01-10")
        .arg("--distance")
        .arg("10")
        .arg("--duration")
        .arg("50:00")
        .arg("--rpe")
        .arg("6")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged 10.0 km on 2025-01-10"))
        .stdout(predicate::str::contains("5:00 /km"));

    cli()
        .arg("show")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("January 2025"))
        .stdout(predicate::str::contains("✓ 10.0 km in 50:00 (5:00 /km) RPE 6"));
}

#[test]
fn test_double_day_sums_in_calendar() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    create_plan(&data_dir, "Marathon");

    for (distance, duration) in [("6", "30:00"), ("4", "20:00")] {
        cli()
            .arg("log")
            .arg("--date")
            .arg("2025-01-10")
            .arg("--distance")
            .arg(distance)
            .arg("--duration")
            .arg(duration)
            .arg("--data-dir")
            .arg(&data_dir)
            .assert()
            .success();
    }

    cli()
        .arg("show")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ 10.0 km in 50:00"));
}

#[test]
fn test_rename_only_changes_title() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    create_plan(&data_dir, "Marathon");

    cli()
        .arg("rename")
        .arg("Autumn block")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    cli()
        .arg("show")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Autumn block"))
        .stdout(predicate::str::contains("Goal: Marathon"));
}

#[test]
fn test_delete_cascades_day_logs() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    let id = create_plan(&data_dir, "Marathon");

    cli()
        .arg("log")
        .arg("--date")
        .arg("2025-01-10")
        .arg("--distance")
        .arg("5")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    cli()
        .arg("delete")
        .arg(&id)
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 day logs"));

    cli()
        .arg("list")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("No plans yet"));
}

#[test]
fn test_export_writes_csv() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    let csv_path = temp_dir.path().join("out/plan.csv");

    create_plan(&data_dir, "Marathon");

    cli()
        .arg("log")
        .arg("--date")
        .arg("2025-01-10")
        .arg("--distance")
        .arg("5")
        .arg("--duration")
        .arg("25:00")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    cli()
        .arg("export")
        .arg("--output")
        .arg(&csv_path)
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 1 day logs"));

    let contents = fs::read_to_string(&csv_path).expect("Failed to read CSV");
    assert!(contents.contains("date,planned_activity"));
    assert!(contents.contains("2025-01-10"));
}

#[test]
fn test_plans_listed_newest_first() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    create_plan(&data_dir, "First goal");
    std::thread::sleep(std::time::Duration::from_millis(5));
    create_plan(&data_dir, "Second goal");

    let output = cli()
        .arg("list")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8_lossy(&output);
    let first_pos = stdout.find("First goal").unwrap();
    let second_pos = stdout.find("Second goal").unwrap();
    assert!(second_pos < first_pos);
}

#[test]
fn test_log_targets_named_plan() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    let first = create_plan(&data_dir, "First goal");
    std::thread::sleep(std::time::Duration::from_millis(5));
    create_plan(&data_dir, "Second goal");

    cli()
        .arg("log")
        .arg("--plan")
        .arg(&first)
        .arg("--date")
        .arg("2025-01-10")
        .arg("--distance")
        .arg("5")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    // The newest plan has no logs; the first one does
    cli()
        .arg("show")
        .arg("--plan")
        .arg(&first)
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ 5.0 km"));
}

#[test]
fn test_unknown_plan_prefix_fails() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    create_plan(&data_dir, "Marathon");

    cli()
        .arg("show")
        .arg("--plan")
        .arg("zzzzzzzz")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .failure();
}

#[test]
fn test_corrupt_store_degrades_gracefully() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    create_plan(&data_dir, "Marathon");

    let store_path = store_json_path(&data_dir);
    fs::write(&store_path, "{ this is not json }").unwrap();

    // A corrupt store warns and presents as empty instead of crashing
    cli()
        .arg("list")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("No plans yet"));
}

#[test]
fn test_store_document_shape() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    create_plan(&data_dir, "Marathon");
    cli()
        .arg("log")
        .arg("--date")
        .arg("2025-01-10")
        .arg("--distance")
        .arg("5")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    let contents = fs::read_to_string(store_json_path(&data_dir)).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&contents).unwrap();

    let plans = doc["plans"].as_object().unwrap();
    assert_eq!(plans.len(), 1);
    let plan_id = plans.keys().next().unwrap().as_str();
    assert!(doc["days"][plan_id]["2025-01-10"]["activities"].is_array());
}

/// The single store document for the test run's (only) user
fn store_json_path(data_dir: &std::path::Path) -> std::path::PathBuf {
    let users: Vec<_> = fs::read_dir(data_dir.join("users"))
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(users.len(), 1);
    users[0].path().join("store.json")
}

#[test]
fn test_rpe_out_of_range_is_rejected() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    create_plan(&data_dir, "Marathon");

    cli()
        .arg("log")
        .arg("--distance")
        .arg("5")
        .arg("--rpe")
        .arg("11")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .failure();
}
