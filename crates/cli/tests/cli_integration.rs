// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::path::PathBuf;
use std::process::Command;

fn system_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../configs/systems/samd21-xplained-pro.yaml")
}

fn run_json(extra: &[&str]) -> serde_json::Value {
    let output = Command::new(env!("CARGO_BIN_EXE_blinky-sim"))
        .arg("run")
        .arg("--system")
        .arg(system_path())
        .arg("--json")
        .args(extra)
        .output()
        .expect("Failed to execute command");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "Exit {:?}. Stderr: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("Failed to parse summary ({}): {}", e, stdout))
}

#[test]
fn test_cli_json_summary() {
    let json = run_json(&["--iterations", "5000"]);
    assert_eq!(json["stop_reason"], "completed");
    assert_eq!(json["iterations"], 5000);
    assert_eq!(json["rate_toggles"], 1);
    assert_eq!(json["period_ms"], 100);
    assert_eq!(json["uart"], "\r\nHello, world!\r\n.");
    assert!(json["cycles"].as_u64().unwrap() > 0);
}

#[test]
fn test_cli_counts_timer_interrupts() {
    // Long enough for the fast period to match at least once.
    let json = run_json(&["--iterations", "260000"]);
    assert_eq!(json["period_ms"], 100);
    let toggles = json["led_transitions"].as_u64().unwrap();
    assert!(toggles >= 1);
    // Every TC3 match toggles the LED and nothing else interrupts.
    assert_eq!(json["timer_interrupts"].as_u64().unwrap(), toggles);
}

#[test]
fn test_cli_hold_from_blocks_toggle() {
    // Pressed from iteration 4000, so the count never reaches the trigger.
    let json = run_json(&["--iterations", "6000", "--hold-from", "4000"]);
    assert_eq!(json["rate_toggles"], 0);
    assert_eq!(json["period_ms"], 500);
    assert_eq!(json["uart"], "\r\nHello, world!\r\n");
}

#[test]
fn test_cli_vcd_generation() {
    let dir = std::env::temp_dir().join("blinky-cli-vcd");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    let vcd_path = dir.join("run.vcd");

    run_json(&[
        "--iterations",
        "200",
        "--hold-from",
        "100",
        "--vcd",
        vcd_path.to_str().unwrap(),
    ]);

    let content = std::fs::read_to_string(&vcd_path).expect("Failed to read VCD");
    assert!(content.contains("$timescale"), "VCD header missing");
    assert!(content.contains("led0"), "LED signal missing");
    assert!(content.contains("sw0"), "button signal missing");
    assert!(content.contains("$enddefinitions"));
}

#[test]
fn test_cli_snapshot() {
    let dir = std::env::temp_dir().join("blinky-cli-snapshot");
    let _ = std::fs::remove_dir_all(&dir);
    let snapshot_path = dir.join("state.json");

    run_json(&[
        "--iterations",
        "10",
        "--snapshot",
        snapshot_path.to_str().unwrap(),
    ]);

    let text = std::fs::read_to_string(&snapshot_path).expect("Snapshot not written");
    let snapshot: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(snapshot["period_ms"], 500);
    assert_eq!(snapshot["hold_count"], 10);
    assert_eq!(snapshot["machine"]["primask"], false);
}

#[test]
fn test_cli_stuck_timer_is_runtime_error() {
    let system = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/stuck-tc3-system.yaml");
    let output = Command::new(env!("CARGO_BIN_EXE_blinky-sim"))
        .args(["run", "--system"])
        .arg(system)
        .args(["--iterations", "10", "--max-bus-accesses", "2000", "--json"])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(3));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["stop_reason"], "max_bus_accesses");
    assert_eq!(json["uart"], "");
}

#[test]
fn test_cli_missing_system_is_config_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_blinky-sim"))
        .args(["run", "--system", "/nonexistent/system.yaml"])
        .output()
        .expect("Failed to execute command");
    assert_eq!(output.status.code(), Some(2));
}
