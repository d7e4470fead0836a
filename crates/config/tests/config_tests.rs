// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use blinky_config::{
    parse_size, Arch, BoardIoKind, ChipDescriptor, ScenarioAssertion, ScenarioScript,
    StopReason, SystemManifest,
};
use std::path::PathBuf;

fn configs_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../configs")
}

#[test]
fn test_bundled_chip_parses() {
    let chip = ChipDescriptor::from_file(configs_dir().join("chips/samd21g18a.yaml")).unwrap();
    assert_eq!(chip.arch, Arch::Arm);
    assert_eq!(chip.peripherals.len(), 7);

    let tc3 = chip.peripheral("tc3").unwrap();
    assert_eq!(tc3.r#type, "tc");
    assert_eq!(tc3.base_address, 0x4200_2C00);
    assert_eq!(tc3.irq, Some(18));

    let sercom3 = chip.peripheral("sercom3").unwrap();
    assert_eq!(sercom3.irq, Some(12));

    let portb = chip.peripheral("portb").unwrap();
    assert_eq!(parse_size(portb.size.as_deref().unwrap()).unwrap(), 0x80);
}

#[test]
fn test_bundled_system_resolves_chip() {
    let path = configs_dir().join("systems/samd21-xplained-pro.yaml");
    let manifest = SystemManifest::from_file(&path).unwrap();
    assert_eq!(manifest.name, "samd21-xplained-pro");

    let chip = manifest.load_chip(&path).unwrap();
    assert_eq!(chip.name, "samd21g18a");

    let button = manifest.binding(BoardIoKind::Button).unwrap();
    assert_eq!(button.pin, 15);
    assert!(!button.active_high);

    let board = manifest.board_config().unwrap();
    assert_eq!(board, blinky_drivers::board::XPLAINED_PRO);
}

#[test]
fn test_bundled_scenarios_validate() {
    let dir = configs_dir().join("scenarios");
    let mut seen = 0;
    for entry in std::fs::read_dir(&dir).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }
        let script = ScenarioScript::from_file(&path)
            .unwrap_or_else(|e| panic!("{}: {:#}", path.display(), e));
        assert!(script.total_iterations() <= script.limits.max_iterations);
        assert!(script.inputs.system.is_some());
        seen += 1;
    }
    assert_eq!(seen, 3);
}

#[test]
fn test_hold_scenario_expects_exact_uart() {
    let script =
        ScenarioScript::from_file(configs_dir().join("scenarios/hold-toggles-fast.yaml")).unwrap();
    assert_eq!(script.total_iterations(), 5000);

    let uart = script.assertions.iter().find_map(|a| match a {
        ScenarioAssertion::UartEquals(a) => Some(a.uart_equals.as_str()),
        _ => None,
    });
    assert_eq!(uart, Some("\r\nHello, world!\r\n."));

    let stop = script.assertions.iter().find_map(|a| match a {
        ScenarioAssertion::ExpectedStopReason(a) => Some(a.expected_stop_reason),
        _ => None,
    });
    assert_eq!(stop, Some(StopReason::Completed));
}

#[test]
fn test_chip_without_optional_fields() {
    let yaml = r#"
name: "bare"
arch: "arm"
peripherals:
  - id: "porta"
    type: "port"
    base_address: 0x41004400
"#;
    let chip = ChipDescriptor::from_yaml(yaml).unwrap();
    assert_eq!(chip.schema_version, "1.0");
    assert_eq!(chip.peripherals[0].size, None);
    assert_eq!(chip.peripherals[0].irq, None);
    assert!(chip.peripherals[0].config.is_empty());
}

#[test]
fn test_missing_chip_file_reports_path() {
    let manifest = SystemManifest::from_yaml(
        r#"
name: "orphan"
chip: "does-not-exist.yaml"
"#,
    )
    .unwrap();
    let err = manifest
        .load_chip(&configs_dir().join("systems/orphan.yaml"))
        .unwrap_err();
    assert!(format!("{:#}", err).contains("does-not-exist.yaml"));
}

#[test]
fn test_unknown_assertion_rejected() {
    let yaml = r#"
schema_version: "1.0"
limits:
  max_iterations: 10
assertions:
  - pc_equals: 0x1000
"#;
    assert!(serde_yaml::from_str::<ScenarioScript>(yaml).is_err());
}

#[test]
fn test_zero_access_budget_rejected() {
    let yaml = r#"
schema_version: "1.0"
limits:
  max_iterations: 10
  max_bus_accesses: 0
"#;
    let script: ScenarioScript = serde_yaml::from_str(yaml).unwrap();
    let err = script.validate().unwrap_err();
    assert!(err.to_string().contains("max_bus_accesses"));
}
