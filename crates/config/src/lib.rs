// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use blinky_drivers::board::BoardConfig;
use blinky_drivers::gpio::{Button, Pin, Port};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    #[serde(alias = "cortex-m0+", alias = "cortex-m0plus", alias = "armv6m")]
    Arm,
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PeripheralConfig {
    pub id: String,
    pub r#type: String, // "port", "tc", "sercom_usart", "pm", "gclk", "sysctrl"
    pub base_address: u64,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub irq: Option<u32>,
    #[serde(default)]
    pub config: HashMap<String, serde_yaml::Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChipDescriptor {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    pub arch: Arch,
    pub peripherals: Vec<PeripheralConfig>,
}

impl ChipDescriptor {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read chip descriptor {:?}", path))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse Chip Descriptor YAML")
    }

    pub fn peripheral(&self, id: &str) -> Option<&PeripheralConfig> {
        self.peripherals.iter().find(|p| p.id == id)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BoardIoKind {
    Led,
    Button,
    UartTx,
    UartRx,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BoardIoBinding {
    pub id: String,
    pub kind: BoardIoKind,
    /// Port group peripheral id, `porta` or `portb`.
    pub peripheral: String,
    pub pin: u8,
    #[serde(default = "default_true")]
    pub active_high: bool,
}

impl BoardIoBinding {
    pub fn to_pin(&self) -> Result<Pin> {
        let port = match self.peripheral.to_ascii_lowercase().as_str() {
            "porta" => Port::A,
            "portb" => Port::B,
            other => anyhow::bail!(
                "Board IO '{}' references unsupported port '{}' (expected porta or portb)",
                self.id,
                other
            ),
        };
        if self.pin >= 32 {
            anyhow::bail!("Board IO '{}' pin {} is out of range 0..32", self.id, self.pin);
        }
        Ok(Pin::new(port, self.pin))
    }
}

/// OSC8M with its prescaler cleared, which is what system init leaves running.
pub const OSC8M_HZ: u32 = 8_000_000;

fn default_cpu_hz() -> u32 {
    OSC8M_HZ
}

fn default_baud() -> u32 {
    115_200
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig {
    #[serde(default = "default_cpu_hz")]
    pub cpu_hz: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            cpu_hz: default_cpu_hz(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    #[serde(default = "default_baud")]
    pub baud: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud: default_baud(),
        }
    }
}

fn default_cycles_per_access() -> u32 {
    4
}

fn default_sync_cycles() -> u32 {
    6
}

fn default_tx_cycles() -> u32 {
    // One 8N1 frame at 115200 baud on an 8 MHz core.
    694
}

/// Timing knobs of the register model, in CPU cycles.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct SimulationConfig {
    #[serde(default = "default_cycles_per_access")]
    pub cycles_per_access: u32,
    #[serde(default = "default_sync_cycles")]
    pub sync_cycles: u32,
    #[serde(default = "default_tx_cycles")]
    pub tx_cycles: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            cycles_per_access: default_cycles_per_access(),
            sync_cycles: default_sync_cycles(),
            tx_cycles: default_tx_cycles(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SystemManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    pub chip: String, // Path to the chip descriptor, relative to the manifest
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub board_io: Vec<BoardIoBinding>,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl SystemManifest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(path.as_ref())
            .with_context(|| format!("Failed to open system manifest {:?}", path.as_ref()))?;
        let manifest: Self =
            serde_yaml::from_reader(f).context("Failed to parse System Manifest")?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let manifest: Self = serde_yaml::from_str(yaml).context("Failed to parse System Manifest")?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<()> {
        if self.clock.cpu_hz != OSC8M_HZ {
            anyhow::bail!(
                "clock.cpu_hz {} does not match the {} Hz core clock the firmware runs from",
                self.clock.cpu_hz,
                OSC8M_HZ
            );
        }
        if self.serial.baud == 0 {
            anyhow::bail!("serial.baud must be greater than zero");
        }
        if self.serial.baud as u64 * 16 > self.clock.cpu_hz as u64 {
            anyhow::bail!(
                "serial.baud {} exceeds cpu_hz / 16 ({}); the USART cannot oversample it",
                self.serial.baud,
                self.clock.cpu_hz / 16
            );
        }
        if self.simulation.cycles_per_access == 0 {
            anyhow::bail!("simulation.cycles_per_access must be greater than zero");
        }
        Ok(())
    }

    /// Resolve `chip` against the directory holding the manifest.
    pub fn chip_path(&self, manifest_path: &Path) -> PathBuf {
        manifest_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&self.chip)
    }

    pub fn load_chip(&self, manifest_path: &Path) -> Result<ChipDescriptor> {
        let chip_path = self.chip_path(manifest_path);
        ChipDescriptor::from_file(&chip_path).with_context(|| {
            format!(
                "Failed to load chip '{}' referenced by system '{}'",
                chip_path.display(),
                self.name
            )
        })
    }

    pub fn binding(&self, kind: BoardIoKind) -> Option<&BoardIoBinding> {
        let mut matches = self.board_io.iter().filter(|b| b.kind == kind);
        let first = matches.next();
        if let Some(extra) = matches.next() {
            tracing::warn!(
                "Multiple {:?} bindings in system '{}'; using '{}' and ignoring '{}'",
                kind,
                self.name,
                first.map(|b| b.id.as_str()).unwrap_or_default(),
                extra.id
            );
        }
        first
    }

    fn required_pin(&self, kind: BoardIoKind) -> Result<&BoardIoBinding> {
        self.binding(kind).ok_or_else(|| {
            anyhow::anyhow!(
                "System '{}' has no board_io entry of kind {:?}",
                self.name,
                kind
            )
        })
    }

    /// Wiring handed to the control loop.
    pub fn board_config(&self) -> Result<BoardConfig> {
        let button = self.required_pin(BoardIoKind::Button)?;
        Ok(BoardConfig {
            cpu_hz: self.clock.cpu_hz,
            baud: self.serial.baud,
            led: self.required_pin(BoardIoKind::Led)?.to_pin()?,
            button: Button {
                pin: button.to_pin()?,
                active_high: button.active_high,
            },
            uart_tx: self.required_pin(BoardIoKind::UartTx)?.to_pin()?,
            uart_rx: self.required_pin(BoardIoKind::UartRx)?.to_pin()?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ButtonState {
    Pressed,
    Released,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StimulusStep {
    pub button: ButtonState,
    /// Control-loop iterations to run with the button held in this state.
    pub iterations: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ScenarioInputs {
    #[serde(default)]
    pub system: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ScenarioLimits {
    pub max_iterations: u64,
    #[serde(default)]
    pub max_bus_accesses: Option<u64>,
    #[serde(default)]
    pub wall_time_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Runner failed before simulation started (e.g. script parse/validation error).
    ConfigError,
    /// Every stimulus step ran to completion.
    Completed,
    MaxIterations,
    /// The bus access budget ran out, usually a busy-wait that never finished.
    MaxBusAccesses,
    WallTime,
    MemoryViolation,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct UartContainsAssertion {
    pub uart_contains: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct UartEqualsAssertion {
    pub uart_equals: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RateTogglesAssertion {
    pub rate_toggles: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct FinalPeriodAssertion {
    pub final_period_ms: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LedTogglesAssertion {
    pub led_toggles_at_least: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StopReasonAssertion {
    pub expected_stop_reason: StopReason,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum ScenarioAssertion {
    UartContains(UartContainsAssertion),
    UartEquals(UartEqualsAssertion),
    RateToggles(RateTogglesAssertion),
    FinalPeriodMs(FinalPeriodAssertion),
    LedTogglesAtLeast(LedTogglesAssertion),
    ExpectedStopReason(StopReasonAssertion),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ScenarioScript {
    pub schema_version: String,
    #[serde(default)]
    pub inputs: ScenarioInputs,
    pub limits: ScenarioLimits,
    #[serde(default)]
    pub stimulus: Vec<StimulusStep>,
    #[serde(default)]
    pub assertions: Vec<ScenarioAssertion>,
}

impl ScenarioScript {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open scenario script at {:?}", path.as_ref()))?;
        let script: Self =
            serde_yaml::from_reader(f).context("Failed to parse Scenario Script YAML")?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        if self.limits.max_iterations == 0 {
            anyhow::bail!("Limit 'max_iterations' must be greater than zero");
        }

        if self.limits.max_bus_accesses == Some(0) {
            anyhow::bail!("Limit 'max_bus_accesses' must be greater than zero when set");
        }

        if let Some(i) = self.stimulus.iter().position(|s| s.iterations == 0) {
            anyhow::bail!("Stimulus step {} has zero iterations", i);
        }

        Ok(())
    }

    /// Iterations the stimulus asks for, before limits are applied.
    pub fn total_iterations(&self) -> u64 {
        self.stimulus.iter().map(|s| s.iterations).sum()
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYSTEM: &str = r#"
name: "xplained"
chip: "../chips/samd21g18a.yaml"
board_io:
  - id: led0
    kind: led
    peripheral: portb
    pin: 30
  - id: sw0
    kind: button
    peripheral: porta
    pin: 15
    active_high: false
  - id: edbg_tx
    kind: uart_tx
    peripheral: porta
    pin: 22
  - id: edbg_rx
    kind: uart_rx
    peripheral: porta
    pin: 23
"#;

    #[test]
    fn test_valid_script() {
        let yaml = r#"
schema_version: "1.0"
inputs:
  system: "../systems/samd21-xplained-pro.yaml"
limits:
  max_iterations: 20000
  max_bus_accesses: 5000000
stimulus:
  - button: released
    iterations: 5000
  - button: pressed
    iterations: 1
assertions:
  - uart_contains: "Hello"
  - rate_toggles: 1
  - final_period_ms: 100
  - expected_stop_reason: completed
"#;
        let script: ScenarioScript = serde_yaml::from_str(yaml).unwrap();
        assert!(script.validate().is_ok());
        assert_eq!(script.total_iterations(), 5001);
        assert_eq!(script.stimulus[1].button, ButtonState::Pressed);
        assert_eq!(script.assertions.len(), 4);
        assert!(matches!(
            script.assertions[3],
            ScenarioAssertion::ExpectedStopReason(StopReasonAssertion {
                expected_stop_reason: StopReason::Completed
            })
        ));
    }

    #[test]
    fn test_invalid_version() {
        let yaml = r#"
schema_version: "2.0"
limits:
  max_iterations: 100
"#;
        let script: ScenarioScript = serde_yaml::from_str(yaml).unwrap();
        let err = script.validate().unwrap_err();
        assert!(err.to_string().contains("Unsupported schema_version"));
    }

    #[test]
    fn test_invalid_max_iterations() {
        let yaml = r#"
schema_version: "1.0"
limits:
  max_iterations: 0
"#;
        let script: ScenarioScript = serde_yaml::from_str(yaml).unwrap();
        let err = script.validate().unwrap_err();
        assert!(err.to_string().contains("max_iterations"));
    }

    #[test]
    fn test_zero_iteration_step_rejected() {
        let yaml = r#"
schema_version: "1.0"
limits:
  max_iterations: 10
stimulus:
  - button: released
    iterations: 0
"#;
        let script: ScenarioScript = serde_yaml::from_str(yaml).unwrap();
        let err = script.validate().unwrap_err();
        assert!(err.to_string().contains("zero iterations"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r#"
schema_version: "1.0"
limits:
  max_iterations: 10
  max_steps: 10
"#;
        assert!(serde_yaml::from_str::<ScenarioScript>(yaml).is_err());
    }

    #[test]
    fn test_board_config_from_manifest() {
        let manifest = SystemManifest::from_yaml(SYSTEM).unwrap();
        assert_eq!(manifest.clock.cpu_hz, 8_000_000);
        assert_eq!(manifest.serial.baud, 115_200);
        assert_eq!(manifest.simulation, SimulationConfig::default());

        let board = manifest.board_config().unwrap();
        assert_eq!(board, blinky_drivers::board::XPLAINED_PRO);
    }

    #[test]
    fn test_board_config_missing_binding() {
        let yaml = r#"
name: "bare"
chip: "chip.yaml"
board_io:
  - id: led0
    kind: led
    peripheral: portb
    pin: 30
"#;
        let manifest = SystemManifest::from_yaml(yaml).unwrap();
        let err = manifest.board_config().unwrap_err();
        assert!(err.to_string().contains("Button"));
    }

    #[test]
    fn test_board_io_rejects_unknown_port() {
        let binding = BoardIoBinding {
            id: "led0".to_string(),
            kind: BoardIoKind::Led,
            peripheral: "portc".to_string(),
            pin: 1,
            active_high: true,
        };
        assert!(binding.to_pin().is_err());
    }

    #[test]
    fn test_manifest_rejects_unreachable_baud() {
        let yaml = r#"
name: "fast-uart"
chip: "chip.yaml"
serial:
  baud: 1000000
"#;
        let err = SystemManifest::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("serial.baud"));
    }

    #[test]
    fn test_manifest_rejects_foreign_core_clock() {
        for hz in [0u32, 1_000_000, 48_000_000] {
            let yaml = format!(
                "name: \"board\"\nchip: \"chip.yaml\"\nclock:\n  cpu_hz: {}\n",
                hz
            );
            let err = SystemManifest::from_yaml(&yaml).unwrap_err();
            assert!(err.to_string().contains("clock.cpu_hz"), "{}: {}", hz, err);
        }
    }

    #[test]
    fn test_chip_path_is_relative_to_manifest() {
        let manifest = SystemManifest::from_yaml(SYSTEM).unwrap();
        let resolved = manifest.chip_path(Path::new("configs/systems/board.yaml"));
        assert_eq!(
            resolved,
            PathBuf::from("configs/systems/../chips/samd21g18a.yaml")
        );
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1KB").unwrap(), 1000);
        assert_eq!(parse_size("1KiB").unwrap(), 1024);
        assert!(parse_size("lots").is_err());
    }
}
