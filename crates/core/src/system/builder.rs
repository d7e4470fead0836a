// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::bus::SystemBus;
use blinky_config::{SimulationConfig, SystemManifest};
use blinky_drivers::board::{BoardConfig, XPLAINED_PRO};
use std::path::Path;
use tracing::info;

/// Everything needed to bring up a simulated board.
pub struct SystemSetup {
    pub name: String,
    pub bus: SystemBus,
    pub board: BoardConfig,
    pub timing: SimulationConfig,
}

impl Default for SystemSetup {
    fn default() -> Self {
        let timing = SimulationConfig::default();
        Self {
            name: "samd21-xplained-pro".to_string(),
            bus: SystemBus::samd21_with_timing(&timing),
            board: XPLAINED_PRO,
            timing,
        }
    }
}

/// Builds a SystemSetup from a given system manifest path.
/// If no path is provided, returns the built-in SAMD21 Xplained Pro wiring.
pub fn build_system(system_path: Option<&Path>) -> anyhow::Result<SystemSetup> {
    let Some(sys_path) = system_path else {
        info!("Using default hardware configuration");
        return Ok(SystemSetup::default());
    };

    info!("Loading system manifest: {:?}", sys_path);
    let manifest = SystemManifest::from_file(sys_path)?;
    info!("Loading chip descriptor: {:?}", manifest.chip_path(sys_path));
    let chip = manifest.load_chip(sys_path)?;

    Ok(SystemSetup {
        name: manifest.name.clone(),
        bus: SystemBus::from_config(&chip, &manifest)?,
        board: manifest.board_config()?,
        timing: manifest.simulation,
    })
}
