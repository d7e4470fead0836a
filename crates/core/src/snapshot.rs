// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MachineSnapshot {
    pub cycles: u64,
    pub accesses: u64,
    pub primask: bool,
    pub faults: Vec<String>,
    pub peripherals: HashMap<String, serde_json::Value>,
}

/// Application-level view of the blink loop alongside the register state.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BlinkySnapshot {
    pub period_ms: u16,
    pub hold_count: u32,
    pub rate_toggles: u64,
    pub led_high: bool,
    pub led_transitions: u64,
    pub machine: MachineSnapshot,
}
