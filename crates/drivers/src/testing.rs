// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{Bus, Cpu};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read { addr: u32, width: u8 },
    Write { addr: u32, width: u8, value: u32 },
}

/// Flat byte-addressed register store that logs every access.
///
/// Sync flags read back as whatever was stored (zero unless a test presets
/// them), so busy-waits complete immediately.
#[derive(Debug, Default)]
pub struct RecordingBus {
    mem: HashMap<u32, u8>,
    pub log: Vec<Access>,
    pub interrupts_enabled: bool,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preset_u8(&mut self, addr: u32, value: u8) {
        self.mem.insert(addr, value);
    }

    pub fn preset_u32(&mut self, addr: u32, value: u32) {
        for i in 0..4 {
            self.mem.insert(addr + i, (value >> (i * 8)) as u8);
        }
    }

    pub fn peek_u8(&self, addr: u32) -> u8 {
        self.mem.get(&addr).copied().unwrap_or(0)
    }

    pub fn peek_u16(&self, addr: u32) -> u16 {
        self.peek_u8(addr) as u16 | (self.peek_u8(addr + 1) as u16) << 8
    }

    pub fn peek_u32(&self, addr: u32) -> u32 {
        (0..4).fold(0, |acc, i| acc | (self.peek_u8(addr + i) as u32) << (i * 8))
    }

    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.log
            .iter()
            .filter_map(|a| match *a {
                Access::Write { addr, value, .. } => Some((addr, value)),
                Access::Read { .. } => None,
            })
            .collect()
    }

    pub fn writes_to(&self, addr: u32) -> Vec<u32> {
        self.writes()
            .into_iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, v)| v)
            .collect()
    }

    fn store(&mut self, addr: u32, value: u32, width: u8) {
        for i in 0..width as u32 {
            self.mem.insert(addr + i, (value >> (i * 8)) as u8);
        }
        self.log.push(Access::Write { addr, width, value });
    }
}

impl Bus for RecordingBus {
    fn read_u8(&mut self, addr: u32) -> u8 {
        self.log.push(Access::Read { addr, width: 1 });
        self.peek_u8(addr)
    }

    fn write_u8(&mut self, addr: u32, value: u8) {
        self.store(addr, value as u32, 1);
    }

    fn read_u16(&mut self, addr: u32) -> u16 {
        self.log.push(Access::Read { addr, width: 2 });
        self.peek_u16(addr)
    }

    fn read_u32(&mut self, addr: u32) -> u32 {
        self.log.push(Access::Read { addr, width: 4 });
        self.peek_u32(addr)
    }

    fn write_u16(&mut self, addr: u32, value: u16) {
        self.store(addr, value as u32, 2);
    }

    fn write_u32(&mut self, addr: u32, value: u32) {
        self.store(addr, value, 4);
    }
}

impl Cpu for RecordingBus {
    fn enable_interrupts(&mut self) {
        self.interrupts_enabled = true;
    }
}
