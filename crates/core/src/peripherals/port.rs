// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::signals::DigitalLevel;
use crate::SimResult;

const PINCFG_INEN: u8 = 1 << 1;
const PINCFG_PULLEN: u8 = 1 << 2;

/// One SAMD21 PORT group (PORTA or PORTB), 32 pins.
///
/// The pad level of a pin follows, in order: its output driver when DIR is
/// set, an external drive from the test harness, the pull resistor (whose
/// direction is the OUT bit), or low when floating.
#[derive(Debug, Default, serde::Serialize)]
pub struct Port {
    dir: u32,
    out: u32,
    ctrl: u32,
    pmux: [u8; 16],
    pincfg: [u8; 32],
    drive: [Option<DigitalLevel>; 32],
    transitions: [u64; 32],
}

impl Port {
    pub fn new() -> Self {
        Self::default()
    }

    fn pad_levels(&self) -> u32 {
        let mut levels = 0;
        for pin in 0..32 {
            let bit = 1u32 << pin;
            let high = if self.dir & bit != 0 {
                self.out & bit != 0
            } else if let Some(level) = self.drive[pin] {
                level == DigitalLevel::High
            } else if self.pincfg[pin] & PINCFG_PULLEN != 0 {
                self.out & bit != 0
            } else {
                false
            };
            if high {
                levels |= bit;
            }
        }
        levels
    }

    /// IN only samples pins with the input buffer enabled.
    fn input(&self) -> u32 {
        let mut inen = 0;
        for (pin, cfg) in self.pincfg.iter().enumerate() {
            if cfg & PINCFG_INEN != 0 {
                inen |= 1 << pin;
            }
        }
        self.pad_levels() & inen
    }

    pub fn level(&self, pin: u8) -> DigitalLevel {
        DigitalLevel::from(self.pad_levels() & (1 << (pin & 31)) != 0)
    }

    /// Pad level changes seen on `pin` since reset.
    pub fn transitions(&self, pin: u8) -> u64 {
        self.transitions[(pin & 31) as usize]
    }

    pub fn is_output(&self, pin: u8) -> bool {
        self.dir & (1 << (pin & 31)) != 0
    }

    pub fn pincfg(&self, pin: u8) -> u8 {
        self.pincfg[(pin & 31) as usize]
    }

    /// Peripheral function selected for `pin` (PMUX nibble).
    pub fn pmux(&self, pin: u8) -> u8 {
        let reg = self.pmux[((pin & 31) >> 1) as usize];
        if pin & 1 == 1 {
            reg >> 4
        } else {
            reg & 0x0F
        }
    }

    /// Apply an external level to `pin`, or release it with `None`.
    pub fn drive(&mut self, pin: u8, level: Option<DigitalLevel>) {
        let before = self.pad_levels();
        self.drive[(pin & 31) as usize] = level;
        self.count_transitions(before);
    }

    fn count_transitions(&mut self, before: u32) {
        let mut changed = before ^ self.pad_levels();
        while changed != 0 {
            let pin = changed.trailing_zeros() as usize;
            self.transitions[pin] += 1;
            changed &= changed - 1;
        }
    }

    fn read_reg(&self, offset: u64) -> u32 {
        match offset {
            0x00 | 0x04 | 0x08 | 0x0C => self.dir,
            0x10 | 0x14 | 0x18 | 0x1C => self.out,
            0x20 => self.input(),
            0x24 => self.ctrl,
            _ => 0,
        }
    }

    /// Set, clear and toggle registers act on the written bits only, so each
    /// byte lane can be applied as it arrives.
    fn write_lane(&mut self, reg_offset: u64, bits: u32, lane_mask: u32) {
        match reg_offset {
            0x00 => self.dir = (self.dir & !lane_mask) | bits,
            0x04 => self.dir &= !bits,
            0x08 => self.dir |= bits,
            0x0C => self.dir ^= bits,
            0x10 => self.out = (self.out & !lane_mask) | bits,
            0x14 => self.out &= !bits,
            0x18 => self.out |= bits,
            0x1C => self.out ^= bits,
            0x24 => self.ctrl = (self.ctrl & !lane_mask) | bits,
            // WRCONFIG is a bulk alias for PMUX/PINCFG; the drivers do not use it.
            0x28 => tracing::debug!("PORT WRCONFIG write ignored"),
            _ => {}
        }
    }
}

impl crate::Peripheral for Port {
    fn read(&self, offset: u64) -> SimResult<u8> {
        match offset {
            0x30..=0x3F => Ok(self.pmux[(offset - 0x30) as usize]),
            0x40..=0x5F => Ok(self.pincfg[(offset - 0x40) as usize]),
            _ => {
                let reg_offset = offset & !3;
                let byte_offset = (offset % 4) as u32;
                let reg_val = self.read_reg(reg_offset);
                Ok(((reg_val >> (byte_offset * 8)) & 0xFF) as u8)
            }
        }
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        let before = self.pad_levels();

        match offset {
            0x30..=0x3F => self.pmux[(offset - 0x30) as usize] = value,
            0x40..=0x5F => self.pincfg[(offset - 0x40) as usize] = value & 0x47,
            _ => {
                let shift = (offset % 4) as u32 * 8;
                self.write_lane(offset & !3, (value as u32) << shift, 0xFF << shift);
            }
        }

        self.count_transitions(before);
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }

    fn snapshot(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let Some(obj) = value.as_object_mut() {
            obj.insert("in".to_string(), self.input().into());
        }
        value
    }
}
