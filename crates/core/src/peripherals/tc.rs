// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;

const CTRLA_SWRST: u16 = 1 << 0;
const CTRLA_ENABLE: u16 = 1 << 1;

const INT_OVF: u8 = 1 << 0;
const INT_MC0: u8 = 1 << 4;
const INT_MC1: u8 = 1 << 5;

const STATUS_SYNCBUSY: u8 = 1 << 7;

const PRESCALER_DIVISORS: [u32; 8] = [1, 2, 4, 8, 16, 64, 256, 1024];

fn lane(value: u16, offset: u64) -> u8 {
    (value >> ((offset & 1) * 8)) as u8
}

fn set_lane(reg: &mut u16, offset: u64, value: u8) {
    let shift = (offset & 1) * 8;
    *reg = (*reg & !(0xFF << shift)) | ((value as u16) << shift);
}

/// SAMD21 TC in 16-bit counter mode.
///
/// One tick is one GCLK cycle. Writes to CTRLA, COUNT and the compare
/// registers hold STATUS.SYNCBUSY for `sync_cycles` ticks.
#[derive(Debug, Default, serde::Serialize)]
pub struct Tc {
    ctrla: u16,
    readreq: u16,
    ctrlb: u8,
    ctrlc: u8,
    dbgctrl: u8,
    evctrl: u16,
    intenset: u8,
    intflag: u8,
    count: u16,
    cc0: u16,
    cc1: u16,

    // Internal state
    prescale_cnt: u32,
    sync_remaining: u32,
    sync_cycles: u32,
    stuck_sync: bool,
    cc0_lanes: u8,
    cc0_history: Vec<u16>,
}

impl Tc {
    pub fn new(sync_cycles: u32) -> Self {
        Self {
            sync_cycles,
            ..Default::default()
        }
    }

    /// Fault injection: SYNCBUSY never clears.
    pub fn with_stuck_sync(mut self, stuck: bool) -> Self {
        self.stuck_sync = stuck;
        self
    }

    pub fn enabled(&self) -> bool {
        self.ctrla & CTRLA_ENABLE != 0
    }

    pub fn count(&self) -> u16 {
        self.count
    }

    pub fn cc0(&self) -> u16 {
        self.cc0
    }

    /// Every complete CC0 value written, in order.
    pub fn cc0_history(&self) -> &[u16] {
        &self.cc0_history
    }

    pub fn prescaler_divisor(&self) -> u32 {
        PRESCALER_DIVISORS[((self.ctrla >> 8) & 0x7) as usize]
    }

    fn wavegen(&self) -> u16 {
        (self.ctrla >> 5) & 0x3
    }

    /// MFRQ and MPWM wrap at CC0, the others at the 16-bit maximum.
    fn top(&self) -> u16 {
        match self.wavegen() {
            1 | 3 => self.cc0,
            _ => 0xFFFF,
        }
    }

    fn sync_busy(&self) -> bool {
        self.stuck_sync || self.sync_remaining > 0
    }

    fn start_sync(&mut self) {
        self.sync_remaining = self.sync_cycles;
    }

    fn software_reset(&mut self) {
        tracing::debug!("TC software reset");
        *self = Self {
            sync_cycles: self.sync_cycles,
            stuck_sync: self.stuck_sync,
            cc0_history: std::mem::take(&mut self.cc0_history),
            ..Default::default()
        };
    }

    fn step_counter(&mut self) {
        if self.count == self.top() || self.count == 0xFFFF {
            self.count = 0;
            self.intflag |= INT_OVF;
        } else {
            self.count += 1;
        }

        if self.count == self.cc0 {
            self.intflag |= INT_MC0;
        }
        if self.count == self.cc1 {
            self.intflag |= INT_MC1;
        }
    }
}

impl crate::Peripheral for Tc {
    fn read(&self, offset: u64) -> SimResult<u8> {
        let value = match offset {
            0x00 | 0x01 => lane(self.ctrla, offset),
            0x02 | 0x03 => lane(self.readreq, offset),
            0x04 | 0x05 => self.ctrlb,
            0x06 => self.ctrlc,
            0x08 => self.dbgctrl,
            0x0A | 0x0B => lane(self.evctrl, offset),
            0x0C | 0x0D => self.intenset,
            0x0E => self.intflag,
            0x0F => {
                if self.sync_busy() {
                    STATUS_SYNCBUSY
                } else {
                    0
                }
            }
            0x10 | 0x11 => lane(self.count, offset),
            0x18 | 0x19 => lane(self.cc0, offset),
            0x1A | 0x1B => lane(self.cc1, offset),
            _ => 0,
        };
        Ok(value)
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        match offset {
            0x00 | 0x01 => {
                if offset == 0x00 && (value as u16) & CTRLA_SWRST != 0 {
                    self.software_reset();
                    self.start_sync();
                    return Ok(());
                }
                let was_enabled = self.enabled();
                set_lane(&mut self.ctrla, offset, value);
                if offset == 0x00 {
                    let mode = (self.ctrla >> 2) & 0x3;
                    if mode != 0 {
                        tracing::warn!("TC counter mode {} not modelled; using COUNT16", mode);
                    }
                    if self.enabled() != was_enabled {
                        tracing::debug!("TC enable -> {}", self.enabled());
                    }
                }
                self.start_sync();
            }
            0x02 | 0x03 => set_lane(&mut self.readreq, offset, value),
            0x04 => self.ctrlb &= !value,
            0x05 => self.ctrlb |= value,
            0x06 => self.ctrlc = value,
            0x08 => self.dbgctrl = value,
            0x0A | 0x0B => set_lane(&mut self.evctrl, offset, value),
            0x0C => self.intenset &= !value,
            0x0D => self.intenset |= value,
            // INTFLAG is write-one-to-clear.
            0x0E => self.intflag &= !value,
            0x10 | 0x11 => {
                set_lane(&mut self.count, offset, value);
                self.start_sync();
            }
            0x18 | 0x19 => {
                set_lane(&mut self.cc0, offset, value);
                self.cc0_lanes |= 1 << (offset & 1);
                if self.cc0_lanes == 0b11 {
                    self.cc0_lanes = 0;
                    self.cc0_history.push(self.cc0);
                }
                self.start_sync();
            }
            0x1A | 0x1B => {
                set_lane(&mut self.cc1, offset, value);
                self.start_sync();
            }
            _ => {}
        }
        Ok(())
    }

    fn tick(&mut self) -> crate::PeripheralTickResult {
        if self.sync_remaining > 0 {
            self.sync_remaining -= 1;
        }

        if self.enabled() {
            self.prescale_cnt += 1;
            if self.prescale_cnt >= self.prescaler_divisor() {
                self.prescale_cnt = 0;
                self.step_counter();
            }
        }

        // Level stays asserted until the flag is acknowledged.
        crate::PeripheralTickResult {
            irq: self.intflag & self.intenset != 0,
        }
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Peripheral;

    fn write_u16(tc: &mut Tc, offset: u64, value: u16) {
        tc.write(offset, value as u8).unwrap();
        tc.write(offset + 1, (value >> 8) as u8).unwrap();
    }

    fn running(cc0: u16, prescaler: u16) -> Tc {
        let mut tc = Tc::new(0);
        write_u16(&mut tc, 0x18, cc0);
        // MFRQ
        write_u16(&mut tc, 0x00, (prescaler << 8) | (1 << 5) | CTRLA_ENABLE);
        tc
    }

    #[test]
    fn test_tc_reset_values() {
        let tc = Tc::new(6);
        assert!(!tc.enabled());
        assert_eq!(tc.read(0x0F).unwrap(), 0);
        assert_eq!(tc.prescaler_divisor(), 1);
    }

    #[test]
    fn test_sync_busy_after_write() {
        let mut tc = Tc::new(3);
        write_u16(&mut tc, 0x10, 0);
        assert_eq!(tc.read(0x0F).unwrap(), STATUS_SYNCBUSY);
        tc.tick();
        tc.tick();
        assert_eq!(tc.read(0x0F).unwrap(), STATUS_SYNCBUSY);
        tc.tick();
        assert_eq!(tc.read(0x0F).unwrap(), 0);
    }

    #[test]
    fn test_stuck_sync_never_clears() {
        let mut tc = Tc::new(1).with_stuck_sync(true);
        for _ in 0..100 {
            tc.tick();
        }
        assert_eq!(tc.read(0x0F).unwrap(), STATUS_SYNCBUSY);
    }

    #[test]
    fn test_mfrq_match_and_wrap() {
        let mut tc = running(3, 0);
        for _ in 0..3 {
            assert!(!tc.tick().irq);
        }
        assert_eq!(tc.count(), 3);
        assert_eq!(tc.read(0x0E).unwrap() & INT_MC0, INT_MC0);

        // Not routed until INTENSET.MC0.
        tc.write(0x0D, INT_MC0).unwrap();
        assert!(tc.tick().irq);
        assert_eq!(tc.count(), 0);
        assert_eq!(tc.read(0x0E).unwrap() & INT_OVF, INT_OVF);

        tc.write(0x0E, INT_MC0 | INT_OVF).unwrap();
        assert!(!tc.tick().irq);
        assert_eq!(tc.count(), 1);
    }

    #[test]
    fn test_prescaler_divides_ticks() {
        // DIV256
        let mut tc = running(1000, 6);
        for _ in 0..255 {
            tc.tick();
        }
        assert_eq!(tc.count(), 0);
        tc.tick();
        assert_eq!(tc.count(), 1);
    }

    #[test]
    fn test_disabled_counter_holds() {
        let mut tc = Tc::new(0);
        write_u16(&mut tc, 0x18, 2);
        for _ in 0..10 {
            tc.tick();
        }
        assert_eq!(tc.count(), 0);
        assert_eq!(tc.read(0x0E).unwrap(), 0);
    }

    #[test]
    fn test_cc0_history_records_whole_writes() {
        let mut tc = Tc::new(0);
        write_u16(&mut tc, 0x18, 15_500);
        tc.write(0x18, 0x1C).unwrap();
        assert_eq!(tc.cc0_history(), &[15_500]);
        tc.write(0x19, 0x0C).unwrap();
        assert_eq!(tc.cc0_history(), &[15_500, 3_100]);
        assert_eq!(tc.read(0x18).unwrap(), 0x1C);
    }

    #[test]
    fn test_intenclr_and_swrst() {
        let mut tc = running(5, 0);
        tc.write(0x0D, INT_MC0 | INT_OVF).unwrap();
        tc.write(0x0C, INT_OVF).unwrap();
        assert_eq!(tc.read(0x0D).unwrap(), INT_MC0);

        tc.write(0x00, CTRLA_SWRST as u8).unwrap();
        assert!(!tc.enabled());
        assert_eq!(tc.cc0(), 0);
        assert_eq!(tc.read(0x0D).unwrap(), 0);
    }
}
