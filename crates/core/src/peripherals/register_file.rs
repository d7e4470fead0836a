// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;
use std::collections::BTreeMap;
use std::str::FromStr;

const WINDOW: usize = 0x40;

const GCLK_CLKCTRL: u64 = 0x02;

/// Clock and power blocks modelled as plain register storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockBlock {
    Pm,
    Sysctrl,
    Gclk,
}

impl FromStr for ClockBlock {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pm" => Ok(Self::Pm),
            "sysctrl" => Ok(Self::Sysctrl),
            "gclk" => Ok(Self::Gclk),
            _ => Err(format!(
                "unsupported clock block '{}'; supported: pm, sysctrl, gclk",
                value
            )),
        }
    }
}

/// Byte-addressed register store with reset values and read-only bytes.
///
/// Writes take effect immediately with no side effects, except GCLK CLKCTRL,
/// which is an indirect register: the low byte selects a channel and a full
/// 16-bit write stores that channel's configuration.
#[derive(Debug, serde::Serialize)]
pub struct RegisterFile {
    block: ClockBlock,
    regs: Vec<u8>,
    #[serde(skip)]
    write_mask: Vec<u8>,
    channels: BTreeMap<u8, u16>,
    selected_channel: u8,
    clkctrl_buf: u16,
    clkctrl_lanes: u8,
}

impl RegisterFile {
    fn with_block(block: ClockBlock) -> Self {
        Self {
            block,
            regs: vec![0; WINDOW],
            write_mask: vec![0xFF; WINDOW],
            channels: BTreeMap::new(),
            selected_channel: 0,
            clkctrl_buf: 0,
            clkctrl_lanes: 0,
        }
    }

    pub fn new(block: ClockBlock) -> Self {
        match block {
            ClockBlock::Pm => Self::pm(),
            ClockBlock::Sysctrl => Self::sysctrl(),
            ClockBlock::Gclk => Self::gclk(),
        }
    }

    /// Power manager. Bus clocks for all APBC peripherals except ADC start gated.
    pub fn pm() -> Self {
        let mut rf = Self::with_block(ClockBlock::Pm);
        rf.reset_u32(0x14, 0x0000_007F); // AHBMASK
        rf.reset_u32(0x18, 0x0000_007F); // APBAMASK
        rf.reset_u32(0x1C, 0x0000_007F); // APBBMASK
        rf.reset_u32(0x20, 0x0001_0000); // APBCMASK
        rf.regs[0x36] = 0x01; // INTFLAG.CKRDY
        rf.regs[0x38] = 0x01; // RCAUSE.POR
        rf.read_only(0x36..0x39);
        rf
    }

    /// System controller with OSC8M running at its reset prescaler of /8.
    pub fn sysctrl() -> Self {
        let mut rf = Self::with_block(ClockBlock::Sysctrl);
        rf.reset_u32(0x0C, 0x0000_0008); // PCLKSR.OSC8MRDY
        rf.reset_u32(0x20, 0x0000_0382); // OSC8M
        rf.read_only(0x0C..0x10);
        rf
    }

    /// Generic clock controller. Writes complete immediately, so STATUS
    /// never reports SYNCBUSY.
    pub fn gclk() -> Self {
        let mut rf = Self::with_block(ClockBlock::Gclk);
        rf.read_only(0x01..0x02);
        rf
    }

    fn reset_u32(&mut self, offset: usize, value: u32) {
        self.regs[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn read_only(&mut self, range: std::ops::Range<usize>) {
        for b in &mut self.write_mask[range] {
            *b = 0;
        }
    }

    pub fn block(&self) -> ClockBlock {
        self.block
    }

    pub fn peek_u8(&self, offset: u64) -> u8 {
        self.regs.get(offset as usize).copied().unwrap_or(0)
    }

    pub fn peek_u32(&self, offset: u64) -> u32 {
        (0..4).fold(0, |acc, i| acc | (self.peek_u8(offset + i) as u32) << (i * 8))
    }

    /// Configuration last written for a GCLK channel.
    pub fn gclk_channel(&self, id: u8) -> Option<u16> {
        self.channels.get(&id).copied()
    }

    fn write_clkctrl(&mut self, offset: u64, value: u8) {
        if offset == GCLK_CLKCTRL {
            self.clkctrl_buf = value as u16;
            self.clkctrl_lanes = 0b01;
            self.selected_channel = value & 0x3F;
            return;
        }

        if self.clkctrl_lanes != 0b01 {
            tracing::warn!("GCLK CLKCTRL high byte written without a channel id; ignored");
            return;
        }
        let config = self.clkctrl_buf | ((value as u16) << 8);
        self.clkctrl_lanes = 0;
        tracing::debug!("GCLK channel {:#04x} <- {:#06x}", self.selected_channel, config);
        self.channels.insert(self.selected_channel, config);
    }

    fn read_clkctrl(&self, offset: u64) -> u8 {
        let config = self
            .channels
            .get(&self.selected_channel)
            .copied()
            .unwrap_or(self.selected_channel as u16);
        (config >> ((offset - GCLK_CLKCTRL) * 8)) as u8
    }
}

impl crate::Peripheral for RegisterFile {
    fn read(&self, offset: u64) -> SimResult<u8> {
        if self.block == ClockBlock::Gclk && (GCLK_CLKCTRL..GCLK_CLKCTRL + 2).contains(&offset) {
            return Ok(self.read_clkctrl(offset));
        }
        Ok(self.peek_u8(offset))
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        if self.block == ClockBlock::Gclk && (GCLK_CLKCTRL..GCLK_CLKCTRL + 2).contains(&offset) {
            self.write_clkctrl(offset, value);
            return Ok(());
        }

        let idx = offset as usize;
        if idx >= WINDOW {
            return Ok(());
        }
        let mask = self.write_mask[idx];
        self.regs[idx] = (self.regs[idx] & !mask) | (value & mask);
        Ok(())
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
