// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;
use std::cell::Cell;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

const CTRLA_ENABLE: u32 = 1 << 1;
const CTRLB_TXEN: u32 = 1 << 16;
const CTRLB_RXEN: u32 = 1 << 17;

const INT_DRE: u8 = 1 << 0;
const INT_TXC: u8 = 1 << 1;
const INT_RXC: u8 = 1 << 2;

const SYNCBUSY_ENABLE: u32 = 1 << 1;
const SYNCBUSY_CTRLB: u32 = 1 << 2;

fn lane(value: u32, offset: u64) -> u8 {
    (value >> ((offset & 3) * 8)) as u8
}

fn set_lane(reg: &mut u32, offset: u64, value: u8) {
    let shift = (offset & 3) * 8;
    *reg = (*reg & !(0xFF << shift)) | ((value as u32) << shift);
}

/// SERCOM in USART mode with the internal clock.
///
/// A byte written to DATA occupies the shift register for `tx_cycles` ticks;
/// DRE stays low until it is gone.
#[derive(Debug, Default, serde::Serialize)]
pub struct SercomUsart {
    ctrla: u32,
    ctrlb: u32,
    baud: u32,
    intenset: u8,
    txc: bool,
    status: u16,

    // Internal state
    sync_busy: u32,
    sync_remaining: u32,
    sync_cycles: u32,
    tx_remaining: u32,
    tx_cycles: u32,
    tx_count: u64,
    rx_data: Cell<Option<u8>>,
    #[serde(skip)]
    sink: Option<Arc<Mutex<Vec<u8>>>>,
    echo_stdout: bool,
}

impl SercomUsart {
    pub fn new(sync_cycles: u32, tx_cycles: u32) -> Self {
        Self {
            sync_cycles,
            tx_cycles,
            echo_stdout: true,
            ..Default::default()
        }
    }

    pub fn set_sink(&mut self, sink: Option<Arc<Mutex<Vec<u8>>>>, echo_stdout: bool) {
        self.sink = sink;
        self.echo_stdout = echo_stdout;
    }

    pub fn enabled(&self) -> bool {
        self.ctrla & CTRLA_ENABLE != 0
    }

    pub fn tx_enabled(&self) -> bool {
        self.ctrlb & CTRLB_TXEN != 0
    }

    pub fn ctrla(&self) -> u32 {
        self.ctrla
    }

    pub fn ctrlb(&self) -> u32 {
        self.ctrlb
    }

    pub fn baud(&self) -> u16 {
        self.baud as u16
    }

    /// Bytes accepted for transmission since reset.
    pub fn tx_count(&self) -> u64 {
        self.tx_count
    }

    /// Deliver a byte on RX. Overwrites an unread byte.
    pub fn inject_rx(&mut self, byte: u8) {
        if self.ctrlb & CTRLB_RXEN == 0 {
            tracing::debug!("RX byte {:#04x} arrived with the receiver disabled", byte);
            return;
        }
        self.rx_data.set(Some(byte));
    }

    fn intflag(&self) -> u8 {
        let mut flags = 0;
        if self.enabled() && self.tx_enabled() && self.tx_remaining == 0 {
            flags |= INT_DRE;
        }
        if self.txc {
            flags |= INT_TXC;
        }
        if self.rx_data.get().is_some() {
            flags |= INT_RXC;
        }
        flags
    }

    fn syncbusy(&self) -> u32 {
        if self.sync_remaining > 0 {
            self.sync_busy
        } else {
            0
        }
    }

    fn start_sync(&mut self, bits: u32) {
        self.sync_busy |= bits;
        self.sync_remaining = self.sync_cycles;
    }

    fn push_tx(&mut self, value: u8) {
        if let Some(sink) = &self.sink {
            if let Ok(mut guard) = sink.lock() {
                guard.push(value);
            }
        }

        if self.echo_stdout {
            #[allow(unused_must_use)]
            {
                print!("{}", value as char);
                io::stdout().flush();
            }
        }
    }

    fn write_data(&mut self, value: u8) {
        if !self.enabled() || !self.tx_enabled() {
            tracing::warn!("SERCOM DATA write {:#04x} with transmitter off; dropped", value);
            return;
        }
        if self.tx_remaining > 0 {
            tracing::warn!("SERCOM DATA write {:#04x} while DRE is clear; dropped", value);
            return;
        }
        self.push_tx(value);
        self.tx_count += 1;
        self.txc = false;
        self.tx_remaining = self.tx_cycles;
        if self.tx_remaining == 0 {
            self.txc = true;
        }
    }
}

impl crate::Peripheral for SercomUsart {
    fn read(&self, offset: u64) -> SimResult<u8> {
        let value = match offset {
            0x00..=0x03 => lane(self.ctrla, offset),
            0x04..=0x07 => lane(self.ctrlb, offset),
            0x0C | 0x0D => lane(self.baud, offset),
            0x14 | 0x16 => self.intenset,
            0x18 => self.intflag(),
            0x1A | 0x1B => lane(self.status as u32, offset & 1),
            0x1C..=0x1F => lane(self.syncbusy(), offset),
            0x28 => match self.rx_data.take() {
                Some(byte) => byte,
                None => 0,
            },
            _ => 0,
        };
        Ok(value)
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        match offset {
            0x00..=0x03 => {
                let was_enabled = self.enabled();
                set_lane(&mut self.ctrla, offset, value);
                if offset == 0x00 {
                    self.start_sync(SYNCBUSY_ENABLE);
                    if self.enabled() != was_enabled {
                        tracing::debug!("SERCOM USART enable -> {}", self.enabled());
                    }
                }
            }
            0x04..=0x07 => {
                set_lane(&mut self.ctrlb, offset, value);
                self.start_sync(SYNCBUSY_CTRLB);
            }
            0x0C | 0x0D => set_lane(&mut self.baud, offset, value),
            0x14 => self.intenset &= !value,
            0x16 => self.intenset |= value,
            // DRE and RXC are cleared by hardware only.
            0x18 => {
                if value & INT_TXC != 0 {
                    self.txc = false;
                }
            }
            0x1A | 0x1B => {
                // STATUS error bits are write-one-to-clear.
                let clear = (value as u16) << ((offset & 1) * 8);
                self.status &= !clear;
            }
            0x28 => self.write_data(value),
            // Upper DATA byte only carries bit 8 of 9-bit characters.
            0x29 => {}
            _ => {}
        }
        Ok(())
    }

    fn tick(&mut self) -> crate::PeripheralTickResult {
        if self.sync_remaining > 0 {
            self.sync_remaining -= 1;
            if self.sync_remaining == 0 {
                self.sync_busy = 0;
            }
        }

        if self.tx_remaining > 0 {
            self.tx_remaining -= 1;
            if self.tx_remaining == 0 {
                self.txc = true;
            }
        }

        crate::PeripheralTickResult {
            irq: self.intflag() & self.intenset != 0,
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
