// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::peripherals::nvic::NvicState;
use crate::peripherals::port::Port;
use crate::peripherals::register_file::{ClockBlock, RegisterFile};
use crate::peripherals::sercom_usart::SercomUsart;
use crate::peripherals::tc::Tc;
use crate::signals::DigitalLevel;
use crate::{Peripheral, SimResult, SimulationError};
use blinky_config::{parse_size, ChipDescriptor, SimulationConfig, SystemManifest};
use std::sync::Arc;
use std::sync::Mutex;

pub struct PeripheralEntry {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub irq: Option<u32>,
    pub dev: Box<dyn Peripheral>,
}

/// Address decoder for the peripheral windows. There is no flash or RAM:
/// the firmware logic runs natively and only touches registers.
#[derive(Default)]
pub struct SystemBus {
    pub peripherals: Vec<PeripheralEntry>,
    pub nvic: Option<Arc<NvicState>>,
}

impl SystemBus {
    /// Empty bus. Reads and writes fault until peripherals are added.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_peripheral(
        &mut self,
        name: &str,
        base: u64,
        size: u64,
        irq: Option<u32>,
        dev: Box<dyn Peripheral>,
    ) {
        if let Some(other) = self
            .peripherals
            .iter()
            .find(|p| base < p.base + p.size && p.base < base + size)
        {
            tracing::warn!(
                "Peripheral '{}' at {:#x} overlaps '{}' at {:#x}; the earlier mapping wins",
                name,
                base,
                other.name,
                other.base
            );
        }
        self.peripherals.push(PeripheralEntry {
            name: name.to_string(),
            base,
            size,
            irq,
            dev,
        });
    }

    /// Attach a UART TX capture sink to any SERCOM USART on this bus.
    ///
    /// When `echo_stdout` is false, UART writes will no longer be printed to stdout.
    pub fn attach_uart_tx_sink(&mut self, sink: Arc<Mutex<Vec<u8>>>, echo_stdout: bool) {
        for p in &mut self.peripherals {
            let Some(any) = p.dev.as_any_mut() else {
                continue;
            };
            let Some(uart) = any.downcast_mut::<SercomUsart>() else {
                continue;
            };
            uart.set_sink(Some(sink.clone()), echo_stdout);
        }
    }

    pub fn from_config(chip: &ChipDescriptor, manifest: &SystemManifest) -> anyhow::Result<Self> {
        let timing = &manifest.simulation;
        let mut bus = Self::new();

        for p_cfg in &chip.peripherals {
            let dev: Box<dyn Peripheral> = match p_cfg.r#type.as_str() {
                "port" => Box::new(Port::new()),
                "tc" => {
                    let stuck = p_cfg
                        .config
                        .get("stuck_sync")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false);
                    if stuck {
                        tracing::info!("Fault injection: {} SYNCBUSY stuck high", p_cfg.id);
                    }
                    Box::new(Tc::new(timing.sync_cycles).with_stuck_sync(stuck))
                }
                "sercom_usart" => Box::new(SercomUsart::new(timing.sync_cycles, timing.tx_cycles)),
                kind @ ("pm" | "sysctrl" | "gclk") => {
                    let block: ClockBlock = kind.parse().map_err(anyhow::Error::msg)?;
                    Box::new(RegisterFile::new(block))
                }
                other => {
                    tracing::warn!(
                        "Unsupported peripheral type '{}' for id '{}'; skipping",
                        other,
                        p_cfg.id
                    );
                    continue;
                }
            };

            // Default 1KiB window, the SAMD21 APB slot size.
            let size = if let Some(size) = &p_cfg.size {
                parse_size(size)?
            } else {
                0x400
            };

            bus.add_peripheral(&p_cfg.id, p_cfg.base_address, size, p_cfg.irq, dev);
        }

        Ok(bus)
    }

    /// The SAMD21G18A peripheral map with default timing.
    pub fn samd21() -> Self {
        Self::samd21_with_timing(&SimulationConfig::default())
    }

    pub fn samd21_with_timing(timing: &SimulationConfig) -> Self {
        let mut bus = Self::new();
        bus.add_peripheral("pm", 0x4000_0400, 0x400, None, Box::new(RegisterFile::pm()));
        bus.add_peripheral(
            "sysctrl",
            0x4000_0800,
            0x400,
            None,
            Box::new(RegisterFile::sysctrl()),
        );
        bus.add_peripheral("gclk", 0x4000_0C00, 0x400, None, Box::new(RegisterFile::gclk()));
        bus.add_peripheral("porta", 0x4100_4400, 0x80, None, Box::new(Port::new()));
        bus.add_peripheral("portb", 0x4100_4480, 0x80, None, Box::new(Port::new()));
        bus.add_peripheral(
            "sercom3",
            0x4200_1400,
            0x400,
            Some(12),
            Box::new(SercomUsart::new(timing.sync_cycles, timing.tx_cycles)),
        );
        bus.add_peripheral(
            "tc3",
            0x4200_2C00,
            0x400,
            Some(18),
            Box::new(Tc::new(timing.sync_cycles)),
        );
        bus
    }

    pub fn peripheral<T: 'static>(&self, name: &str) -> Option<&T> {
        self.peripherals
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.dev.as_any())
            .and_then(|any| any.downcast_ref::<T>())
    }

    pub fn peripheral_mut<T: 'static>(&mut self, name: &str) -> Option<&mut T> {
        self.peripherals
            .iter_mut()
            .find(|p| p.name == name)
            .and_then(|p| p.dev.as_any_mut())
            .and_then(|any| any.downcast_mut::<T>())
    }

    /// Apply an external level to a pin of the named port group.
    pub fn drive_pin(
        &mut self,
        port: &str,
        pin: u8,
        level: Option<DigitalLevel>,
    ) -> anyhow::Result<()> {
        let group = self
            .peripheral_mut::<Port>(port)
            .ok_or_else(|| anyhow::anyhow!("No PORT group named '{}' on the bus", port))?;
        group.drive(pin, level);
        Ok(())
    }

    /// Tick every peripheral once and pend asserted interrupt lines.
    ///
    /// Returns the asserted lines as a bitmask.
    pub fn tick_peripherals(&mut self) -> u32 {
        let mut asserted = 0u32;

        for p in &mut self.peripherals {
            let res = p.dev.tick();
            if !res.irq {
                continue;
            }
            let Some(irq) = p.irq else {
                continue;
            };
            if irq < 32 {
                asserted |= 1 << irq;
            }
            if let Some(nvic) = &self.nvic {
                nvic.raise(irq);
            }
        }

        asserted
    }

    fn find(&self, addr: u64) -> SimResult<&PeripheralEntry> {
        self.peripherals
            .iter()
            .find(|p| addr >= p.base && addr < p.base + p.size)
            .ok_or(SimulationError::MemoryViolation(addr))
    }

    pub fn read_u8(&self, addr: u64) -> SimResult<u8> {
        let p = self.find(addr)?;
        p.dev.read(addr - p.base)
    }

    pub fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()> {
        let p = self
            .peripherals
            .iter_mut()
            .find(|p| addr >= p.base && addr < p.base + p.size)
            .ok_or(SimulationError::MemoryViolation(addr))?;
        p.dev.write(addr - p.base, value)
    }

    pub fn read_u32(&self, addr: u64) -> SimResult<u32> {
        let b0 = self.read_u8(addr)? as u32;
        let b1 = self.read_u8(addr + 1)? as u32;
        let b2 = self.read_u8(addr + 2)? as u32;
        let b3 = self.read_u8(addr + 3)? as u32;
        Ok(b0 | (b1 << 8) | (b2 << 16) | (b3 << 24))
    }

    pub fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        self.write_u8(addr, (value & 0xFF) as u8)?;
        self.write_u8(addr + 1, ((value >> 8) & 0xFF) as u8)?;
        self.write_u8(addr + 2, ((value >> 16) & 0xFF) as u8)?;
        self.write_u8(addr + 3, ((value >> 24) & 0xFF) as u8)?;
        Ok(())
    }

    pub fn read_u16(&self, addr: u64) -> SimResult<u16> {
        let b0 = self.read_u8(addr)? as u16;
        let b1 = self.read_u8(addr + 1)? as u16;
        Ok(b0 | (b1 << 8))
    }

    pub fn write_u16(&mut self, addr: u64, value: u16) -> SimResult<()> {
        self.write_u8(addr, (value & 0xFF) as u8)?;
        self.write_u8(addr + 1, ((value >> 8) & 0xFF) as u8)?;
        Ok(())
    }
}
