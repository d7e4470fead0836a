// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! SAMD21 peripheral drivers and the blink control loop.
//!
//! Everything here talks to hardware through the [`Bus`] trait, so the same
//! code runs against volatile MMIO on the target and against the register
//! model in `blinky-core` on the host.

#![cfg_attr(not(test), no_std)]

pub mod app;
pub mod board;
pub mod gpio;
pub mod regs;
pub mod serial;
pub mod system;
pub mod timer;

#[cfg(test)]
mod testing;

/// Register access at 32-bit physical addresses.
///
/// Accesses cannot fail: an address the hardware does not decode is a caller
/// contract violation, not an error. Reads take `&mut self` because reading a
/// peripheral register may have side effects (and advances time in simulation).
pub trait Bus {
    fn read_u8(&mut self, addr: u32) -> u8;
    fn write_u8(&mut self, addr: u32, value: u8);

    fn read_u16(&mut self, addr: u32) -> u16 {
        let b0 = self.read_u8(addr) as u16;
        let b1 = self.read_u8(addr + 1) as u16;
        // Little Endian
        b0 | (b1 << 8)
    }

    fn read_u32(&mut self, addr: u32) -> u32 {
        let b0 = self.read_u8(addr) as u32;
        let b1 = self.read_u8(addr + 1) as u32;
        let b2 = self.read_u8(addr + 2) as u32;
        let b3 = self.read_u8(addr + 3) as u32;
        b0 | (b1 << 8) | (b2 << 16) | (b3 << 24)
    }

    fn write_u16(&mut self, addr: u32, value: u16) {
        self.write_u8(addr, (value & 0xFF) as u8);
        self.write_u8(addr + 1, ((value >> 8) & 0xFF) as u8);
    }

    fn write_u32(&mut self, addr: u32, value: u32) {
        self.write_u8(addr, (value & 0xFF) as u8);
        self.write_u8(addr + 1, ((value >> 8) & 0xFF) as u8);
        self.write_u8(addr + 2, ((value >> 16) & 0xFF) as u8);
        self.write_u8(addr + 3, ((value >> 24) & 0xFF) as u8);
    }
}

/// Core-level operations that are not memory mapped.
pub trait Cpu {
    /// Clear PRIMASK (`cpsie i`).
    fn enable_interrupts(&mut self);
}

/// Read-modify-write helper for 32-bit registers.
pub(crate) fn modify_u32<B, F>(bus: &mut B, addr: u32, f: F)
where
    B: Bus + ?Sized,
    F: FnOnce(u32) -> u32,
{
    let value = bus.read_u32(addr);
    bus.write_u32(addr, f(value));
}

pub(crate) fn modify_u16<B, F>(bus: &mut B, addr: u32, f: F)
where
    B: Bus + ?Sized,
    F: FnOnce(u16) -> u16,
{
    let value = bus.read_u16(addr);
    bus.write_u16(addr, f(value));
}

pub(crate) fn modify_u8<B, F>(bus: &mut B, addr: u32, f: F)
where
    B: Bus + ?Sized,
    F: FnOnce(u8) -> u8,
{
    let value = bus.read_u8(addr);
    bus.write_u8(addr, f(value));
}
