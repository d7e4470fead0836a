// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::regs::{sysctrl, NVIC_ISER};
use crate::{modify_u32, Bus, Cpu};

/// Run the core from the undivided 8 MHz OSC8M and unmask interrupts.
pub fn init<B: Bus + Cpu + ?Sized>(bus: &mut B) {
    modify_u32(bus, sysctrl::OSC8M, |osc| osc & !sysctrl::OSC8M_PRESC_MASK);
    bus.enable_interrupts();
}

/// ISER is write-one-to-set, so no read-modify-write is needed.
pub fn enable_irq<B: Bus + ?Sized>(bus: &mut B, irq: u8) {
    bus.write_u32(NVIC_ISER, 1 << irq);
}
