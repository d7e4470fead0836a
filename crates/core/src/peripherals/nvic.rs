// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::interrupt::InterruptController;
use crate::{Peripheral, SimResult};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Shared state for NVIC registers.
///
/// Cortex-M0+ implements a single bank of 32 external interrupts.
#[derive(Debug, Default)]
pub struct NvicState {
    pub iser: AtomicU32,
    pub ispr: AtomicU32,
    /// Active bits. Not software visible on ARMv6-M, tracked for dispatch.
    pub iabr: AtomicU32,
}

impl NvicState {
    /// Level input from a peripheral. An active interrupt does not re-pend
    /// until its handler returns.
    pub fn raise(&self, irq: u32) {
        if irq >= 32 {
            tracing::warn!("IRQ {} outside the 32-line NVIC; ignored", irq);
            return;
        }
        let bit = 1 << irq;
        if self.iabr.load(Ordering::SeqCst) & bit == 0 {
            self.ispr.fetch_or(bit, Ordering::SeqCst);
        }
    }

    pub fn is_enabled(&self, irq: u32) -> bool {
        irq < 32 && self.iser.load(Ordering::SeqCst) & (1 << irq) != 0
    }

    pub fn is_pending(&self, irq: u32) -> bool {
        irq < 32 && self.ispr.load(Ordering::SeqCst) & (1 << irq) != 0
    }
}

/// Nested Vectored Interrupt Controller (NVIC) mock, mapped at 0xE000_E100.
#[derive(Debug, Clone)]
pub struct Nvic {
    pub state: Arc<NvicState>,
}

impl Nvic {
    pub fn new(state: Arc<NvicState>) -> Self {
        Self { state }
    }

    fn reg(&self, offset: u64) -> Option<&AtomicU32> {
        match offset & !3 {
            0x000 | 0x080 => Some(&self.state.iser),
            0x100 | 0x180 => Some(&self.state.ispr),
            _ => None,
        }
    }
}

impl InterruptController for Nvic {
    fn set_interrupt_pending(&self, irq: u32, pending: bool) {
        if pending {
            self.state.raise(irq);
        } else if irq < 32 {
            self.state.ispr.fetch_and(!(1 << irq), Ordering::SeqCst);
        }
    }

    fn is_interrupt_active(&self, irq: u32) -> bool {
        self.state.is_enabled(irq) && self.state.is_pending(irq)
    }

    fn acknowledge_interrupt(&self) -> Option<u32> {
        // Equal priorities: the lowest number wins.
        let ready = self.state.iser.load(Ordering::SeqCst) & self.state.ispr.load(Ordering::SeqCst);
        if ready == 0 {
            return None;
        }
        let irq = ready.trailing_zeros();
        self.state.ispr.fetch_and(!(1 << irq), Ordering::SeqCst);
        self.state.iabr.fetch_or(1 << irq, Ordering::SeqCst);
        Some(irq)
    }

    fn complete_interrupt(&self, irq: u32) {
        if irq < 32 {
            self.state.iabr.fetch_and(!(1 << irq), Ordering::SeqCst);
        }
    }
}

impl Peripheral for Nvic {
    fn read(&self, offset: u64) -> SimResult<u8> {
        let byte_offset = (offset % 4) as u32;
        let val = self.reg(offset).map(|r| r.load(Ordering::SeqCst)).unwrap_or(0);
        Ok(((val >> (byte_offset * 8)) & 0xFF) as u8)
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        let byte_offset = (offset % 4) as u32;
        let mask = (value as u32) << (byte_offset * 8);

        match offset & !3 {
            // ISER / ISPR: writing 1 sets
            0x000 | 0x100 => {
                if let Some(r) = self.reg(offset) {
                    r.fetch_or(mask, Ordering::SeqCst);
                }
            }
            // ICER / ICPR: writing 1 clears
            0x080 | 0x180 => {
                if let Some(r) = self.reg(offset) {
                    r.fetch_and(!mask, Ordering::SeqCst);
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "iser": self.state.iser.load(Ordering::Relaxed),
            "ispr": self.state.ispr.load(Ordering::Relaxed),
            "iabr": self.state.iabr.load(Ordering::Relaxed),
        })
    }
}
