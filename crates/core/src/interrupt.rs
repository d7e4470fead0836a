// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::fmt::Debug;

/// Trait representing a generic interrupt controller.
///
/// IRQ numbers are device interrupt lines (TC3 is 18 on the SAMD21), not
/// exception numbers.
pub trait InterruptController: Debug + Send + Sync {
    /// Signal the controller that an interrupt line has changed.
    fn set_interrupt_pending(&self, irq: u32, pending: bool);

    /// Check if a specific interrupt is enabled and pending.
    fn is_interrupt_active(&self, irq: u32) -> bool;

    /// Take the highest priority enabled and pending interrupt, moving it
    /// from pending to active.
    fn acknowledge_interrupt(&self) -> Option<u32>;

    /// Mark the handler for `irq` as returned.
    fn complete_interrupt(&self, irq: u32);
}
