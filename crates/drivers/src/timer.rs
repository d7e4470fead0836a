// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! TC3 as a 16-bit periodic match timer.
//!
//! The counter runs in match-frequency mode: it counts up to CC0, raises MC0
//! and restarts from zero. Configuration steps are encoded in the type so a
//! period can only be programmed once the peripheral is clocked and set up.

use core::marker::PhantomData;

use crate::gpio::Pin;
use crate::regs::tc::{self, Interrupts, Status};
use crate::regs::{gclk, pm};
use crate::{modify_u16, modify_u32, system, Bus};

pub mod typestate {
    pub struct Unconfigured;
    pub struct Stopped;
    pub struct Running;
}

use typestate::*;

/// States in which CC0 may be reprogrammed.
pub trait Configured {}
impl Configured for Stopped {}
impl Configured for Running {}

const fn reg(offset: u32) -> u32 {
    tc::TC3_BASE + offset
}

/// CC0 value for a period of `ms` milliseconds at DIV256.
///
/// The clock is first reduced to prescaled ticks per millisecond with integer
/// division, then scaled. The result is truncated to the 16-bit register.
pub const fn match_value(cpu_hz: u32, ms: u16) -> u16 {
    ((cpu_hz / 1000 / tc::PRESCALER_DIVISOR) * ms as u32) as u16
}

/// Spin until the TC clock domain has absorbed the last write. Unbounded.
fn sync<B: Bus + ?Sized>(bus: &mut B) {
    while Status::from_bits_retain(bus.read_u8(reg(tc::STATUS))).contains(Status::SYNCBUSY) {
        core::hint::spin_loop();
    }
}

pub struct Timer<S> {
    cpu_hz: u32,
    _state: PhantomData<S>,
}

impl<S> Timer<S> {
    const fn transition<T>(&self) -> Timer<T> {
        Timer {
            cpu_hz: self.cpu_hz,
            _state: PhantomData,
        }
    }

    pub const fn cpu_hz(&self) -> u32 {
        self.cpu_hz
    }
}

impl Timer<Unconfigured> {
    pub const fn new(cpu_hz: u32) -> Self {
        Self {
            cpu_hz,
            _state: PhantomData,
        }
    }

    /// Clock TC3 from `generator`, set COUNT16/MFRQ/DIV256, zero the counter
    /// and program `period_ms`. The counter is left disabled.
    pub fn initialize<B: Bus + ?Sized>(
        self,
        bus: &mut B,
        generator: u8,
        period_ms: u16,
    ) -> Timer<Stopped> {
        modify_u32(bus, pm::APBCMASK, |mask| mask | pm::Apbc::TC3.bits());
        bus.write_u16(gclk::CLKCTRL, gclk::clkctrl(gclk::ID_TC3, generator));

        bus.write_u16(
            reg(tc::CTRLA),
            tc::CTRLA_MODE_COUNT16
                | tc::CTRLA_WAVEGEN_MFRQ
                | tc::CTRLA_PRESCALER_DIV256
                | tc::CTRLA_PRESCSYNC_RESYNC,
        );
        sync(bus);

        bus.write_u16(reg(tc::COUNT), 0);
        sync(bus);

        let timer = self.transition::<Stopped>();
        timer.set_period(bus, period_ms);
        timer
    }
}

impl Timer<Stopped> {
    /// Start counting and route MC0 to the NVIC.
    pub fn enable<B: Bus + ?Sized>(self, bus: &mut B) -> Timer<Running> {
        modify_u16(bus, reg(tc::CTRLA), |ctrla| ctrla | tc::CTRLA_ENABLE);
        sync(bus);

        bus.write_u8(reg(tc::INTENSET), Interrupts::MC0.bits());
        system::enable_irq(bus, tc::TC3_IRQ);

        self.transition()
    }
}

impl<S: Configured> Timer<S> {
    /// Program CC0 and restart the count so the new period applies at once.
    pub fn set_period<B: Bus + ?Sized>(&self, bus: &mut B, ms: u16) {
        bus.write_u16(reg(tc::CC0), match_value(self.cpu_hz, ms));
        sync(bus);

        bus.write_u16(reg(tc::COUNT), 0);
        sync(bus);
    }
}

/// TC3 interrupt body: toggle `led` on a compare match and acknowledge it.
///
/// MC0 is level-triggered; returning without writing it back re-enters the
/// handler immediately.
pub fn on_match<B: Bus + ?Sized>(bus: &mut B, led: Pin) {
    let flags = Interrupts::from_bits_retain(bus.read_u8(reg(tc::INTFLAG)));
    if flags.contains(Interrupts::MC0) {
        led.toggle(bus);
        bus.write_u8(reg(tc::INTFLAG), Interrupts::MC0.bits());
    }
}
