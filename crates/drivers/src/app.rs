// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! The blink control loop.
//!
//! Startup brings up the clock, timer and UART, prints the banner and
//! configures the LED and button. The loop then counts consecutive released
//! samples; reaching [`HOLD_TRIGGER`] flips the blink rate once. The LED itself
//! is only ever driven by the timer interrupt ([`crate::timer::on_match`]).

use crate::board::BoardConfig;
use crate::gpio::Button;
use crate::regs::gclk;
use crate::serial::Uart;
use crate::system;
use crate::timer::{typestate::Running, Timer};
use crate::{Bus, Cpu};

/// Released samples needed to flip the rate.
pub const HOLD_TRIGGER: u32 = 5000;
/// The counter saturates here, one past the trigger, so it fires once per hold.
pub const HOLD_CAP: u32 = HOLD_TRIGGER + 1;

pub const BANNER: &str = "\r\nHello, world!\r\n";
pub const STATUS_BYTE: u8 = b'.';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlinkRate {
    #[default]
    Slow,
    Fast,
}

impl BlinkRate {
    pub const fn period_ms(self) -> u16 {
        match self {
            BlinkRate::Slow => 500,
            BlinkRate::Fast => 100,
        }
    }

    pub const fn toggled(self) -> Self {
        match self {
            BlinkRate::Slow => BlinkRate::Fast,
            BlinkRate::Fast => BlinkRate::Slow,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HoldCounter {
    count: u32,
}

impl HoldCounter {
    pub const fn new() -> Self {
        Self { count: 0 }
    }

    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Feed one button sample. Returns true exactly when the count lands on
    /// [`HOLD_TRIGGER`].
    pub fn sample(&mut self, pressed: bool) -> bool {
        if pressed {
            self.count = 0;
        } else if self.count < HOLD_CAP {
            self.count += 1;
        }
        self.count == HOLD_TRIGGER
    }
}

pub struct Blinky {
    timer: Timer<Running>,
    uart: Uart,
    button: Button,
    counter: HoldCounter,
    rate: BlinkRate,
}

impl Blinky {
    /// Power-up sequence. Interrupts are unmasked first, so the timer may
    /// fire as soon as it is enabled.
    pub fn start<B: Bus + Cpu + ?Sized>(bus: &mut B, board: &BoardConfig) -> Self {
        system::init(bus);

        let rate = BlinkRate::default();
        let timer = Timer::new(board.cpu_hz)
            .initialize(bus, gclk::GEN0, rate.period_ms())
            .enable(bus);

        let uart = Uart::initialize(bus, board.uart_tx, board.uart_rx, board.cpu_hz, board.baud);
        uart.put_str(bus, BANNER);

        board.led.configure_output(bus);
        board.led.clear(bus);

        board.button.configure(bus);

        Self {
            timer,
            uart,
            button: board.button,
            counter: HoldCounter::new(),
            rate,
        }
    }

    /// One loop iteration. Returns the new rate if it changed.
    pub fn poll<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Option<BlinkRate> {
        let pressed = self.button.is_pressed(bus);
        if !self.counter.sample(pressed) {
            return None;
        }

        self.rate = self.rate.toggled();
        self.timer.set_period(bus, self.rate.period_ms());
        self.uart.put_byte(bus, STATUS_BYTE);
        Some(self.rate)
    }

    pub fn run<B: Bus + ?Sized>(mut self, bus: &mut B) -> ! {
        loop {
            self.poll(bus);
        }
    }

    pub fn rate(&self) -> BlinkRate {
        self.rate
    }

    pub fn counter(&self) -> HoldCounter {
        self.counter
    }

    pub fn uart(&self) -> &Uart {
        &self.uart
    }
}
