// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::gpio::{Button, Pin, Port};

/// Pins and clocks the control loop is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardConfig {
    pub cpu_hz: u32,
    pub baud: u32,
    pub led: Pin,
    pub button: Button,
    pub uart_tx: Pin,
    pub uart_rx: Pin,
}

/// SAM D21 Xplained Pro: LED0 on PB30, SW0 on PA15, EDBG CDC on SERCOM3.
pub const XPLAINED_PRO: BoardConfig = BoardConfig {
    cpu_hz: 8_000_000,
    baud: 115_200,
    led: Pin::new(Port::B, 30),
    button: Button::active_low(Pin::new(Port::A, 15)),
    uart_tx: Pin::new(Port::A, 22),
    uart_rx: Pin::new(Port::A, 23),
};
