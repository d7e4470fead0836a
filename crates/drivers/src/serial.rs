// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Blocking transmitter on SERCOM3 in internal-clock USART mode.

use crate::gpio::{Pin, PinFunction};
use crate::regs::sercom::{self, Intflag};
use crate::regs::{gclk, pm};
use crate::{modify_u32, Bus};

const fn reg(offset: u32) -> u32 {
    sercom::SERCOM3_BASE + offset
}

/// Arithmetic-mode BAUD value: `65536 * (1 - 16 * baud / cpu_hz)`, rounded to
/// nearest and truncated to 16 bits. Baud rates above `cpu_hz / 16` clamp to 0.
pub const fn baud_register(cpu_hz: u32, baud: u32) -> u16 {
    let f = cpu_hz as u64;
    let num = 65536 * f.saturating_sub(16 * baud as u64);
    ((num + f / 2) / f) as u16
}

fn sync<B: Bus + ?Sized>(bus: &mut B) {
    while bus.read_u32(reg(sercom::SYNCBUSY)) != 0 {
        core::hint::spin_loop();
    }
}

pub struct Uart {
    _private: (),
}

impl Uart {
    /// 8N1, LSB first, TX on PAD0 and RX on PAD1, clocked from GCLK0.
    pub fn initialize<B: Bus + ?Sized>(
        bus: &mut B,
        tx: Pin,
        rx: Pin,
        cpu_hz: u32,
        baud: u32,
    ) -> Self {
        tx.configure_output(bus);
        tx.select_function(bus, PinFunction::C);
        rx.configure_input(bus);
        rx.select_function(bus, PinFunction::C);

        modify_u32(bus, pm::APBCMASK, |mask| mask | pm::Apbc::SERCOM3.bits());
        bus.write_u16(
            gclk::CLKCTRL,
            gclk::clkctrl(gclk::ID_SERCOM3_CORE, gclk::GEN0),
        );

        bus.write_u32(
            reg(sercom::CTRLA),
            sercom::CTRLA_DORD
                | sercom::CTRLA_MODE_USART_INT_CLK
                | sercom::ctrla_rxpo(1)
                | sercom::ctrla_txpo(0),
        );
        sync(bus);

        bus.write_u32(
            reg(sercom::CTRLB),
            sercom::CTRLB_RXEN | sercom::CTRLB_TXEN | sercom::ctrlb_chsize(0),
        );
        sync(bus);

        bus.write_u16(reg(sercom::BAUD), baud_register(cpu_hz, baud));
        sync(bus);

        modify_u32(bus, reg(sercom::CTRLA), |ctrla| ctrla | sercom::CTRLA_ENABLE);
        sync(bus);

        Self { _private: () }
    }

    /// Wait for the data register to drain, then queue `byte`. Unbounded.
    pub fn put_byte<B: Bus + ?Sized>(&self, bus: &mut B, byte: u8) {
        while !Intflag::from_bits_retain(bus.read_u8(reg(sercom::INTFLAG))).contains(Intflag::DRE)
        {
            core::hint::spin_loop();
        }
        bus.write_u8(reg(sercom::DATA), byte);
    }

    /// Transmit up to, not including, the first NUL.
    pub fn put_bytes<B: Bus + ?Sized>(&self, bus: &mut B, bytes: &[u8]) {
        for &b in bytes.iter().take_while(|&&b| b != 0) {
            self.put_byte(bus, b);
        }
    }

    pub fn put_str<B: Bus + ?Sized>(&self, bus: &mut B, s: &str) {
        self.put_bytes(bus, s.as_bytes());
    }
}
