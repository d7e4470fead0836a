// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! SAMD21 register map (only what the drivers touch).

/// NVIC interrupt set-enable register 0.
pub const NVIC_ISER: u32 = 0xE000_E100;

pub mod sysctrl {
    pub const BASE: u32 = 0x4000_0800;
    pub const OSC8M: u32 = BASE + 0x20;

    /// OSC8M.PRESC, divides the 8 MHz oscillator by 2^PRESC (reset value 3).
    pub const OSC8M_PRESC_MASK: u32 = 0x3 << 8;
}

pub mod pm {
    pub const BASE: u32 = 0x4000_0400;
    pub const APBCMASK: u32 = BASE + 0x20;

    bitflags::bitflags! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct Apbc: u32 {
            const SERCOM3 = 1 << 5;
            const TC3 = 1 << 11;
        }
    }
}

pub mod gclk {
    pub const BASE: u32 = 0x4000_0C00;
    pub const CLKCTRL: u32 = BASE + 0x02;

    pub const GEN0: u8 = 0;

    pub const ID_SERCOM3_CORE: u8 = 0x17;
    /// TCC2 and TC3 share one generic clock channel.
    pub const ID_TC3: u8 = 0x1B;

    const CLKEN: u16 = 1 << 14;

    /// CLKCTRL value routing generator `gen` to channel `id`, enabled.
    pub const fn clkctrl(id: u8, gen: u8) -> u16 {
        (id as u16 & 0x3F) | ((gen as u16 & 0xF) << 8) | CLKEN
    }
}

pub mod port {
    pub const BASE: u32 = 0x4100_4400;
    pub const GROUP_STRIDE: u32 = 0x80;

    pub const DIRCLR: u32 = 0x04;
    pub const DIRSET: u32 = 0x08;
    pub const OUTCLR: u32 = 0x14;
    pub const OUTSET: u32 = 0x18;
    pub const OUTTGL: u32 = 0x1C;
    pub const IN: u32 = 0x20;
    pub const PMUX0: u32 = 0x30;
    pub const PINCFG0: u32 = 0x40;

    bitflags::bitflags! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct Pincfg: u8 {
            const PMUXEN = 1 << 0;
            const INEN = 1 << 1;
            const PULLEN = 1 << 2;
        }
    }
}

pub mod tc {
    pub const TC3_BASE: u32 = 0x4200_2C00;
    pub const TC3_IRQ: u8 = 18;

    pub const CTRLA: u32 = 0x00;
    pub const INTENSET: u32 = 0x0D;
    pub const INTFLAG: u32 = 0x0E;
    pub const STATUS: u32 = 0x0F;
    pub const COUNT: u32 = 0x10;
    pub const CC0: u32 = 0x18;

    pub const CTRLA_ENABLE: u16 = 1 << 1;
    pub const CTRLA_MODE_COUNT16: u16 = 0x0000;
    pub const CTRLA_WAVEGEN_MFRQ: u16 = 1 << 5;
    pub const CTRLA_PRESCALER_DIV256: u16 = 6 << 8;
    pub const CTRLA_PRESCSYNC_RESYNC: u16 = 1 << 12;

    /// Counter increments per generic clock cycle at DIV256.
    pub const PRESCALER_DIVISOR: u32 = 256;

    bitflags::bitflags! {
        /// INTFLAG / INTENSET / INTENCLR share one layout.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct Interrupts: u8 {
            const OVF = 1 << 0;
            const ERR = 1 << 1;
            const SYNCRDY = 1 << 3;
            const MC0 = 1 << 4;
            const MC1 = 1 << 5;
        }
    }

    bitflags::bitflags! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct Status: u8 {
            const STOP = 1 << 3;
            const SLAVE = 1 << 4;
            const SYNCBUSY = 1 << 7;
        }
    }
}

pub mod sercom {
    pub const SERCOM3_BASE: u32 = 0x4200_1400;

    pub const CTRLA: u32 = 0x00;
    pub const CTRLB: u32 = 0x04;
    pub const BAUD: u32 = 0x0C;
    pub const INTFLAG: u32 = 0x18;
    pub const SYNCBUSY: u32 = 0x1C;
    pub const DATA: u32 = 0x28;

    pub const CTRLA_ENABLE: u32 = 1 << 1;
    pub const CTRLA_MODE_USART_INT_CLK: u32 = 1 << 2;
    pub const CTRLA_DORD: u32 = 1 << 30;

    pub const fn ctrla_txpo(pad: u32) -> u32 {
        (pad & 0x3) << 16
    }

    pub const fn ctrla_rxpo(pad: u32) -> u32 {
        (pad & 0x3) << 20
    }

    pub const fn ctrlb_chsize(bits_code: u32) -> u32 {
        bits_code & 0x7
    }

    pub const CTRLB_TXEN: u32 = 1 << 16;
    pub const CTRLB_RXEN: u32 = 1 << 17;

    bitflags::bitflags! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct Intflag: u8 {
            const DRE = 1 << 0;
            const TXC = 1 << 1;
            const RXC = 1 << 2;
        }
    }
}
