// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! PORT pin control.
//!
//! Every operation is a direct register access with no validation. Passing a
//! pin number the port group does not implement is undefined hardware
//! behaviour, exactly as on the silicon.

use crate::regs::port::{self, Pincfg};
use crate::{modify_u8, Bus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    A,
    B,
}

impl Port {
    pub const fn group_base(self) -> u32 {
        port::BASE + (self as u32) * port::GROUP_STRIDE
    }
}

/// Peripheral multiplexer function (PMUX value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinFunction {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
    E = 4,
    F = 5,
    G = 6,
    H = 7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pin {
    pub port: Port,
    pub pin: u8,
}

impl Pin {
    pub const fn new(port: Port, pin: u8) -> Self {
        Self { port, pin }
    }

    const fn mask(self) -> u32 {
        1 << self.pin
    }

    const fn reg(self, offset: u32) -> u32 {
        self.port.group_base() + offset
    }

    const fn pincfg(self) -> u32 {
        self.reg(port::PINCFG0) + self.pin as u32
    }

    const fn pmux(self) -> u32 {
        self.reg(port::PMUX0) + (self.pin as u32 >> 1)
    }

    /// Drive the pin. The input buffer stays enabled so `read` reflects the
    /// output level.
    pub fn configure_output<B: Bus + ?Sized>(self, bus: &mut B) {
        bus.write_u32(self.reg(port::DIRSET), self.mask());
        modify_u8(bus, self.pincfg(), |cfg| cfg | Pincfg::INEN.bits());
    }

    /// Input with the pull resistor disabled.
    pub fn configure_input<B: Bus + ?Sized>(self, bus: &mut B) {
        bus.write_u32(self.reg(port::DIRCLR), self.mask());
        modify_u8(bus, self.pincfg(), |cfg| {
            (cfg | Pincfg::INEN.bits()) & !Pincfg::PULLEN.bits()
        });
    }

    /// Pull direction on an input follows the OUT bit.
    pub fn enable_pull_up<B: Bus + ?Sized>(self, bus: &mut B) {
        bus.write_u32(self.reg(port::OUTSET), self.mask());
        modify_u8(bus, self.pincfg(), |cfg| cfg | Pincfg::PULLEN.bits());
    }

    pub fn enable_pull_down<B: Bus + ?Sized>(self, bus: &mut B) {
        bus.write_u32(self.reg(port::OUTCLR), self.mask());
        modify_u8(bus, self.pincfg(), |cfg| cfg | Pincfg::PULLEN.bits());
    }

    pub fn set<B: Bus + ?Sized>(self, bus: &mut B) {
        bus.write_u32(self.reg(port::OUTSET), self.mask());
    }

    pub fn clear<B: Bus + ?Sized>(self, bus: &mut B) {
        bus.write_u32(self.reg(port::OUTCLR), self.mask());
    }

    /// Single store to OUTTGL; safe to call from interrupt context without a
    /// lock as long as nothing else writes this pin.
    pub fn toggle<B: Bus + ?Sized>(self, bus: &mut B) {
        bus.write_u32(self.reg(port::OUTTGL), self.mask());
    }

    pub fn read<B: Bus + ?Sized>(self, bus: &mut B) -> bool {
        (bus.read_u32(self.reg(port::IN)) & self.mask()) != 0
    }

    /// Hand the pin to a peripheral. Even pins use the low PMUX nibble, odd
    /// pins the high one.
    pub fn select_function<B: Bus + ?Sized>(self, bus: &mut B, function: PinFunction) {
        modify_u8(bus, self.pincfg(), |cfg| cfg | Pincfg::PMUXEN.bits());
        let f = function as u8;
        modify_u8(bus, self.pmux(), |pmux| {
            if self.pin & 1 == 1 {
                (pmux & 0x0F) | (f << 4)
            } else {
                (pmux & 0xF0) | f
            }
        });
    }
}

/// Push button on a GPIO pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Button {
    pub pin: Pin,
    /// Level that means "pressed". Active-low buttons idle high on the pull-up.
    pub active_high: bool,
}

impl Button {
    pub const fn active_low(pin: Pin) -> Self {
        Self {
            pin,
            active_high: false,
        }
    }

    pub fn configure<B: Bus + ?Sized>(self, bus: &mut B) {
        self.pin.configure_input(bus);
        if self.active_high {
            self.pin.enable_pull_down(bus);
        } else {
            self.pin.enable_pull_up(bus);
        }
    }

    pub fn is_pressed<B: Bus + ?Sized>(self, bus: &mut B) -> bool {
        self.pin.read(bus) == self.active_high
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingBus;

    const PA15: Pin = Pin::new(Port::A, 15);
    const PB30: Pin = Pin::new(Port::B, 30);

    #[test]
    fn test_group_bases() {
        assert_eq!(Port::A.group_base(), 0x4100_4400);
        assert_eq!(Port::B.group_base(), 0x4100_4480);
    }

    #[test]
    fn test_output_sets_dir_and_input_buffer() {
        let mut bus = RecordingBus::new();
        PB30.configure_output(&mut bus);

        assert_eq!(bus.writes_to(0x4100_4488), vec![1 << 30]);
        assert_eq!(bus.peek_u8(0x4100_4480 + 0x40 + 30), Pincfg::INEN.bits());
    }

    #[test]
    fn test_set_clear_toggle_use_write_only_registers() {
        let mut bus = RecordingBus::new();
        PB30.set(&mut bus);
        PB30.clear(&mut bus);
        PB30.toggle(&mut bus);

        let writes = bus.writes();
        assert_eq!(
            writes,
            vec![
                (0x4100_4498, 1 << 30),
                (0x4100_4494, 1 << 30),
                (0x4100_449C, 1 << 30),
            ]
        );
    }

    #[test]
    fn test_input_pull_up_sequence() {
        let mut bus = RecordingBus::new();
        // Leftover PULLEN must be cleared by configure_input.
        bus.preset_u8(0x4100_4440 + 15, Pincfg::PULLEN.bits());

        PA15.configure_input(&mut bus);
        assert_eq!(bus.peek_u8(0x4100_4440 + 15), Pincfg::INEN.bits());

        PA15.enable_pull_up(&mut bus);
        assert_eq!(bus.writes_to(0x4100_4418), vec![1 << 15]);
        assert_eq!(
            bus.peek_u8(0x4100_4440 + 15),
            (Pincfg::INEN | Pincfg::PULLEN).bits()
        );
    }

    #[test]
    fn test_read_masks_pin() {
        let mut bus = RecordingBus::new();
        bus.preset_u32(0x4100_4420, 1 << 15);
        assert!(PA15.read(&mut bus));

        bus.preset_u32(0x4100_4420, !(1 << 15));
        assert!(!PA15.read(&mut bus));
    }

    #[test]
    fn test_select_function_nibbles() {
        let mut bus = RecordingBus::new();
        let pa22 = Pin::new(Port::A, 22);
        let pa23 = Pin::new(Port::A, 23);

        pa22.select_function(&mut bus, PinFunction::C);
        pa23.select_function(&mut bus, PinFunction::D);

        // PA22/PA23 share PMUX11.
        assert_eq!(bus.peek_u8(0x4100_4430 + 11), 0x32);
        assert_eq!(bus.peek_u8(0x4100_4440 + 22), Pincfg::PMUXEN.bits());
        assert_eq!(bus.peek_u8(0x4100_4440 + 23), Pincfg::PMUXEN.bits());
    }

    #[test]
    fn test_button_polarity() {
        let mut bus = RecordingBus::new();
        let low = Button::active_low(PA15);
        let high = Button {
            pin: PA15,
            active_high: true,
        };

        bus.preset_u32(0x4100_4420, 0);
        assert!(low.is_pressed(&mut bus));
        assert!(!high.is_pressed(&mut bus));

        bus.preset_u32(0x4100_4420, 1 << 15);
        assert!(!low.is_pressed(&mut bus));
        assert!(high.is_pressed(&mut bus));
    }
}
