// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

#![no_std]
#![no_main]

use blinky_drivers::app::Blinky;
use blinky_drivers::board::XPLAINED_PRO;
use blinky_drivers::{timer, Bus, Cpu};
use cortex_m_rt::entry;
use panic_halt as _;

/// Volatile access to the physical address space.
struct Mmio;

impl Bus for Mmio {
    fn read_u8(&mut self, addr: u32) -> u8 {
        unsafe { core::ptr::read_volatile(addr as *const u8) }
    }

    fn write_u8(&mut self, addr: u32, value: u8) {
        unsafe { core::ptr::write_volatile(addr as *mut u8, value) }
    }

    fn read_u16(&mut self, addr: u32) -> u16 {
        unsafe { core::ptr::read_volatile(addr as *const u16) }
    }

    fn read_u32(&mut self, addr: u32) -> u32 {
        unsafe { core::ptr::read_volatile(addr as *const u32) }
    }

    fn write_u16(&mut self, addr: u32, value: u16) {
        unsafe { core::ptr::write_volatile(addr as *mut u16, value) }
    }

    fn write_u32(&mut self, addr: u32, value: u32) {
        unsafe { core::ptr::write_volatile(addr as *mut u32, value) }
    }
}

impl Cpu for Mmio {
    fn enable_interrupts(&mut self) {
        unsafe { cortex_m::interrupt::enable() }
    }
}

#[entry]
fn main() -> ! {
    let mut bus = Mmio;
    Blinky::start(&mut bus, &XPLAINED_PRO).run(&mut bus)
}

unsafe extern "C" fn tc3() {
    // Only touches OUTTGL and INTFLAG, neither of which the main loop uses.
    timer::on_match(&mut Mmio, XPLAINED_PRO.led);
}

unsafe extern "C" fn default_handler() {
    #[allow(clippy::empty_loop)]
    loop {}
}

type Handler = unsafe extern "C" fn();

#[link_section = ".vector_table.interrupts"]
#[no_mangle]
pub static __INTERRUPTS: [Handler; 28] = [
    default_handler, // 0 PM
    default_handler, // 1 SYSCTRL
    default_handler, // 2 WDT
    default_handler, // 3 RTC
    default_handler, // 4 EIC
    default_handler, // 5 NVMCTRL
    default_handler, // 6 DMAC
    default_handler, // 7 USB
    default_handler, // 8 EVSYS
    default_handler, // 9 SERCOM0
    default_handler, // 10 SERCOM1
    default_handler, // 11 SERCOM2
    default_handler, // 12 SERCOM3
    default_handler, // 13 SERCOM4
    default_handler, // 14 SERCOM5
    default_handler, // 15 TCC0
    default_handler, // 16 TCC1
    default_handler, // 17 TCC2
    tc3,             // 18 TC3
    default_handler, // 19 TC4
    default_handler, // 20 TC5
    default_handler, // 21 TC6
    default_handler, // 22 TC7
    default_handler, // 23 ADC
    default_handler, // 24 AC
    default_handler, // 25 DAC
    default_handler, // 26 PTC
    default_handler, // 27 I2S
];
