// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use blinky_core::signals::DigitalLevel;
use blinky_core::SimulationObserver;
use blinky_drivers::gpio::Pin;
use blinky_drivers::regs::port;
use std::fs::File;
use std::io::BufWriter;
use std::sync::Mutex;
use vcd::{IdCode, TimescaleUnit, Value, Writer};

/// Waveform of the board pins. Timestamps count CPU cycles.
pub struct VcdObserver {
    state: Mutex<VcdState>,
    ids: VcdIds,
    led: Pin,
}

struct VcdIds {
    led: IdCode,
    button: IdCode,
    fast: IdCode,
}

struct VcdState {
    // Taken by `finish`; dropping it flushes the file.
    writer: Option<Writer<BufWriter<File>>>,
    current_time: u64,
    written_time: u64,
    led: bool,
}

fn scalar(high: bool) -> Value {
    if high {
        Value::V1
    } else {
        Value::V0
    }
}

impl VcdState {
    fn emit(&mut self, id: IdCode, value: Value) {
        let time = self.current_time;
        let stamp = time != self.written_time;
        self.written_time = time;
        if let Some(writer) = self.writer.as_mut() {
            if stamp {
                let _ = writer.timestamp(time);
            }
            let _ = writer.change_scalar(id, value);
        }
    }
}

impl VcdObserver {
    pub fn new(path: &std::path::Path, led: Pin, button: DigitalLevel) -> anyhow::Result<Self> {
        let file = File::create(path)?;
        let mut writer = Writer::new(BufWriter::new(file));

        writer.timescale(1, TimescaleUnit::NS)?;
        writer.add_module("board")?;
        let led_id = writer.add_wire(1, "led0")?;
        let button_id = writer.add_wire(1, "sw0")?;
        let fast_id = writer.add_wire(1, "blink_fast")?;
        writer.upscope()?;
        writer.enddefinitions()?;

        writer.timestamp(0)?;
        writer.change_scalar(led_id, Value::V0)?;
        writer.change_scalar(button_id, scalar(button.into()))?;
        writer.change_scalar(fast_id, Value::V0)?;

        Ok(Self {
            state: Mutex::new(VcdState {
                writer: Some(writer),
                current_time: 0,
                written_time: 0,
                led: false,
            }),
            ids: VcdIds {
                led: led_id,
                button: button_id,
                fast: fast_id,
            },
            led,
        })
    }

    fn change(&self, id: IdCode, value: Value) {
        if let Ok(mut state) = self.state.lock() {
            state.emit(id, value);
        }
    }

    pub fn record_button(&self, level: DigitalLevel) {
        self.change(self.ids.button, scalar(level.into()));
    }

    pub fn record_fast(&self, fast: bool) {
        self.change(self.ids.fast, scalar(fast));
    }

    pub fn finish(&self) -> anyhow::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("VCD writer lock poisoned"))?;
        let time = state.current_time;
        let stamp = time != state.written_time;
        if let Some(mut writer) = state.writer.take() {
            if stamp {
                writer.timestamp(time)?;
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for VcdObserver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "VcdObserver")
    }
}

impl SimulationObserver for VcdObserver {
    fn on_cycles(&self, cycles: u64) {
        if let Ok(mut state) = self.state.lock() {
            state.current_time += cycles;
        }
    }

    fn on_register_write(&self, addr: u32, _width: u8, value: u32) {
        let base = self.led.port.group_base();
        if !(base..base + port::GROUP_STRIDE).contains(&addr) || value & (1 << self.led.pin) == 0 {
            return;
        }

        if let Ok(mut state) = self.state.lock() {
            let level = match addr - base {
                port::OUTSET => true,
                port::OUTCLR => false,
                port::OUTTGL => !state.led,
                _ => return,
            };
            state.led = level;
            state.emit(self.ids.led, scalar(level));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blinky_drivers::gpio::Port;

    #[test]
    fn test_led_writes_become_timestamped_changes() {
        let path = std::env::temp_dir().join(format!("blinky-vcd-{}.vcd", std::process::id()));
        let led = Pin::new(Port::B, 30);
        let vcd = VcdObserver::new(&path, led, DigitalLevel::High).unwrap();

        vcd.on_cycles(100);
        vcd.on_register_write(0x4100_4498, 4, 1 << 30);
        vcd.on_cycles(50);
        vcd.on_register_write(0x4100_449C, 4, 1 << 30);
        // Other pins on the same group are ignored.
        vcd.on_register_write(0x4100_4498, 4, 1 << 2);
        vcd.record_button(DigitalLevel::Low);
        vcd.finish().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert!(text.contains("led0"));
        assert!(text.contains("#100"));
        assert!(text.contains("#150"));
        assert_eq!(text.matches("#150").count(), 1);
    }
}
