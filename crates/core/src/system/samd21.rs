// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::bus::{PeripheralEntry, SystemBus};
use crate::peripherals::nvic::{Nvic, NvicState};
use crate::peripherals::port::Port as PortModel;
use crate::peripherals::tc::Tc;
use crate::signals::DigitalLevel;
use crate::snapshot::BlinkySnapshot;
use crate::system::builder::SystemSetup;
use crate::{Machine, SimResult};
use blinky_drivers::app::{BlinkRate, Blinky};
use blinky_drivers::board::BoardConfig;
use blinky_drivers::gpio::{Pin, Port};
use blinky_drivers::timer;
use std::sync::{Arc, Mutex};

pub const NVIC_BASE: u64 = 0xE000_E100;
pub const TC3_IRQ: u32 = 18;

/// Map the NVIC onto `bus` and share its state with the interrupt logic.
pub fn configure_samd21(bus: &mut SystemBus) -> Arc<NvicState> {
    let nvic_state = Arc::new(NvicState::default());
    bus.nvic = Some(nvic_state.clone());

    let nvic = Nvic::new(nvic_state.clone());
    if let Some(p) = bus
        .peripherals
        .iter_mut()
        .find(|p| p.name == "nvic" || p.base == NVIC_BASE)
    {
        p.name = "nvic".to_string();
        p.base = NVIC_BASE;
        p.size = 0x400;
        p.irq = None;
        p.dev = Box::new(nvic);
    } else {
        bus.peripherals.push(PeripheralEntry {
            name: "nvic".to_string(),
            base: NVIC_BASE,
            size: 0x400,
            irq: None,
            dev: Box::new(nvic),
        });
    }

    nvic_state
}

pub fn port_name(port: Port) -> &'static str {
    match port {
        Port::A => "porta",
        Port::B => "portb",
    }
}

/// The blink firmware running on a simulated SAMD21.
///
/// Each [`poll`](Self::poll) is one pass of the control loop. The TC3 handler
/// toggles the LED whenever simulated time crosses a compare match.
pub struct BlinkySystem {
    pub machine: Machine,
    app: Option<Blinky>,
    board: BoardConfig,
    tc_name: Option<String>,
    iterations: u64,
    rate_toggles: u64,
}

impl BlinkySystem {
    pub fn new(setup: SystemSetup) -> Self {
        let tc_name = setup
            .bus
            .peripherals
            .iter()
            .find(|p| p.irq == Some(TC3_IRQ))
            .map(|p| p.name.clone());

        let mut machine = Machine::new(setup.bus).with_cycles_per_access(setup.timing.cycles_per_access);

        let led = setup.board.led;
        machine.register_handler(TC3_IRQ, Box::new(move |m| timer::on_match(m, led)));

        Self {
            machine,
            app: None,
            board: setup.board,
            tc_name,
            iterations: 0,
            rate_toggles: 0,
        }
    }

    /// Capture transmitted UART bytes.
    pub fn capture_uart(&mut self, echo_stdout: bool) -> Arc<Mutex<Vec<u8>>> {
        let sink = Arc::new(Mutex::new(Vec::new()));
        self.machine.bus.attach_uart_tx_sink(sink.clone(), echo_stdout);
        sink
    }

    pub fn board(&self) -> &BoardConfig {
        &self.board
    }

    pub fn is_booted(&self) -> bool {
        self.app.is_some()
    }

    /// Run the power-up sequence up to the first loop iteration.
    pub fn boot(&mut self) -> SimResult<()> {
        if self.app.is_some() {
            tracing::warn!("boot called twice; ignoring");
            return Ok(());
        }

        let board = self.board;
        let app = self.machine.guarded(|m| Blinky::start(m, &board))?;
        tracing::info!(
            "Booted at cycle {} after {} bus accesses",
            self.machine.total_cycles,
            self.machine.total_accesses
        );
        self.app = Some(app);
        self.machine.check()
    }

    /// One control-loop iteration. Boots first if needed.
    pub fn poll(&mut self) -> SimResult<Option<BlinkRate>> {
        if self.app.is_none() {
            self.boot()?;
        }
        let Some(app) = self.app.as_mut() else {
            return Ok(None);
        };

        let changed = self.machine.guarded(|m| app.poll(m))?;
        self.iterations += 1;
        if let Some(rate) = changed {
            self.rate_toggles += 1;
            tracing::info!(
                "Blink period now {} ms (iteration {}, cycle {})",
                rate.period_ms(),
                self.iterations,
                self.machine.total_cycles
            );
        }
        self.machine.check()?;
        Ok(changed)
    }

    fn drive_button(&mut self, level: Option<DigitalLevel>) {
        let pin = self.board.button.pin;
        let name = port_name(pin.port);
        if let Err(e) = self.machine.bus.drive_pin(name, pin.pin, level) {
            tracing::warn!("Cannot drive button: {:#}", e);
        }
    }

    /// Hold the button down.
    pub fn press(&mut self) {
        let level = DigitalLevel::from(self.board.button.active_high);
        self.drive_button(Some(level));
    }

    /// Let go of the button; the pull resistor sets the idle level.
    pub fn release(&mut self) {
        self.drive_button(None);
    }

    pub fn rate(&self) -> BlinkRate {
        self.app.as_ref().map(|a| a.rate()).unwrap_or_default()
    }

    pub fn hold_count(&self) -> u32 {
        self.app.as_ref().map(|a| a.counter().count()).unwrap_or(0)
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn rate_toggles(&self) -> u64 {
        self.rate_toggles
    }

    fn port(&self, pin: Pin) -> Option<&PortModel> {
        self.machine.bus.peripheral::<PortModel>(port_name(pin.port))
    }

    pub fn led_level(&self) -> DigitalLevel {
        self.port(self.board.led)
            .map(|p| p.level(self.board.led.pin))
            .unwrap_or_default()
    }

    pub fn led_transitions(&self) -> u64 {
        self.port(self.board.led)
            .map(|p| p.transitions(self.board.led.pin))
            .unwrap_or(0)
    }

    pub fn button_level(&self) -> DigitalLevel {
        let pin = self.board.button.pin;
        self.port(pin).map(|p| p.level(pin.pin)).unwrap_or_default()
    }

    /// Compare values the firmware has programmed into the blink timer.
    pub fn timer_periods(&self) -> Vec<u16> {
        self.tc_name
            .as_deref()
            .and_then(|name| self.machine.bus.peripheral::<Tc>(name))
            .map(|tc| tc.cc0_history().to_vec())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> BlinkySnapshot {
        BlinkySnapshot {
            period_ms: self.rate().period_ms(),
            hold_count: self.hold_count(),
            rate_toggles: self.rate_toggles,
            led_high: self.led_level().into(),
            led_transitions: self.led_transitions(),
            machine: self.machine.snapshot(),
        }
    }
}
