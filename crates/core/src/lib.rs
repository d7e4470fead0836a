// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Register-level model of the SAMD21 peripherals the blink firmware uses.
//!
//! There is no instruction set simulator. The firmware logic from
//! `blinky-drivers` runs natively and performs its register accesses through
//! [`Machine`], which implements the driver `Bus` trait, advances simulated
//! time per access and dispatches interrupt handlers between accesses.

pub mod bus;
pub mod interrupt;
pub mod metrics;
pub mod peripherals;
pub mod signals;
pub mod snapshot;
pub mod system;

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Once};

use interrupt::InterruptController;
use peripherals::nvic::Nvic;


#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    #[error("Memory access violation at {0:#x}")]
    MemoryViolation(u64),
    #[error("Bus access budget of {0} exhausted (stalled busy-wait?)")]
    Stalled(u64),
}

pub type SimResult<T> = Result<T, SimulationError>;

#[derive(Debug, Clone, Default)]
pub struct PeripheralTickResult {
    /// Interrupt request level after this cycle.
    pub irq: bool,
}

/// Trait for observing simulation events in a modular way.
pub trait SimulationObserver: std::fmt::Debug + Send + Sync {
    fn on_simulation_start(&self) {}
    fn on_simulation_stop(&self) {}
    fn on_register_read(&self, _addr: u32, _width: u8, _value: u32) {}
    fn on_register_write(&self, _addr: u32, _width: u8, _value: u32) {}
    fn on_interrupt(&self, _irq: u32) {}
    fn on_cycles(&self, _cycles: u64) {}
}

/// Trait representing a memory-mapped peripheral
pub trait Peripheral: std::fmt::Debug + Send {
    fn read(&self, offset: u64) -> SimResult<u8>;
    fn write(&mut self, offset: u64, value: u8) -> SimResult<()>;
    fn tick(&mut self) -> PeripheralTickResult {
        PeripheralTickResult::default()
    }
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// Unwind payload raised when the access budget runs out.
///
/// Driver busy-waits have no exit of their own, so the only way out of a hung
/// spin is to unwind past it. [`Machine::guarded`] turns it back into an error.
#[derive(Debug, Clone, Copy)]
pub struct StallPayload {
    pub accesses: u64,
}

/// Keep the default panic hook from printing stall unwinds, which are
/// caught and reported as [`SimulationError::Stalled`].
fn quiet_stall_panics() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if info.payload().downcast_ref::<StallPayload>().is_none() {
                previous(info);
            }
        }));
    });
}

pub type InterruptHandler = Box<dyn FnMut(&mut Machine) + Send>;

pub struct Machine {
    pub bus: bus::SystemBus,
    pub nvic: Nvic,
    pub observers: Vec<Arc<dyn SimulationObserver>>,

    pub total_cycles: u64,
    pub total_accesses: u64,

    handlers: HashMap<u32, Option<InterruptHandler>>,
    primask: bool,
    active_irq: Option<u32>,
    cycles_per_access: u32,
    access_budget: Option<u64>,
    faults: Vec<SimulationError>,
    unhandled: Vec<u32>,
}

impl Machine {
    /// PRIMASK starts set, as after reset; the firmware unmasks explicitly.
    pub fn new(mut bus: bus::SystemBus) -> Self {
        let state = match &bus.nvic {
            Some(state) => state.clone(),
            None => system::samd21::configure_samd21(&mut bus),
        };

        Self {
            bus,
            nvic: Nvic::new(state),
            observers: Vec::new(),
            total_cycles: 0,
            total_accesses: 0,
            handlers: HashMap::new(),
            primask: true,
            active_irq: None,
            cycles_per_access: 1,
            access_budget: None,
            faults: Vec::new(),
            unhandled: Vec::new(),
        }
    }

    pub fn with_cycles_per_access(mut self, cycles: u32) -> Self {
        self.cycles_per_access = cycles.max(1);
        self
    }

    /// Stop the run once this many driver accesses have been made in total.
    pub fn set_access_budget(&mut self, budget: Option<u64>) {
        if budget.is_some() {
            quiet_stall_panics();
        }
        self.access_budget = budget;
    }

    pub fn add_observer(&mut self, observer: Arc<dyn SimulationObserver>) {
        self.observers.push(observer);
    }

    /// Install the handler run when `irq` is enabled, pending and unmasked.
    pub fn register_handler(&mut self, irq: u32, handler: InterruptHandler) {
        self.handlers.insert(irq, Some(handler));
    }

    pub fn interrupts_masked(&self) -> bool {
        self.primask
    }

    pub fn in_interrupt(&self) -> bool {
        self.active_irq.is_some()
    }

    pub fn faults(&self) -> &[SimulationError] {
        &self.faults
    }

    /// First recorded fault, if any.
    pub fn check(&self) -> SimResult<()> {
        match self.faults.first() {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Run `f`, converting an exhausted access budget into an error.
    pub fn guarded<R>(&mut self, f: impl FnOnce(&mut Machine) -> R) -> SimResult<R> {
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(self)));
        match outcome {
            Ok(r) => Ok(r),
            Err(payload) => match payload.downcast::<StallPayload>() {
                Ok(stall) => Err(SimulationError::Stalled(stall.accesses)),
                Err(other) => std::panic::resume_unwind(other),
            },
        }
    }

    /// Let `cycles` of simulated time pass without any bus traffic.
    pub fn advance(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.bus.tick_peripherals();
        }
        self.total_cycles += cycles;
        for observer in &self.observers {
            observer.on_cycles(cycles);
        }
        self.service_interrupts();
    }

    fn service_interrupts(&mut self) {
        if self.primask || self.active_irq.is_some() {
            return;
        }

        let Some(irq) = self.nvic.acknowledge_interrupt() else {
            return;
        };

        let Some(mut handler) = self.handlers.get_mut(&irq).and_then(Option::take) else {
            if !self.unhandled.contains(&irq) {
                tracing::warn!("IRQ {} fired with no handler registered", irq);
                self.unhandled.push(irq);
            }
            self.nvic.complete_interrupt(irq);
            return;
        };

        tracing::debug!("Dispatching IRQ {} at cycle {}", irq, self.total_cycles);
        for observer in &self.observers {
            observer.on_interrupt(irq);
        }

        self.active_irq = Some(irq);
        let outcome =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(self)));
        self.active_irq = None;

        // The handler goes back even when a stall unwinds out of it.
        self.handlers.insert(irq, Some(handler));
        // A level still asserted re-pends on the next tick.
        self.nvic.complete_interrupt(irq);
        if let Err(payload) = outcome {
            std::panic::resume_unwind(payload);
        }
    }

    fn begin_access(&mut self) {
        self.total_accesses += 1;
        if let Some(budget) = self.access_budget {
            if self.total_accesses > budget {
                std::panic::panic_any(StallPayload {
                    accesses: budget,
                });
            }
        }
    }

    fn end_access(&mut self) {
        self.advance(self.cycles_per_access as u64);
    }

    fn record_fault(&mut self, e: SimulationError) {
        tracing::warn!("{} (cycle {})", e, self.total_cycles);
        if self.faults.len() < 64 {
            self.faults.push(e);
        }
    }

    fn load(&mut self, addr: u32, width: u8) -> u32 {
        self.begin_access();
        let result = match width {
            1 => self.bus.read_u8(addr as u64).map(u32::from),
            2 => self.bus.read_u16(addr as u64).map(u32::from),
            _ => self.bus.read_u32(addr as u64),
        };
        let value = result.unwrap_or_else(|e| {
            self.record_fault(e);
            0
        });
        tracing::trace!("R{} {:#010x} -> {:#x}", width * 8, addr, value);
        for observer in &self.observers {
            observer.on_register_read(addr, width, value);
        }
        self.end_access();
        value
    }

    fn store(&mut self, addr: u32, width: u8, value: u32) {
        self.begin_access();
        let result = match width {
            1 => self.bus.write_u8(addr as u64, value as u8),
            2 => self.bus.write_u16(addr as u64, value as u16),
            _ => self.bus.write_u32(addr as u64, value),
        };
        if let Err(e) = result {
            self.record_fault(e);
        }
        tracing::trace!("W{} {:#010x} <- {:#x}", width * 8, addr, value);
        for observer in &self.observers {
            observer.on_register_write(addr, width, value);
        }
        self.end_access();
    }

    pub fn snapshot(&self) -> snapshot::MachineSnapshot {
        snapshot::MachineSnapshot {
            cycles: self.total_cycles,
            accesses: self.total_accesses,
            primask: self.primask,
            faults: self.faults.iter().map(|e| e.to_string()).collect(),
            peripherals: self
                .bus
                .peripherals
                .iter()
                .map(|p| (p.name.clone(), p.dev.snapshot()))
                .collect(),
        }
    }

    pub fn peek_peripheral(&self, name: &str) -> Option<serde_json::Value> {
        self.bus
            .peripherals
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.dev.snapshot())
    }
}

impl blinky_drivers::Bus for Machine {
    fn read_u8(&mut self, addr: u32) -> u8 {
        self.load(addr, 1) as u8
    }

    fn write_u8(&mut self, addr: u32, value: u8) {
        self.store(addr, 1, value as u32);
    }

    fn read_u16(&mut self, addr: u32) -> u16 {
        self.load(addr, 2) as u16
    }

    fn read_u32(&mut self, addr: u32) -> u32 {
        self.load(addr, 4)
    }

    fn write_u16(&mut self, addr: u32, value: u16) {
        self.store(addr, 2, value as u32);
    }

    fn write_u32(&mut self, addr: u32, value: u32) {
        self.store(addr, 4, value);
    }
}

impl blinky_drivers::Cpu for Machine {
    fn enable_interrupts(&mut self) {
        tracing::debug!("PRIMASK cleared at cycle {}", self.total_cycles);
        self.primask = false;
        self.service_interrupts();
    }
}
