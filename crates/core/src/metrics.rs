// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimulationObserver;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

#[derive(Debug)]
pub struct PerformanceMetrics {
    read_count: AtomicU64,
    write_count: AtomicU64,
    cycle_count: AtomicU64,
    interrupts_by_irq: Mutex<HashMap<u32, u64>>,
    start_time: Mutex<Instant>,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            read_count: AtomicU64::new(0),
            write_count: AtomicU64::new(0),
            cycle_count: AtomicU64::new(0),
            interrupts_by_irq: Mutex::new(HashMap::new()),
            start_time: Mutex::new(Instant::now()),
        }
    }

    pub fn reset(&self) {
        self.read_count.store(0, Ordering::SeqCst);
        self.write_count.store(0, Ordering::SeqCst);
        self.cycle_count.store(0, Ordering::SeqCst);
        if let Ok(mut m) = self.interrupts_by_irq.lock() {
            m.clear();
        }
        if let Ok(mut t) = self.start_time.lock() {
            *t = Instant::now();
        }
    }

    pub fn get_reads(&self) -> u64 {
        self.read_count.load(Ordering::SeqCst)
    }

    pub fn get_writes(&self) -> u64 {
        self.write_count.load(Ordering::SeqCst)
    }

    pub fn get_accesses(&self) -> u64 {
        self.get_reads() + self.get_writes()
    }

    pub fn get_cycles(&self) -> u64 {
        self.cycle_count.load(Ordering::SeqCst)
    }

    pub fn get_interrupts(&self, irq: u32) -> u64 {
        self.interrupts_by_irq
            .lock()
            .ok()
            .and_then(|m| m.get(&irq).copied())
            .unwrap_or(0)
    }

    /// Bus accesses per second of wall time.
    pub fn get_access_rate(&self) -> f64 {
        let elapsed = self
            .start_time
            .lock()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        if elapsed > 0.0 {
            self.get_accesses() as f64 / elapsed
        } else {
            0.0
        }
    }
}

impl SimulationObserver for PerformanceMetrics {
    fn on_simulation_start(&self) {
        self.reset();
    }

    fn on_register_read(&self, _addr: u32, _width: u8, _value: u32) {
        self.read_count.fetch_add(1, Ordering::SeqCst);
    }

    fn on_register_write(&self, _addr: u32, _width: u8, _value: u32) {
        self.write_count.fetch_add(1, Ordering::SeqCst);
    }

    fn on_interrupt(&self, irq: u32) {
        if let Ok(mut m) = self.interrupts_by_irq.lock() {
            *m.entry(irq).or_insert(0) += 1;
        }
    }

    fn on_cycles(&self, cycles: u64) {
        self.cycle_count.fetch_add(cycles, Ordering::SeqCst);
    }
}
