// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use blinky_core::metrics::PerformanceMetrics;
use blinky_core::peripherals::tc::Tc;
use blinky_core::signals::DigitalLevel;
use blinky_core::system::builder::{build_system, SystemSetup};
use blinky_core::system::samd21::{BlinkySystem, TC3_IRQ};
use blinky_core::SimulationError;
use blinky_drivers::app::{BlinkRate, BANNER, HOLD_CAP, HOLD_TRIGGER};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

fn booted() -> (BlinkySystem, Arc<Mutex<Vec<u8>>>) {
    let mut sys = BlinkySystem::new(SystemSetup::default());
    let uart = sys.capture_uart(false);
    sys.boot().unwrap();
    (sys, uart)
}

fn poll_n(sys: &mut BlinkySystem, n: u32) -> Vec<(u64, BlinkRate)> {
    let start = sys.iterations();
    let mut toggles = Vec::new();
    for _ in 0..n {
        if let Some(rate) = sys.poll().unwrap() {
            toggles.push((sys.iterations() - start, rate));
        }
    }
    toggles
}

fn uart_text(uart: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8_lossy(&uart.lock().unwrap()).into_owned()
}

fn tc3(sys: &BlinkySystem) -> &Tc {
    sys.machine.bus.peripheral::<Tc>("tc3").unwrap()
}

#[test]
fn test_end_to_end_hold_press_hold() {
    let (mut sys, uart) = booted();
    assert_eq!(uart_text(&uart), BANNER);

    // Never pressed: exactly one toggle, on iteration 5000.
    let toggles = poll_n(&mut sys, 5000);
    assert_eq!(toggles, vec![(HOLD_TRIGGER as u64, BlinkRate::Fast)]);
    assert_eq!(sys.timer_periods(), vec![15_500, 3_100]);
    assert_eq!(uart_text(&uart), format!("{}.", BANNER));

    // Counter parks at the cap; nothing more happens.
    assert!(poll_n(&mut sys, 5000).is_empty());
    assert_eq!(sys.hold_count(), HOLD_CAP);
    assert_eq!(sys.timer_periods().len(), 2);

    // One pressed sample restarts the count.
    sys.press();
    assert!(poll_n(&mut sys, 1).is_empty());
    assert_eq!(sys.hold_count(), 0);
    sys.release();

    let toggles = poll_n(&mut sys, 5000);
    assert_eq!(toggles, vec![(HOLD_TRIGGER as u64, BlinkRate::Slow)]);
    assert_eq!(sys.timer_periods(), vec![15_500, 3_100, 15_500]);
    assert_eq!(uart_text(&uart), format!("{}..", BANNER));
    assert_eq!(sys.rate_toggles(), 2);
}

#[test]
fn test_press_before_trigger_restarts_without_toggle() {
    let (mut sys, uart) = booted();

    assert!(poll_n(&mut sys, 4999).is_empty());
    sys.press();
    assert!(poll_n(&mut sys, 3).is_empty());
    sys.release();
    assert!(poll_n(&mut sys, 4999).is_empty());

    assert_eq!(sys.hold_count(), 4999);
    assert_eq!(sys.timer_periods(), vec![15_500]);
    assert_eq!(uart_text(&uart), BANNER);

    assert_eq!(poll_n(&mut sys, 1), vec![(1, BlinkRate::Fast)]);
}

#[test]
fn test_counter_bounds_hold_for_mixed_samples() {
    let (mut sys, _uart) = booted();

    for i in 0..12_000u32 {
        let pressed = i % 5_500 == 5_499;
        if pressed {
            sys.press();
        }
        sys.poll().unwrap();
        assert!(sys.hold_count() <= HOLD_CAP);
        if pressed {
            assert_eq!(sys.hold_count(), 0);
            sys.release();
        }
    }
}

#[test]
fn test_set_period_restarts_count() {
    let (mut sys, _uart) = booted();
    poll_n(&mut sys, 4999);
    sys.machine.advance(300_000);
    assert!(tc3(&sys).count() > 1000);

    assert_eq!(sys.poll().unwrap(), Some(BlinkRate::Fast));
    assert_eq!(tc3(&sys).cc0(), 3_100);
    // Only the status byte write and a few polls have passed since COUNT = 0.
    assert!(tc3(&sys).count() <= 1, "count {}", tc3(&sys).count());
}

#[test]
fn test_led_toggles_only_from_timer_interrupt() {
    let (mut sys, _uart) = booted();
    let metrics = Arc::new(PerformanceMetrics::new());
    sys.machine.add_observer(metrics.clone());

    poll_n(&mut sys, 5000);
    assert_eq!(sys.rate(), BlinkRate::Fast);
    assert_eq!(sys.led_transitions(), 0);

    // Fast period: (3100 + 1) * 256 cycles per match.
    let period = 3_101 * 256;
    let mut edges = Vec::new();
    while edges.len() < 3 {
        let before = sys.led_transitions();
        sys.machine.advance(64);
        if sys.led_transitions() != before {
            edges.push(sys.machine.total_cycles);
        }
    }

    for pair in edges.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap.abs_diff(period) <= 64, "gap {} vs {}", gap, period);
    }
    assert_eq!(metrics.get_interrupts(TC3_IRQ), 3);
    assert_eq!(sys.led_level(), DigitalLevel::High);
}

#[test]
fn test_stuck_sync_is_reported_as_stall() {
    let mut setup = SystemSetup::default();
    if let Some(entry) = setup.bus.peripherals.iter_mut().find(|p| p.name == "tc3") {
        entry.dev = Box::new(Tc::new(6).with_stuck_sync(true));
    }
    let mut sys = BlinkySystem::new(setup);
    let uart = sys.capture_uart(false);
    sys.machine.set_access_budget(Some(10_000));

    assert_eq!(sys.boot(), Err(SimulationError::Stalled(10_000)));
    assert!(!sys.is_booted());
    // The timer comes up before the UART, so nothing was printed.
    assert!(uart.lock().unwrap().is_empty());
}

#[test]
fn test_led_keeps_blinking_after_stall_in_timer_handler() {
    let (mut sys, _uart) = booted();
    // Slow period: (15500 + 1) * 256 cycles per match.
    let period = 15_501 * 256;

    let spent = sys.machine.total_accesses;
    sys.machine.set_access_budget(Some(spent));
    let result = sys.machine.guarded(|m| m.advance(2 * period));
    assert!(matches!(result, Err(SimulationError::Stalled(_))));
    assert!(!sys.machine.in_interrupt());
    let before = sys.led_transitions();

    sys.machine.set_access_budget(None);
    for _ in 0..(4 * period / 64) {
        sys.machine.advance(64);
    }
    assert!(
        sys.led_transitions() >= before + 3,
        "LED transitions before={} after={}",
        before,
        sys.led_transitions()
    );
}

#[test]
fn test_bundled_system_manifest_boots() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../configs/systems/samd21-xplained-pro.yaml");
    let setup = build_system(Some(&path)).unwrap();
    assert_eq!(setup.board.cpu_hz, 8_000_000);

    let mut sys = BlinkySystem::new(setup);
    let uart = sys.capture_uart(false);
    sys.boot().unwrap();

    assert_eq!(uart_text(&uart), BANNER);
    assert_eq!(sys.button_level(), DigitalLevel::High);
    let snap = sys.snapshot();
    assert_eq!(snap.period_ms, 500);
    assert!(snap.machine.peripherals.contains_key("sercom3"));
}
