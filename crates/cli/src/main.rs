// LabWired Blinky - SAMD21 Firmware and Simulation
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

mod vcd_trace;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

use blinky_config::{
    ButtonState, ScenarioAssertion, ScenarioLimits, ScenarioScript, StopReason, SystemManifest,
};
use blinky_core::metrics::PerformanceMetrics;
use blinky_core::snapshot::BlinkySnapshot;
use blinky_core::system::builder::build_system;
use blinky_core::system::samd21::{BlinkySystem, TC3_IRQ};
use blinky_core::SimulationError;
use blinky_drivers::app::BlinkRate;
use vcd_trace::VcdObserver;

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

const RESULT_SCHEMA_VERSION: &str = "1.0";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "SAMD21 blink firmware on a register-level simulator",
    long_about = None
)]
struct Cli {
    /// Log interrupt dispatch and register traffic
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Boot the firmware and run the control loop for a number of iterations.
    Run(RunArgs),

    /// Deterministic, CI-friendly runner mode driven by a scenario script (YAML).
    Test(TestArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Path to the system manifest (YAML); the built-in Xplained Pro wiring if omitted
    #[arg(short, long)]
    system: Option<PathBuf>,

    /// Control-loop iterations to run
    #[arg(short, long, default_value = "20000")]
    iterations: u64,

    /// Press the button from this iteration until the end of the run
    #[arg(long)]
    hold_from: Option<u64>,

    /// Stop after this many bus accesses (catches a hung busy-wait)
    #[arg(long)]
    max_bus_accesses: Option<u64>,

    /// Write LED and button levels as a VCD waveform
    #[arg(long)]
    vcd: Option<PathBuf>,

    /// Write a state snapshot (JSON) at the end of the run
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Disable UART stdout echo
    #[arg(long)]
    no_uart_stdout: bool,

    /// Print the run summary as JSON on stdout (implies --no-uart-stdout)
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct TestArgs {
    /// Path to the scenario script (YAML)
    #[arg(short = 'c', long)]
    script: PathBuf,

    /// Path to the system manifest (YAML); overrides inputs.system
    #[arg(short = 's', long)]
    system: Option<PathBuf>,

    /// Directory to write test artifacts (result.json, uart.log, snapshot.json)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Disable UART stdout echo (still captured for assertions/artifacts)
    #[arg(long)]
    no_uart_stdout: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct RunSummary {
    system: String,
    iterations: u64,
    cycles: u64,
    bus_accesses: u64,
    timer_interrupts: u64,
    period_ms: u16,
    rate_toggles: u64,
    led_transitions: u64,
    uart: String,
    stop_reason: StopReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TestResult {
    result_schema_version: String,
    status: String,
    iterations: u64,
    cycles: u64,
    bus_accesses: u64,
    stop_reason: StopReason,
    stop_reason_details: StopReasonDetails,
    limits: ScenarioLimits,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    assertions: Vec<AssertionResult>,
    inputs_hash: String,
    config: TestConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct StopReasonDetails {
    triggered_stop_condition: StopReason,
    triggered_limit: Option<NamedU64>,
    observed: Option<NamedU64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct NamedU64 {
    name: String,
    value: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct AssertionResult {
    assertion: ScenarioAssertion,
    passed: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct TestConfig {
    system: Option<PathBuf>,
    script: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Snapshot {
    Standard {
        board: Box<BlinkySnapshot>,
        iterations: u64,
        stop_reason: StopReason,
        stop_reason_details: StopReasonDetails,
        limits: ScenarioLimits,
        inputs_hash: String,
        config: TestConfig,
    },
    ConfigError {
        message: String,
        stop_reason_details: StopReasonDetails,
        config: TestConfig,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only UART echo or JSON.
    let level = if cli.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => run_interactive(args),
        Commands::Test(args) => run_test(args),
    }
}

fn stop_reason_for(e: &SimulationError) -> StopReason {
    match e {
        SimulationError::MemoryViolation(_) => StopReason::MemoryViolation,
        SimulationError::Stalled(_) => StopReason::MaxBusAccesses,
    }
}

fn uart_text(uart: &Arc<Mutex<Vec<u8>>>) -> String {
    let bytes = uart.lock().map(|g| g.clone()).unwrap_or_default();
    String::from_utf8_lossy(&bytes).to_string()
}

fn notify_start(sim: &BlinkySystem) {
    for observer in &sim.machine.observers {
        observer.on_simulation_start();
    }
}

fn notify_stop(sim: &BlinkySystem) {
    for observer in &sim.machine.observers {
        observer.on_simulation_stop();
    }
}

fn run_interactive(args: RunArgs) -> ExitCode {
    info!("Starting blink simulation");

    let setup = match build_system(args.system.as_deref()) {
        Ok(setup) => setup,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    let system_name = setup.name.clone();

    let mut sim = BlinkySystem::new(setup);
    let uart = sim.capture_uart(!(args.no_uart_stdout || args.json));
    sim.machine.set_access_budget(args.max_bus_accesses);

    let metrics = Arc::new(PerformanceMetrics::new());
    sim.machine.add_observer(metrics.clone());

    let vcd = match &args.vcd {
        Some(path) => match VcdObserver::new(path, sim.board().led, sim.button_level()) {
            Ok(vcd) => {
                let vcd = Arc::new(vcd);
                sim.machine.add_observer(vcd.clone());
                Some(vcd)
            }
            Err(e) => {
                error!("Failed to create VCD {:?}: {:#}", path, e);
                return ExitCode::from(EXIT_CONFIG_ERROR);
            }
        },
        None => None,
    };

    notify_start(&sim);
    let mut stop_reason = StopReason::Completed;
    let mut message = None;

    info!("Running for {} iterations...", args.iterations);
    for i in 0..args.iterations {
        if args.hold_from == Some(i) {
            info!("Button pressed at iteration {}", i);
            sim.press();
            if let Some(vcd) = &vcd {
                vcd.record_button(sim.button_level());
            }
        }

        match sim.poll() {
            Ok(Some(rate)) => {
                if let Some(vcd) = &vcd {
                    vcd.record_fast(rate == BlinkRate::Fast);
                }
            }
            Ok(None) => {}
            Err(e) => {
                error!("Simulation error at iteration {}: {}", i, e);
                stop_reason = stop_reason_for(&e);
                message = Some(e.to_string());
                break;
            }
        }

        if i > 0 && i % 100_000 == 0 {
            info!(
                "Progress: {} iterations, {:.0} accesses/s",
                i,
                metrics.get_access_rate()
            );
        }
    }
    notify_stop(&sim);

    if let Some(vcd) = &vcd {
        if let Err(e) = vcd.finish() {
            error!("Failed to finish VCD: {:#}", e);
        }
    }

    info!("Simulation loop finished.");
    info!("Iterations: {}", sim.iterations());
    info!("Total Cycles: {}", sim.machine.total_cycles);
    info!("Bus Accesses: {}", sim.machine.total_accesses);
    info!(
        "Blink period: {} ms after {} toggles",
        sim.rate().period_ms(),
        sim.rate_toggles()
    );

    if let Some(path) = &args.snapshot {
        write_json(path, &sim.snapshot());
    }

    if args.json {
        let summary = RunSummary {
            system: system_name,
            iterations: sim.iterations(),
            cycles: sim.machine.total_cycles,
            bus_accesses: sim.machine.total_accesses,
            timer_interrupts: metrics.get_interrupts(TC3_IRQ),
            period_ms: sim.rate().period_ms(),
            rate_toggles: sim.rate_toggles(),
            led_transitions: sim.led_transitions(),
            uart: uart_text(&uart),
            stop_reason,
            message,
        };
        match serde_json::to_string_pretty(&summary) {
            Ok(s) => println!("{}", s),
            Err(e) => error!("Failed to serialize summary: {}", e),
        }
    }

    if stop_reason == StopReason::Completed {
        ExitCode::from(EXIT_PASS)
    } else {
        ExitCode::from(EXIT_RUNTIME_ERROR)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            error!("Failed to create parent dir {:?}: {}", parent, e);
            return;
        }
    }
    match std::fs::File::create(path) {
        Ok(f) => {
            if let Err(e) = serde_json::to_writer_pretty(f, value) {
                error!("Failed to write {:?}: {}", path, e);
            }
        }
        Err(e) => error!("Failed to create {:?}: {}", path, e),
    }
}

fn build_stop_reason_details(
    stop_reason: StopReason,
    limits: &ScenarioLimits,
    iterations: u64,
    bus_accesses: u64,
    duration: std::time::Duration,
) -> StopReasonDetails {
    let (triggered_limit, observed) = match stop_reason {
        StopReason::MaxIterations => (
            Some(NamedU64 {
                name: "max_iterations".to_string(),
                value: limits.max_iterations,
            }),
            Some(NamedU64 {
                name: "iterations".to_string(),
                value: iterations,
            }),
        ),
        StopReason::MaxBusAccesses => (
            limits.max_bus_accesses.map(|v| NamedU64 {
                name: "max_bus_accesses".to_string(),
                value: v,
            }),
            Some(NamedU64 {
                name: "bus_accesses".to_string(),
                value: bus_accesses,
            }),
        ),
        StopReason::WallTime => (
            limits.wall_time_ms.map(|v| NamedU64 {
                name: "wall_time_ms".to_string(),
                value: v,
            }),
            Some(NamedU64 {
                name: "elapsed_wall_time_ms".to_string(),
                value: duration.as_millis().min(u128::from(u64::MAX)) as u64,
            }),
        ),
        StopReason::Completed | StopReason::MemoryViolation | StopReason::ConfigError => {
            (None, None)
        }
    };

    StopReasonDetails {
        triggered_stop_condition: stop_reason,
        triggered_limit,
        observed,
    }
}

fn resolve_script_path(script_path: &Path, value: &str) -> PathBuf {
    let p = PathBuf::from(value);
    if p.is_absolute() {
        return p;
    }
    script_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(p)
}

/// SHA-256 over the script, the system manifest and its chip descriptor.
fn hash_inputs(script: &Path, system: Option<&Path>) -> anyhow::Result<String> {
    use anyhow::Context;

    let mut hasher = Sha256::new();
    hasher.update(
        std::fs::read(script).with_context(|| format!("Failed to read {:?}", script))?,
    );
    if let Some(system) = system {
        hasher.update(
            std::fs::read(system).with_context(|| format!("Failed to read {:?}", system))?,
        );
        let manifest = SystemManifest::from_file(system)?;
        let chip = manifest.chip_path(system);
        hasher.update(
            std::fs::read(&chip).with_context(|| format!("Failed to read {:?}", chip))?,
        );
    }
    Ok(format!("{:x}", hasher.finalize()))
}

struct LoopResult {
    stop_reason: StopReason,
    message: Option<String>,
    sim_error: bool,
    duration: std::time::Duration,
}

fn execute_scenario(sim: &mut BlinkySystem, script: &ScenarioScript) -> LoopResult {
    let limits = &script.limits;
    let start = std::time::Instant::now();
    let mut stop_reason = StopReason::Completed;
    let mut message = None;
    let mut sim_error = false;

    'stimulus: for (n, step) in script.stimulus.iter().enumerate() {
        info!(
            "Stimulus {}: button {:?} for {} iterations",
            n, step.button, step.iterations
        );
        match step.button {
            ButtonState::Pressed => sim.press(),
            ButtonState::Released => sim.release(),
        }

        for _ in 0..step.iterations {
            if sim.iterations() >= limits.max_iterations {
                stop_reason = StopReason::MaxIterations;
                break 'stimulus;
            }
            if let Some(wall_time_ms) = limits.wall_time_ms {
                if start.elapsed().as_millis() >= wall_time_ms as u128 {
                    stop_reason = StopReason::WallTime;
                    break 'stimulus;
                }
            }

            if let Err(e) = sim.poll() {
                error!("Simulation error at iteration {}: {}", sim.iterations(), e);
                stop_reason = stop_reason_for(&e);
                message = Some(e.to_string());
                sim_error = true;
                break 'stimulus;
            }
        }
    }

    LoopResult {
        stop_reason,
        message,
        sim_error,
        duration: start.elapsed(),
    }
}

fn evaluate(
    assertion: &ScenarioAssertion,
    sim: &BlinkySystem,
    uart: &str,
    stop: StopReason,
) -> bool {
    match assertion {
        ScenarioAssertion::UartContains(a) => uart.contains(&a.uart_contains),
        ScenarioAssertion::UartEquals(a) => uart == a.uart_equals,
        ScenarioAssertion::RateToggles(a) => sim.rate_toggles() == a.rate_toggles,
        ScenarioAssertion::FinalPeriodMs(a) => sim.rate().period_ms() == a.final_period_ms,
        ScenarioAssertion::LedTogglesAtLeast(a) => sim.led_transitions() >= a.led_toggles_at_least,
        ScenarioAssertion::ExpectedStopReason(a) => a.expected_stop_reason == stop,
    }
}

fn run_test(args: TestArgs) -> ExitCode {
    let script = match ScenarioScript::from_file(&args.script) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_config_error_outputs(&args, args.system.clone(), msg);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let system_path = args.system.clone().or_else(|| {
        script
            .inputs
            .system
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| resolve_script_path(&args.script, s))
    });

    let inputs_hash = match hash_inputs(&args.script, system_path.as_deref()) {
        Ok(h) => h,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_config_error_outputs(&args, system_path, msg);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let setup = match build_system(system_path.as_deref()) {
        Ok(setup) => setup,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_config_error_outputs(&args, system_path, msg);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let mut sim = BlinkySystem::new(setup);
    let uart = sim.capture_uart(!args.no_uart_stdout);
    sim.machine.set_access_budget(script.limits.max_bus_accesses);

    let metrics = Arc::new(PerformanceMetrics::new());
    sim.machine.add_observer(metrics.clone());

    notify_start(&sim);
    let outcome = execute_scenario(&mut sim, &script);
    notify_stop(&sim);

    let uart_text = uart_text(&uart);
    let stop_reason = outcome.stop_reason;

    let mut assertion_results = Vec::new();
    let mut all_passed = true;
    let mut expected_stop_reason_matched = false;

    for assertion in &script.assertions {
        let passed = evaluate(assertion, &sim, &uart_text, stop_reason);

        if matches!(assertion, ScenarioAssertion::ExpectedStopReason(_)) && passed {
            expected_stop_reason_matched = true;
        }

        if !passed {
            all_passed = false;
            error!(
                "Assertion failed: {:?} (uart len={}, toggles={}, period={} ms)",
                assertion,
                uart_text.len(),
                sim.rate_toggles(),
                sim.rate().period_ms()
            );
        }

        assertion_results.push(AssertionResult {
            assertion: assertion.clone(),
            passed,
        });
    }

    // Running out of iterations or time only passes when the script expects it.
    let stop_requires_assertion =
        matches!(stop_reason, StopReason::MaxIterations | StopReason::WallTime);
    let failed = !all_passed || (stop_requires_assertion && !expected_stop_reason_matched);
    let errored = outcome.sim_error && !expected_stop_reason_matched;

    let status = if failed {
        "fail"
    } else if errored {
        "error"
    } else {
        "pass"
    };
    info!(
        "Scenario {}: {:?} after {} iterations, {} cycles",
        status,
        stop_reason,
        sim.iterations(),
        sim.machine.total_cycles
    );

    let details = build_stop_reason_details(
        stop_reason,
        &script.limits,
        sim.iterations(),
        sim.machine.total_accesses,
        outcome.duration,
    );
    let result = TestResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: status.to_string(),
        iterations: sim.iterations(),
        cycles: metrics.get_cycles(),
        bus_accesses: metrics.get_accesses(),
        stop_reason,
        stop_reason_details: details,
        limits: script.limits.clone(),
        message: outcome.message,
        assertions: assertion_results,
        inputs_hash,
        config: TestConfig {
            system: system_path,
            script: args.script.clone(),
        },
    };
    write_outputs(&args, &result, &sim, &uart);

    if failed {
        ExitCode::from(EXIT_ASSERT_FAIL)
    } else if errored {
        ExitCode::from(EXIT_RUNTIME_ERROR)
    } else {
        ExitCode::from(EXIT_PASS)
    }
}

fn write_outputs(
    args: &TestArgs,
    result: &TestResult,
    sim: &BlinkySystem,
    uart: &Arc<Mutex<Vec<u8>>>,
) {
    let Some(output_dir) = &args.output_dir else {
        return;
    };
    if let Err(e) = std::fs::create_dir_all(output_dir) {
        error!("Failed to create output directory {:?}: {}", output_dir, e);
        return;
    }

    write_json(&output_dir.join("result.json"), result);

    let snapshot = Snapshot::Standard {
        board: Box::new(sim.snapshot()),
        iterations: result.iterations,
        stop_reason: result.stop_reason,
        stop_reason_details: result.stop_reason_details.clone(),
        limits: result.limits.clone(),
        inputs_hash: result.inputs_hash.clone(),
        config: result.config.clone(),
    };
    write_json(&output_dir.join("snapshot.json"), &snapshot);

    let bytes = uart.lock().map(|g| g.clone()).unwrap_or_default();
    if let Err(e) = std::fs::write(output_dir.join("uart.log"), bytes) {
        error!("Failed to write uart.log: {}", e);
    }
}

fn write_config_error_outputs(args: &TestArgs, system_path: Option<PathBuf>, message: String) {
    let Some(output_dir) = &args.output_dir else {
        return;
    };
    if let Err(e) = std::fs::create_dir_all(output_dir) {
        error!("Failed to create output directory {:?}: {}", output_dir, e);
        return;
    }

    let limits = ScenarioLimits {
        max_iterations: 0,
        max_bus_accesses: None,
        wall_time_ms: None,
    };
    let stop_reason = StopReason::ConfigError;
    let details = build_stop_reason_details(
        stop_reason,
        &limits,
        0,
        0,
        std::time::Duration::from_secs(0),
    );
    let config = TestConfig {
        system: system_path,
        script: args.script.clone(),
    };

    let result = TestResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: "error".to_string(),
        iterations: 0,
        cycles: 0,
        bus_accesses: 0,
        stop_reason,
        stop_reason_details: details.clone(),
        limits,
        message: Some(message.clone()),
        assertions: vec![],
        inputs_hash: String::new(),
        config: config.clone(),
    };
    write_json(&output_dir.join("result.json"), &result);

    let snapshot = Snapshot::ConfigError {
        message,
        stop_reason_details: details,
        config,
    };
    write_json(&output_dir.join("snapshot.json"), &snapshot);

    if let Err(e) = std::fs::write(output_dir.join("uart.log"), b"") {
        error!("Failed to write uart.log: {}", e);
    }
}
