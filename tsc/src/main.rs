//! # Actuated Traffic Signal Controller
//!
//! CLI entry point, process wiring, and graceful shutdown for the
//! ring-and-barrier phase controller. Owns real tick pacing and the
//! adapter threads (field bus, telemetry); `tsc_core` is a pure,
//! single-threaded library this binary drives.
//!
//! # Usage
//!
//! ```bash
//! tsc --config /etc/tsc/intersection.toml
//! tsc -c intersection.toml -v --telemetry-out /var/log/tsc/telemetry.bin
//! ```

#![deny(warnings)]

mod rt;
mod supervisor;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use tsc_bus::LinkFaults;
use tsc_common::bus::InboundFrame;
use tsc_common::model::ControlMode;
use tsc_common::watchdog::{HealthStatus, ManagedModule, Watchdog};
use tsc_core::config::ControllerConfig;
use tsc_core::runtime::ControllerRuntime;

use crate::supervisor::{BusSpawnParams, Supervisor};

/// Actuated traffic signal controller: ring-and-barrier phase scheduler.
#[derive(Parser, Debug)]
#[command(name = "tsc")]
#[command(version)]
#[command(about = "Actuated traffic signal controller")]
struct Args {
    /// Path to the intersection configuration file.
    #[arg(short, long, default_value = tsc_common::consts::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Where the telemetry publisher writes its length-prefixed JSON stream.
    #[arg(long, default_value = "/var/log/tsc/telemetry.bin")]
    telemetry_out: PathBuf,

    /// Probability a field bus frame is dropped, for fault-injection testing.
    #[arg(long, default_value_t = 0.0)]
    bus_drop_rate: f64,

    /// Probability a field bus frame is corrupted, for fault-injection testing.
    #[arg(long, default_value_t = 0.0)]
    bus_corrupt_rate: f64,

    /// Seed for the simulated bus link and synthetic field input.
    #[arg(long, default_value_t = 1)]
    bus_seed: u64,

    /// Minimum log level: error, warn, info, debug, or trace.
    #[arg(long, default_value = "info")]
    log_level: Level,

    /// Emit structured JSON logs instead of plain text.
    #[arg(long)]
    json_logs: bool,

    /// CPU core to pin the tick loop to (requires the `rt` build feature).
    #[arg(long, default_value_t = 0)]
    cpu_core: usize,

    /// SCHED_FIFO priority for the tick loop (requires the `rt` build feature).
    #[arg(long, default_value_t = 0)]
    rt_priority: i32,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    if let Err(e) = run(&args) {
        error!("controller exited with error: {e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    info!("tsc v{} starting", env!("CARGO_PKG_VERSION"));

    rt::rt_setup(args.cpu_core, args.rt_priority)?;

    let config = ControllerConfig::load(&args.config)?;
    let total_input_bits = config.phases.len() + config.inputs.len();
    let tick_duration = Duration::from_secs_f64(config.tick_size_s);

    let mut runtime = ControllerRuntime::new(config.clone());

    let mut supervisor = Supervisor::new(
        BusSpawnParams {
            detector_bit_count: config.phases.len(),
            total_input_bits,
            faults: LinkFaults {
                drop_rate: args.bus_drop_rate,
                corrupt_rate: args.bus_corrupt_rate,
            },
            seed: args.bus_seed,
        },
        args.telemetry_out.clone(),
    );
    supervisor.spawn(ManagedModule::Bus)?;
    supervisor.spawn(ManagedModule::Telemetry)?;

    let shutdown_requested = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown_requested);
    ctrlc::set_handler(move || {
        info!("shutdown signal received");
        shutdown_flag.store(true, Ordering::SeqCst);
    })?;

    let bus_outbound_tx = supervisor
        .bus_outbound_tx
        .take()
        .ok_or("bus adapter did not register an outbound channel")?;
    let bus_inbound_rx = supervisor
        .bus_inbound_rx
        .take()
        .ok_or("bus adapter did not register an inbound channel")?;
    let telemetry_tx = supervisor.telemetry_tx.take();

    let mut inbound = InboundFrame::with_input_count(total_input_bits);
    let mut tick_count: u64 = 0;
    let mut cxt_requested = false;
    let mut off_requested = false;

    // Paced by a fixed deadline schedule, not a sleep-after-work loop: if a
    // tick overruns, the next iterations run back-to-back with no sleep
    // until the schedule is caught up, but the loop never sleeps a negative
    // amount (never runs ahead of wall time).
    let run_start = Instant::now();
    let mut next_deadline = run_start + tick_duration;

    'outer: loop {
        loop {
            if shutdown_requested.load(Ordering::SeqCst) && !cxt_requested {
                info!("entering control-exit transition");
                runtime.request_mode(ControlMode::Cxt);
                cxt_requested = true;
            }

            let (outbound, snapshot) = match runtime.tick(&inbound) {
                Ok(pair) => pair,
                Err(e) => {
                    error!("controller runtime error, halting: {e}");
                    break 'outer;
                }
            };

            if bus_outbound_tx.send(outbound).is_err() {
                error!("bus adapter channel closed, halting");
                break 'outer;
            }
            match bus_inbound_rx.recv() {
                Ok(outcome) => {
                    runtime.record_bus_outcome(outcome.tx_ok);
                    inbound = outcome.inbound;
                }
                Err(_) => {
                    error!("bus adapter channel closed, halting");
                    break 'outer;
                }
            }

            if let Some(tx) = &telemetry_tx {
                let _ = tx.send(snapshot);
            }

            if tick_count % 50 == 0 {
                check_adapter_health(&supervisor);
            }

            if off_requested && runtime.mode() == ControlMode::Off {
                info!("final dark-output frame sent, shutting down");
                break 'outer;
            }

            if cxt_requested && !off_requested && runtime.mode() == ControlMode::LsFlash {
                info!("control-exit transition complete, requesting final dark-output frame");
                runtime.request_mode(ControlMode::Off);
                off_requested = true;
            }

            tick_count += 1;
            next_deadline += tick_duration;

            if Instant::now() >= next_deadline {
                warn!("tick {} overran budget, catching up without sleep", tick_count);
                continue;
            }
            break;
        }

        let remaining = next_deadline.saturating_duration_since(Instant::now());
        std::thread::sleep(remaining);
    }

    supervisor.shutdown_all()?;
    info!("tsc shutdown complete after {} ticks", tick_count);
    Ok(())
}

fn check_adapter_health(supervisor: &Supervisor) {
    for module in [ManagedModule::Bus, ManagedModule::Telemetry] {
        match supervisor.health_check(module) {
            HealthStatus::Healthy | HealthStatus::Unknown => {}
            HealthStatus::Stale { age_ticks } => {
                warn!("{module:?} adapter heartbeat stale for {age_ticks} polls")
            }
            HealthStatus::Dead => warn!("{module:?} adapter thread has exited"),
        }
    }
}

fn setup_tracing(args: &Args) {
    let filter = EnvFilter::from_default_env().add_directive(args.log_level.into());
    if args.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
