//! # Field Bus Adapter — standalone harness
//!
//! Runs the bus adapter against a synthetic stream of outbound frames
//! and logs each exchange. Useful for exercising framing and fault
//! injection in isolation from the rest of the controller; the `tsc`
//! binary links this crate directly rather than shelling out to this
//! binary.
//!
//! # Usage
//!
//! ```bash
//! tsc_bus --ticks 200 --drop-rate 0.02 --corrupt-rate 0.01
//! ```

#![deny(warnings)]

use clap::Parser;
use std::sync::atomic::AtomicU64;
use std::sync::mpsc;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;
use tsc_bus::adapter::{BusAdapter, BusAdapterConfig};
use tsc_bus::{FieldProfile, LinkFaults};
use tsc_common::bus::OutboundFrame;
use tsc_common::model::LoadSwitchOutput;

/// Standalone harness for the field bus adapter.
#[derive(Parser, Debug)]
#[command(name = "tsc_bus")]
#[command(version)]
#[command(about = "Simulated field bus adapter harness")]
struct Args {
    /// Number of synthetic ticks to exchange before exiting.
    #[arg(long, default_value_t = 100)]
    ticks: u64,

    /// Probability a transmitted frame is dropped in transit.
    #[arg(long, default_value_t = 0.0)]
    drop_rate: f64,

    /// Probability a transmitted frame arrives with a flipped bit.
    #[arg(long, default_value_t = 0.0)]
    corrupt_rate: f64,

    /// Per-tick probability a quiet detector receives a synthetic arrival.
    #[arg(long, default_value_t = 0.05)]
    arrival_rate: f64,

    /// Deterministic seed for fault injection and field simulation.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("field bus adapter harness starting ({} ticks)", args.ticks);

    let config = BusAdapterConfig {
        detector_bit_count: 8,
        total_input_bits: 12,
        faults: LinkFaults {
            drop_rate: args.drop_rate,
            corrupt_rate: args.corrupt_rate,
        },
        field: FieldProfile {
            arrival_rate: args.arrival_rate,
            dwell_ticks: 10,
        },
        seed: args.seed,
    };

    let heartbeat = Arc::new(AtomicU64::new(0));
    let adapter = BusAdapter::new(config, heartbeat);
    let (outbound_tx, outbound_rx) = mpsc::channel::<OutboundFrame>();
    let (inbound_tx, inbound_rx) = mpsc::channel();

    let worker = std::thread::spawn(move || adapter.run(outbound_rx, inbound_tx));

    for tick in 0..args.ticks {
        let outbound = OutboundFrame {
            control_time_ticks: tick,
            switches: vec![LoadSwitchOutput::DARK],
        };
        if outbound_tx.send(outbound).is_err() {
            break;
        }
        match inbound_rx.recv() {
            Ok(outcome) => {
                if tick % 20 == 0 {
                    info!(
                        tick,
                        tx_ok = outcome.tx_ok,
                        detectors_up = outcome.inbound.levels.iter().filter(|&&l| l).count(),
                        "exchange"
                    );
                }
            }
            Err(_) => break,
        }
    }

    drop(outbound_tx);
    let _ = worker.join();
    info!("field bus adapter harness done");
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
