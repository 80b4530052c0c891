//! # Telemetry Publisher — standalone harness
//!
//! Publishes a synthetic stream of status snapshots to a file (or
//! stdout) so the wire format can be inspected or fed to a downstream
//! dashboard prototype without running the full controller. The `tsc`
//! binary links this crate directly rather than shelling out to this
//! binary.
//!
//! # Usage
//!
//! ```bash
//! tsc_telemetry --ticks 50 --output snapshots.bin
//! ```

#![deny(warnings)]

use std::fs::File;
use std::io::{stdout, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;
use tsc_common::model::ControlMode;
use tsc_common::telemetry::{StateFlags, StatusSnapshot};
use tsc_telemetry::TelemetryPublisher;

/// Standalone harness for the telemetry publisher.
#[derive(Parser, Debug)]
#[command(name = "tsc_telemetry")]
#[command(version)]
#[command(about = "Synthetic status snapshot publisher")]
struct Args {
    /// Number of synthetic ticks to publish.
    #[arg(long, default_value_t = 50)]
    ticks: u64,

    /// Output path for the length-prefixed JSON stream; stdout if omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    info!("telemetry publisher harness starting ({} ticks)", args.ticks);

    let mut sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(stdout()),
    };

    for tick in 0..args.ticks {
        let snapshot = synthetic_snapshot(tick);
        let mut publisher = TelemetryPublisher::new(&mut sink);
        publisher.publish(&snapshot)?;
    }

    info!("telemetry publisher harness done");
    Ok(())
}

fn synthetic_snapshot(tick: u64) -> StatusSnapshot {
    StatusSnapshot {
        mode: ControlMode::Normal,
        state_flags: StateFlags::default(),
        plan_id: 0,
        avg_demand: 0.0,
        peek_demand: 0.0,
        runtime: tick as f64 * 0.1,
        control_time: tick,
        transfer_count: 0,
        phases: vec![],
        load_switches: vec![],
    }
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
