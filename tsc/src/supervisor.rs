//! Adapter thread supervision: spawns the bus and telemetry adapters on
//! their own OS threads, wires their channels to the main tick loop, and
//! implements [`tsc_common::watchdog::Watchdog`] so a stalled or dead
//! adapter is visible to the loop instead of silently starving it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::info;
use tsc_bus::adapter::{BusAdapter, BusAdapterConfig, BusOutcome};
use tsc_bus::LinkFaults;
use tsc_common::bus::OutboundFrame;
use tsc_common::telemetry::StatusSnapshot;
use tsc_common::watchdog::{HealthStatus, ManagedModule, Watchdog, WatchdogError};
use tsc_telemetry::TelemetryPublisher;

/// Parameters needed to spawn the bus adapter; mirrors the subset of
/// [`tsc_core::config::ControllerConfig`] the adapter needs without
/// taking a dependency on `tsc_core` from this module.
pub struct BusSpawnParams {
    pub detector_bit_count: usize,
    pub total_input_bits: usize,
    pub faults: LinkFaults,
    pub seed: u64,
}

struct Staleness {
    last_count: u64,
    unchanged_polls: u32,
}

pub struct Supervisor {
    bus_params: BusSpawnParams,
    telemetry_sink: std::path::PathBuf,

    bus_heartbeat: Arc<AtomicU64>,
    telemetry_heartbeat: Arc<AtomicU64>,
    staleness: Mutex<HashMap<ManagedModule, Staleness>>,

    bus_handle: Option<JoinHandle<()>>,
    telemetry_handle: Option<JoinHandle<()>>,

    pub bus_outbound_tx: Option<Sender<OutboundFrame>>,
    pub bus_inbound_rx: Option<Receiver<BusOutcome>>,
    pub telemetry_tx: Option<Sender<StatusSnapshot>>,
}

impl Supervisor {
    pub fn new(bus_params: BusSpawnParams, telemetry_sink: std::path::PathBuf) -> Self {
        Self {
            bus_params,
            telemetry_sink,
            bus_heartbeat: Arc::new(AtomicU64::new(0)),
            telemetry_heartbeat: Arc::new(AtomicU64::new(0)),
            staleness: Mutex::new(HashMap::new()),
            bus_handle: None,
            telemetry_handle: None,
            bus_outbound_tx: None,
            bus_inbound_rx: None,
            telemetry_tx: None,
        }
    }

    fn heartbeat_of(&self, module: ManagedModule) -> &Arc<AtomicU64> {
        match module {
            ManagedModule::Bus => &self.bus_heartbeat,
            ManagedModule::Telemetry => &self.telemetry_heartbeat,
        }
    }

    fn handle_finished(&self, module: ManagedModule) -> Option<bool> {
        match module {
            ManagedModule::Bus => self.bus_handle.as_ref().map(|h| h.is_finished()),
            ManagedModule::Telemetry => self.telemetry_handle.as_ref().map(|h| h.is_finished()),
        }
    }
}

impl Default for Staleness {
    fn default() -> Self {
        Self {
            last_count: 0,
            unchanged_polls: 0,
        }
    }
}

impl Watchdog for Supervisor {
    fn spawn(&mut self, module: ManagedModule) -> Result<(), WatchdogError> {
        match module {
            ManagedModule::Bus => {
                let config = BusAdapterConfig {
                    detector_bit_count: self.bus_params.detector_bit_count,
                    total_input_bits: self.bus_params.total_input_bits,
                    faults: self.bus_params.faults,
                    field: tsc_bus::FieldProfile::default(),
                    seed: self.bus_params.seed,
                };
                let adapter = BusAdapter::new(config, Arc::clone(&self.bus_heartbeat));
                let (outbound_tx, outbound_rx) = mpsc::channel::<OutboundFrame>();
                let (inbound_tx, inbound_rx) = mpsc::channel::<BusOutcome>();

                let handle = std::thread::Builder::new()
                    .name("tsc-bus".into())
                    .spawn(move || adapter.run(outbound_rx, inbound_tx))
                    .map_err(|e| WatchdogError::SpawnFailed {
                        module,
                        reason: e.to_string(),
                    })?;

                self.bus_handle = Some(handle);
                self.bus_outbound_tx = Some(outbound_tx);
                self.bus_inbound_rx = Some(inbound_rx);
                info!("bus adapter thread spawned");
            }
            ManagedModule::Telemetry => {
                let sink_path = self.telemetry_sink.clone();
                let heartbeat = Arc::clone(&self.telemetry_heartbeat);
                let (tx, rx) = mpsc::channel::<StatusSnapshot>();

                let handle = std::thread::Builder::new()
                    .name("tsc-telemetry".into())
                    .spawn(move || {
                        let file = match std::fs::File::create(&sink_path) {
                            Ok(f) => f,
                            Err(e) => {
                                tracing::error!("telemetry sink unavailable: {e}");
                                return;
                            }
                        };
                        TelemetryPublisher::new(file).run(rx, heartbeat);
                    })
                    .map_err(|e| WatchdogError::SpawnFailed {
                        module,
                        reason: e.to_string(),
                    })?;

                self.telemetry_handle = Some(handle);
                self.telemetry_tx = Some(tx);
                info!("telemetry publisher thread spawned");
            }
        }
        self.staleness.lock().unwrap().insert(
            module,
            Staleness {
                last_count: 0,
                unchanged_polls: 0,
            },
        );
        Ok(())
    }

    fn health_check(&self, module: ManagedModule) -> HealthStatus {
        let Some(finished) = self.handle_finished(module) else {
            return HealthStatus::Unknown;
        };
        if finished {
            return HealthStatus::Dead;
        }

        let current = self.heartbeat_of(module).load(Ordering::Relaxed);
        let mut staleness = self.staleness.lock().unwrap();
        let entry = staleness.entry(module).or_default();

        if current != entry.last_count {
            entry.last_count = current;
            entry.unchanged_polls = 0;
            HealthStatus::Healthy
        } else {
            entry.unchanged_polls += 1;
            if entry.unchanged_polls <= 1 {
                HealthStatus::Healthy
            } else {
                HealthStatus::Stale {
                    age_ticks: u64::from(entry.unchanged_polls),
                }
            }
        }
    }

    fn shutdown_all(&mut self) -> Result<(), WatchdogError> {
        self.bus_outbound_tx.take();
        self.telemetry_tx.take();
        if let Some(handle) = self.bus_handle.take() {
            handle
                .join()
                .map_err(|_| WatchdogError::Other("bus adapter thread panicked".into()))?;
        }
        if let Some(handle) = self.telemetry_handle.take() {
            handle
                .join()
                .map_err(|_| WatchdogError::Other("telemetry publisher thread panicked".into()))?;
        }
        Ok(())
    }
}
