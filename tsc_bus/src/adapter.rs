//! Field bus adapter thread: the `tsc` binary's view of the cabinet's
//! serial field bus, running on its own OS thread and talking to the
//! controller core only through the channels passed into [`BusAdapter::run`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;

use tracing::{debug, warn};
use tsc_common::bus::{InboundFrame, OutboundFrame};

use crate::error::BusError;
use crate::field::{FieldProfile, SimulatedField};
use crate::frame;
use crate::transport::{Delivery, LinkFaults, SimulatedLink};

/// Result of one outbound/inbound exchange over the bus.
#[derive(Debug, Clone)]
pub struct BusOutcome {
    /// Whether the outbound frame was delivered intact.
    pub tx_ok: bool,
    /// The cabinet's current inputs, valid regardless of `tx_ok` (the
    /// input side is a logically independent half-duplex exchange).
    pub inbound: InboundFrame,
}

pub struct BusAdapterConfig {
    pub detector_bit_count: usize,
    pub total_input_bits: usize,
    pub faults: LinkFaults,
    pub field: FieldProfile,
    pub seed: u64,
}

pub struct BusAdapter {
    outbound_link: SimulatedLink,
    inbound_link: SimulatedLink,
    field: SimulatedField,
    detector_bit_count: usize,
    heartbeat: Arc<AtomicU64>,
}

impl BusAdapter {
    pub fn new(config: BusAdapterConfig, heartbeat: Arc<AtomicU64>) -> Self {
        Self {
            outbound_link: SimulatedLink::new(config.faults, config.seed),
            inbound_link: SimulatedLink::new(config.faults, config.seed.wrapping_add(1)),
            field: SimulatedField::new(config.field, config.total_input_bits, config.seed.wrapping_add(2)),
            detector_bit_count: config.detector_bit_count,
            heartbeat,
        }
    }

    /// Drive one outbound/inbound exchange. Exposed separately from
    /// [`Self::run`] so tests can step it without threads or channels.
    pub fn exchange(&mut self, outbound: &OutboundFrame) -> Result<BusOutcome, BusError> {
        let tx_ok = self.send_outbound(outbound)?;
        let inbound = self.poll_inbound(outbound.control_time_ticks)?;
        Ok(BusOutcome { tx_ok, inbound })
    }

    fn send_outbound(&mut self, outbound: &OutboundFrame) -> Result<bool, BusError> {
        let payload =
            bincode::serialize(outbound).map_err(|e| BusError::Encode(e.to_string()))?;
        let framed = frame::encode(&payload);
        match self.outbound_link.transmit(&framed) {
            Delivery::Dropped => {
                warn!("outbound frame dropped in transit");
                Ok(false)
            }
            Delivery::Corrupted(bytes) => match frame::decode(&bytes) {
                Ok(_) => Ok(true), // corruption happened to leave the checksum valid
                Err(e) => {
                    warn!("outbound frame corrupted: {e}");
                    Ok(false)
                }
            },
            Delivery::Delivered(bytes) => {
                frame::decode(&bytes).map_err(|e| BusError::Decode(e.to_string()))?;
                Ok(true)
            }
        }
    }

    fn poll_inbound(&mut self, control_time_ticks: u64) -> Result<InboundFrame, BusError> {
        let frame_in = self.field.tick(control_time_ticks, self.detector_bit_count);
        let payload = bincode::serialize(&frame_in).map_err(|e| BusError::Encode(e.to_string()))?;
        let framed = frame::encode(&payload);

        let delivered_bytes = match self.inbound_link.transmit(&framed) {
            Delivery::Dropped => {
                debug!("inbound frame dropped, holding last known field state");
                return Ok(frame_in);
            }
            Delivery::Corrupted(bytes) | Delivery::Delivered(bytes) => bytes,
        };

        match frame::decode(&delivered_bytes)
            .ok()
            .and_then(|p| bincode::deserialize::<InboundFrame>(&p).ok())
        {
            Some(decoded) => Ok(decoded),
            None => {
                warn!("inbound frame corrupted, holding last known field state");
                Ok(frame_in)
            }
        }
    }

    /// Run the adapter loop until `rx` disconnects. One [`OutboundFrame`]
    /// in, one [`BusOutcome`] out, per core tick.
    pub fn run(mut self, rx: Receiver<OutboundFrame>, tx: Sender<BusOutcome>) {
        while let Ok(outbound) = rx.recv() {
            self.heartbeat.fetch_add(1, Ordering::Relaxed);
            match self.exchange(&outbound) {
                Ok(outcome) => {
                    if tx.send(outcome).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("bus exchange failed: {e}");
                    let fallback = BusOutcome {
                        tx_ok: false,
                        inbound: InboundFrame::with_input_count(0),
                    };
                    if tx.send(fallback).is_err() {
                        break;
                    }
                }
            }
        }
        debug!("bus adapter thread exiting, core channel closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsc_common::model::LoadSwitchOutput;

    fn config(faults: LinkFaults) -> BusAdapterConfig {
        BusAdapterConfig {
            detector_bit_count: 4,
            total_input_bits: 6,
            faults,
            field: FieldProfile::default(),
            seed: 99,
        }
    }

    #[test]
    fn clean_link_always_delivers() {
        let mut adapter = BusAdapter::new(config(LinkFaults::default()), Arc::new(AtomicU64::new(0)));
        let outbound = OutboundFrame {
            control_time_ticks: 5,
            switches: vec![LoadSwitchOutput::DARK],
        };
        let outcome = adapter.exchange(&outbound).unwrap();
        assert!(outcome.tx_ok);
        assert_eq!(outcome.inbound.levels.len(), 6);
    }

    #[test]
    fn fully_dropped_link_reports_failure() {
        let faults = LinkFaults {
            drop_rate: 1.0,
            corrupt_rate: 0.0,
        };
        let mut adapter = BusAdapter::new(config(faults), Arc::new(AtomicU64::new(0)));
        let outbound = OutboundFrame {
            control_time_ticks: 1,
            switches: vec![],
        };
        let outcome = adapter.exchange(&outbound).unwrap();
        assert!(!outcome.tx_ok);
    }
}
