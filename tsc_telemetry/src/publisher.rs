//! Length-prefixed JSON telemetry framing: a 4-byte little-endian length
//! followed by that many bytes of a JSON-encoded [`StatusSnapshot`].
//! JSON over bincode here (unlike the field bus) because telemetry
//! consumers are dashboards and log shippers, not another Rust process —
//! an undocumented wire format that's hard to eyeball over `nc` is the
//! wrong tradeoff for this channel.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use tracing::{debug, warn};
use tsc_common::telemetry::StatusSnapshot;

use crate::error::TelemetryError;

pub struct TelemetryPublisher<W: Write> {
    sink: W,
}

impl<W: Write> TelemetryPublisher<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    /// Write one length-prefixed JSON frame and flush it.
    pub fn publish(&mut self, snapshot: &StatusSnapshot) -> Result<(), TelemetryError> {
        let body = serde_json::to_vec(snapshot)?;
        let len = u32::try_from(body.len()).unwrap_or(u32::MAX);
        self.sink.write_all(&len.to_le_bytes())?;
        self.sink.write_all(&body)?;
        self.sink.flush()?;
        Ok(())
    }

    /// Run the adapter loop: one frame per [`StatusSnapshot`] received,
    /// until the core's sending end disconnects.
    pub fn run(mut self, rx: Receiver<StatusSnapshot>, heartbeat: Arc<AtomicU64>) {
        while let Ok(snapshot) = rx.recv() {
            heartbeat.fetch_add(1, Ordering::Relaxed);
            if let Err(e) = self.publish(&snapshot) {
                warn!("telemetry publish failed: {e}");
            }
        }
        debug!("telemetry publisher exiting, core channel closed");
    }
}

/// Read one length-prefixed JSON frame back out. The mirror image of
/// [`TelemetryPublisher::publish`], used by the standalone harness and
/// by tests; a downstream consumer in another language would do the
/// same two reads (length, then body).
pub fn read_frame<R: Read>(reader: &mut R) -> Result<StatusSnapshot, TelemetryError> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    Ok(serde_json::from_slice(&body)?)
}
