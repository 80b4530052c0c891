//! # Telemetry Publisher
//!
//! Publishes one length-prefixed JSON [`tsc_common::telemetry::StatusSnapshot`]
//! per control tick. Runs as its own adapter thread inside the
//! `tsc` binary, receiving snapshots over a channel from the controller
//! core — the core never touches the sink directly.

pub mod error;
pub mod publisher;

pub use error::TelemetryError;
pub use publisher::{read_frame, TelemetryPublisher};
