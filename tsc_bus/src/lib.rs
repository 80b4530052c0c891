//! # Field Bus Adapter
//!
//! Simulated HDLC-style framing over an in-process channel, standing in
//! for the serial transceiver that would otherwise carry load-switch
//! commands out to the cabinet and detector/pushbutton levels back in.
//!
//! The controller core exchanges [`tsc_common::bus::OutboundFrame`] /
//! [`tsc_common::bus::InboundFrame`] values with whatever adapter is
//! wired in; it never touches framing, transport, or field simulation
//! directly. This crate owns all three.
//!
//! ## Module Structure
//!
//! - [`frame`] — flag-delimited, byte-stuffed, checksummed framing
//! - [`transport`] — a deterministic fault-injecting simulated serial link
//! - [`field`] — synthetic detector/pushbutton actuation for dev and test
//! - [`adapter`] — the adapter thread: core channel in, simulated bus out

pub mod adapter;
pub mod error;
pub mod field;
pub mod frame;
pub mod transport;

pub use adapter::{BusAdapter, BusAdapterConfig, BusOutcome};
pub use error::BusError;
pub use field::FieldProfile;
pub use transport::LinkFaults;
