//! TSC Common Library
//!
//! Shared data model, ambient config-loading machinery, and wire contracts
//! for every crate in the traffic signal controller workspace.
//!
//! # Module Structure
//!
//! - [`model`] - Phase/Ring/Barrier/call-source domain types
//! - [`bus`] - Field bus wire contracts (outbound/inbound frames)
//! - [`telemetry`] - Telemetry status snapshot
//! - [`config`] - Ambient TOML config-loading traits
//! - [`watchdog`] - Adapter-thread supervision contract
//! - [`consts`] - System-wide numeric constants
//! - [`prelude`] - Common re-exports for convenience

pub mod bus;
pub mod config;
pub mod consts;
pub mod model;
pub mod prelude;
pub mod telemetry;
pub mod watchdog;
