//! System-wide constants for the traffic signal controller workspace.
//!
//! Single source of truth for numeric limits and default paths. Imported by
//! all crates — no duplication permitted.

/// Maximum number of phases a ring-and-barrier plan may define.
pub const MAX_PHASES: usize = 16;

/// Number of rings (fixed by the dual-ring NEMA-style topology).
pub const RING_COUNT: usize = 2;

/// Number of phases per ring.
pub const PHASES_PER_RING: usize = 4;

/// Number of barriers (fixed alongside `RING_COUNT`).
pub const BARRIER_COUNT: usize = 2;

/// Maximum number of load switches (one per phase, vehicle + optional ped).
pub const MAX_LOAD_SWITCHES: usize = MAX_PHASES * 2;

/// Maximum number of configured discrete inputs.
pub const MAX_INPUTS: usize = 64;

/// Default tick size in seconds (100 ms).
pub const DEFAULT_TICK_SIZE_S: f64 = 0.1;

/// Minimum allowed tick size in seconds.
pub const MIN_TICK_SIZE_S: f64 = 0.01;

/// Maximum allowed tick size in seconds.
pub const MAX_TICK_SIZE_S: f64 = 1.0;

/// Upper bound on any configured timing interval, in seconds.
pub const MAX_TIMING_S: f64 = 300.0;

/// Upper bound on a call's configured weight.
pub const MAX_CALL_WEIGHT: f64 = 1000.0;

/// Upper bound on a call's age before it is dropped, in seconds.
pub const MAX_CALL_AGE_S: f64 = 3600.0;

/// Schema version this workspace understands.
pub const CONFIG_SCHEMA_VERSION: u32 = 4;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/tsc/controller.toml";
