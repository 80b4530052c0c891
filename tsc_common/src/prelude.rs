//! Convenient re-exports: `use tsc_common::prelude::*;`

// ─── Logging / configuration ────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};

// ─── Domain model ────────────────────────────────────────────────────
pub use crate::model::{
    Barrier, CallSource, ControlMode, FlashMode, LoadSwitchOutput, Phase, PhaseState,
    PhaseStatus, PhaseTiming, Ring,
};

// ─── Wire contracts ──────────────────────────────────────────────────
pub use crate::bus::{InboundFrame, OutboundFrame};
pub use crate::telemetry::{LoadSwitchTelemetry, PhaseTelemetry, StateFlags, StatusSnapshot};

// ─── System constants ────────────────────────────────────────────────
pub use crate::consts::{BARRIER_COUNT, CONFIG_SCHEMA_VERSION, MAX_PHASES, RING_COUNT};
