//! The structured status record published once per tick over the telemetry
//! channel. Serialized as length-prefixed JSON by [`tsc_telemetry`].

use crate::model::{ControlMode, LoadSwitchOutput, PhaseState, PhaseStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTelemetry {
    pub id: u8,
    pub status: PhaseStatus,
    pub state: PhaseState,
    pub ped_service: bool,
    /// Current elapsed value of the active interval, in seconds.
    pub time_lower: f64,
    /// Target (configured) value of the active interval, in seconds.
    pub time_upper: f64,
    pub detections: u32,
    pub vehicle_calls: u32,
    pub ped_calls: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadSwitchTelemetry {
    pub id: u16,
    pub output: LoadSwitchOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateFlags {
    pub bus_fault: bool,
    pub time_freeze: bool,
    pub tech_flash: bool,
    pub scheduler_fault: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub mode: ControlMode,
    pub state_flags: StateFlags,
    pub plan_id: u32,
    pub avg_demand: f64,
    /// Named `peek_demand` on the wire, matching the repository's own
    /// schema field name verbatim (not a local typo).
    pub peek_demand: f64,
    pub runtime: f64,
    pub control_time: u64,
    pub transfer_count: u32,
    pub phases: Vec<PhaseTelemetry>,
    pub load_switches: Vec<LoadSwitchTelemetry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_snapshot_serializes_to_json() {
        let snap = StatusSnapshot {
            mode: ControlMode::Normal,
            state_flags: StateFlags::default(),
            plan_id: 1,
            avg_demand: 0.0,
            peek_demand: 0.0,
            runtime: 0.0,
            control_time: 0,
            transfer_count: 0,
            phases: vec![],
            load_switches: vec![],
        };
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("\"normal\""));
    }
}
