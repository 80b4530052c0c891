//! Shared data model for the ring-and-barrier phase controller.
//!
//! These types are the vocabulary every crate in the workspace speaks: the
//! core scheduler and state machines, the config schema, the bus wire
//! frames, and the telemetry snapshot all build on the enums and records
//! defined here.

use serde::{Deserialize, Serialize};

/// Ordered phase state. Discriminants intentionally leave numeric gaps so a
/// future intermediate state can be inserted without renumbering anything
/// that has already encoded a `PhaseState` on the wire.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PhaseState {
    Stop = 0,
    MinStop = 2,
    Rclr = 4,
    Caution = 6,
    Extend = 8,
    Go = 10,
    Pclr = 12,
    Walk = 14,
    Fya = 16,
}

impl PhaseState {
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Stop),
            2 => Some(Self::MinStop),
            4 => Some(Self::Rclr),
            6 => Some(Self::Caution),
            8 => Some(Self::Extend),
            10 => Some(Self::Go),
            12 => Some(Self::Pclr),
            14 => Some(Self::Walk),
            16 => Some(Self::Fya),
            _ => None,
        }
    }

    /// Vehicle-serving green states.
    #[inline]
    pub const fn is_vehicle_green(self) -> bool {
        matches!(self, Self::Go | Self::Extend)
    }

    /// Vehicle or pedestrian clearance states.
    #[inline]
    pub const fn is_clearance(self) -> bool {
        matches!(self, Self::Caution | Self::Rclr | Self::Pclr)
    }

    /// Pedestrian-serving states.
    #[inline]
    pub const fn is_pedestrian_serving(self) -> bool {
        matches!(self, Self::Walk | Self::Pclr)
    }

    /// True when the phase holds the intersection (occupies its barrier).
    #[inline]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Stop | Self::MinStop)
    }
}

impl Default for PhaseState {
    fn default() -> Self {
        Self::Stop
    }
}

/// Scheduler-assigned role a phase currently plays within its ring.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseStatus {
    Inactive = 0,
    Next = 1,
    Leader = 2,
    Secondary = 3,
}

impl PhaseStatus {
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Inactive),
            1 => Some(Self::Next),
            2 => Some(Self::Leader),
            3 => Some(Self::Secondary),
            _ => None,
        }
    }
}

impl Default for PhaseStatus {
    fn default() -> Self {
        Self::Inactive
    }
}

/// Flash color a phase's vehicle head shows while in `LS_FLASH` or `CET`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashMode {
    Red = 0,
    Yellow = 1,
}

impl FlashMode {
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Red),
            1 => Some(Self::Yellow),
            _ => None,
        }
    }
}

impl Default for FlashMode {
    fn default() -> Self {
        Self::Red
    }
}

/// Process-wide control mode.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    Off = 0,
    Cet = 1,
    Cxt = 2,
    LsFlash = 3,
    Normal = 4,
}

impl ControlMode {
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Off),
            1 => Some(Self::Cet),
            2 => Some(Self::Cxt),
            3 => Some(Self::LsFlash),
            4 => Some(Self::Normal),
            _ => None,
        }
    }

    /// True while state machines must be held at `STOP` and outputs forced.
    #[inline]
    pub const fn suppresses_service(self) -> bool {
        matches!(self, Self::Off | Self::Cet | Self::LsFlash | Self::Cxt)
    }
}

impl Default for ControlMode {
    fn default() -> Self {
        Self::Off
    }
}

/// Origin of a call placed on the call queue.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallSource {
    Detector = 0,
    RecallMaintained = 1,
    RecallLatched = 2,
    Random = 3,
    System = 4,
}

impl CallSource {
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Detector),
            1 => Some(Self::RecallMaintained),
            2 => Some(Self::RecallLatched),
            3 => Some(Self::Random),
            4 => Some(Self::System),
            _ => None,
        }
    }
}

/// Per-phase configured interval durations, in seconds.
///
/// `min_stop` defaults to zero (no lockout) when absent from configuration,
/// per schema version 4.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseTiming {
    #[serde(default)]
    pub min_stop: f64,
    #[serde(default = "default_rclr")]
    pub rclr: f64,
    #[serde(default = "default_caution")]
    pub caution: f64,
    #[serde(default = "default_extend")]
    pub extend: f64,
    #[serde(default = "default_go")]
    pub go: f64,
    #[serde(default = "default_pclr")]
    pub pclr: f64,
    #[serde(default = "default_walk")]
    pub walk: f64,
    #[serde(default = "default_max_go")]
    pub max_go: f64,
}

fn default_rclr() -> f64 {
    1.0
}
fn default_caution() -> f64 {
    3.5
}
fn default_extend() -> f64 {
    3.0
}
fn default_go() -> f64 {
    8.0
}
fn default_pclr() -> f64 {
    10.0
}
fn default_walk() -> f64 {
    7.0
}
fn default_max_go() -> f64 {
    60.0
}

impl Default for PhaseTiming {
    fn default() -> Self {
        Self {
            min_stop: 0.0,
            rclr: default_rclr(),
            caution: default_caution(),
            extend: default_extend(),
            go: default_go(),
            pclr: default_pclr(),
            walk: default_walk(),
            max_go: default_max_go(),
        }
    }
}

impl PhaseTiming {
    pub fn validate(&self) -> Result<(), String> {
        let checks: [(&str, f64); 7] = [
            ("min_stop", self.min_stop),
            ("rclr", self.rclr),
            ("caution", self.caution),
            ("extend", self.extend),
            ("go", self.go),
            ("pclr", self.pclr),
            ("walk", self.walk),
        ];
        for (name, v) in checks {
            if v < 0.0 {
                return Err(format!("timing.{name}={v} must be >= 0"));
            }
        }
        if self.max_go < self.go {
            return Err(format!(
                "timing.max_go={} must be >= timing.go={}",
                self.max_go, self.go
            ));
        }
        Ok(())
    }
}

/// Identity and configuration of one signal phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub id: u8,
    #[serde(default)]
    pub flash_mode: FlashMode,
    pub vehicle_switch: u16,
    #[serde(default)]
    pub ped_switch: Option<u16>,
    pub timing: PhaseTiming,
}

impl Phase {
    #[inline]
    pub const fn is_pedestrian_capable(&self) -> bool {
        self.ped_switch.is_some()
    }
}

/// An ordered sequence of phase ids; rotation wraps at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ring {
    pub phases: Vec<u8>,
}

impl Ring {
    /// The phase id that follows `current` in ring order, wrapping.
    pub fn next_after(&self, current: u8) -> Option<u8> {
        let pos = self.phases.iter().position(|&p| p == current)?;
        Some(self.phases[(pos + 1) % self.phases.len()])
    }
}

/// An unordered set of phase ids permitted to run concurrently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Barrier {
    pub phases: Vec<u8>,
}

impl Barrier {
    #[inline]
    pub fn contains(&self, phase: u8) -> bool {
        self.phases.contains(&phase)
    }
}

/// Three-lamp (or three-indication) load-switch output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoadSwitchOutput {
    pub a: bool,
    pub b: bool,
    pub c: bool,
}

impl LoadSwitchOutput {
    pub const DARK: Self = Self { a: false, b: false, c: false };

    pub const fn new(a: bool, b: bool, c: bool) -> Self {
        Self { a, b, c }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_state_round_trips_through_discriminant() {
        for s in [
            PhaseState::Stop,
            PhaseState::MinStop,
            PhaseState::Rclr,
            PhaseState::Caution,
            PhaseState::Extend,
            PhaseState::Go,
            PhaseState::Pclr,
            PhaseState::Walk,
            PhaseState::Fya,
        ] {
            assert_eq!(PhaseState::from_u8(s as u8), Some(s));
        }
        assert_eq!(PhaseState::from_u8(1), None);
        assert_eq!(PhaseState::from_u8(99), None);
    }

    #[test]
    fn phase_state_ordering_matches_progression() {
        assert!(PhaseState::Stop < PhaseState::MinStop);
        assert!(PhaseState::Go < PhaseState::Pclr);
        assert!(PhaseState::Walk < PhaseState::Fya);
    }

    #[test]
    fn phase_state_predicates() {
        assert!(PhaseState::Go.is_vehicle_green());
        assert!(PhaseState::Extend.is_vehicle_green());
        assert!(!PhaseState::Walk.is_vehicle_green());

        assert!(PhaseState::Caution.is_clearance());
        assert!(PhaseState::Rclr.is_clearance());
        assert!(PhaseState::Pclr.is_clearance());
        assert!(!PhaseState::Go.is_clearance());

        assert!(PhaseState::Walk.is_pedestrian_serving());
        assert!(PhaseState::Pclr.is_pedestrian_serving());
        assert!(!PhaseState::Go.is_pedestrian_serving());

        assert!(!PhaseState::Stop.is_active());
        assert!(!PhaseState::MinStop.is_active());
        assert!(PhaseState::Go.is_active());
    }

    #[test]
    fn control_mode_suppresses_service_except_normal() {
        assert!(ControlMode::Off.suppresses_service());
        assert!(ControlMode::Cet.suppresses_service());
        assert!(ControlMode::Cxt.suppresses_service());
        assert!(ControlMode::LsFlash.suppresses_service());
        assert!(!ControlMode::Normal.suppresses_service());
    }

    #[test]
    fn phase_timing_defaults_have_no_min_stop_lockout() {
        let t = PhaseTiming::default();
        assert_eq!(t.min_stop, 0.0);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn phase_timing_rejects_max_go_below_go() {
        let mut t = PhaseTiming::default();
        t.max_go = t.go - 1.0;
        assert!(t.validate().is_err());
    }

    #[test]
    fn phase_timing_rejects_negative_duration() {
        let mut t = PhaseTiming::default();
        t.caution = -1.0;
        assert!(t.validate().is_err());
    }

    #[test]
    fn ring_next_after_wraps() {
        let ring = Ring { phases: vec![1, 2, 3, 4] };
        assert_eq!(ring.next_after(1), Some(2));
        assert_eq!(ring.next_after(4), Some(1));
        assert_eq!(ring.next_after(9), None);
    }

    #[test]
    fn barrier_contains() {
        let b = Barrier { phases: vec![1, 2, 5, 6] };
        assert!(b.contains(2));
        assert!(!b.contains(3));
    }

    #[test]
    fn phase_is_pedestrian_capable_iff_ped_switch_set() {
        let mut p = Phase {
            id: 1,
            flash_mode: FlashMode::Red,
            vehicle_switch: 1,
            ped_switch: None,
            timing: PhaseTiming::default(),
        };
        assert!(!p.is_pedestrian_capable());
        p.ped_switch = Some(1);
        assert!(p.is_pedestrian_capable());
    }
}
