//! TOML configuration schema (repository schema version 4) and validation.
//!
//! Loads the validated intersection document: device/network/bus identity,
//! boot/shutdown policy, random actuation, idle recall, per-phase timing and
//! load-switch wiring, ring/barrier partitions, and discrete input mappings.
//! Unknown keys are rejected by `serde(deny_unknown_fields)` throughout;
//! validation beyond what serde can express (ring/barrier partition
//! agreement, id collisions) runs in [`ControllerConfig::from_raw`].

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use tsc_common::consts::CONFIG_SCHEMA_VERSION;
use tsc_common::model::{Barrier, FlashMode, Phase, PhaseTiming, Ring};

use crate::call_queue::CallWeights;
use crate::random_actuation::RandomActuationConfig;

fn default_tick_size_s() -> f64 {
    tsc_common::consts::DEFAULT_TICK_SIZE_S
}

/// Configuration loading/validation error.
#[derive(Debug, Clone)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    UnsupportedVersion { found: u32, expected: u32 },
    Validation(String),
    /// Hot-reload attempted outside `OFF` or an inter-cycle boundary.
    ReloadDenied(String),
    /// Hot-reload candidate failed the same validation a cold start runs.
    ReloadValidationFailed(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read configuration file: {e}"),
            Self::Parse(e) => write!(f, "failed to parse configuration: {e}"),
            Self::UnsupportedVersion { found, expected } => write!(
                f,
                "unsupported schema version {found}, this build understands version {expected}"
            ),
            Self::Validation(e) => write!(f, "validation failed: {e}"),
            Self::ReloadDenied(reason) => write!(f, "config reload denied: {reason}"),
            Self::ReloadValidationFailed(detail) => {
                write!(f, "config reload rejected: {detail}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitMode {
    Off,
    Cet,
    Cxt,
    LsFlash,
    Normal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InitConfig {
    pub mode: InitMode,
    #[serde(default, rename = "recall-all")]
    pub recall_all: bool,
    #[serde(rename = "cet-delay")]
    pub cet_delay_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdlingConfig {
    #[serde(default)]
    pub phases: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadSwitchWiring {
    pub vehicle: u16,
    #[serde(default)]
    pub ped: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseConfig {
    pub id: u8,
    #[serde(default)]
    pub timing: Option<PartialPhaseTiming>,
    #[serde(default, rename = "flash-mode")]
    pub flash_mode: FlashMode,
    #[serde(rename = "load-switches")]
    pub load_switches: LoadSwitchWiring,
}

/// A per-phase timing override: every key optional, defaulting to the
/// controller-wide `default-timing` value for keys left unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialPhaseTiming {
    #[serde(rename = "min-stop")]
    pub min_stop: Option<f64>,
    pub rclr: Option<f64>,
    pub caution: Option<f64>,
    pub extend: Option<f64>,
    pub go: Option<f64>,
    pub pclr: Option<f64>,
    pub walk: Option<f64>,
    #[serde(rename = "max-go")]
    pub max_go: Option<f64>,
}

impl PartialPhaseTiming {
    fn resolve(&self, default: &PhaseTiming) -> PhaseTiming {
        PhaseTiming {
            min_stop: self.min_stop.unwrap_or(default.min_stop),
            rclr: self.rclr.unwrap_or(default.rclr),
            caution: self.caution.unwrap_or(default.caution),
            extend: self.extend.unwrap_or(default.extend),
            go: self.go.unwrap_or(default.go),
            pclr: self.pclr.unwrap_or(default.pclr),
            walk: self.walk.unwrap_or(default.walk),
            max_go: self.max_go.unwrap_or(default.max_go),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputAction {
    Ignore,
    Recall,
    /// Parsed but not actuated — emergency preemption is explicitly out of
    /// scope for this controller.
    Preemption,
    TimeFreeze,
    TechFlash,
    CallInhibit,
    ExtendInhibit,
    PedClearInhibit,
    Dark,
    RandomRecallInhibit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecallType {
    Maintain,
    Latch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    pub id: u16,
    pub action: InputAction,
    #[serde(default, rename = "recall-type")]
    pub recall_type: Option<RecallType>,
    #[serde(default, rename = "recall-delay")]
    pub recall_delay_s: Option<f64>,
    #[serde(default, rename = "ped-service")]
    pub ped_service: bool,
    #[serde(default)]
    pub targets: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RootConfig {
    pub version: u32,
    pub device: String,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default = "default_tick_size_s", rename = "tick-size")]
    pub tick_size_s: f64,
    #[serde(default)]
    pub bus: Option<String>,
    pub init: InitConfig,
    #[serde(default, rename = "random-actuation")]
    pub random_actuation: RandomActuationToml,
    #[serde(default)]
    pub idling: IdlingConfig,
    #[serde(rename = "default-timing")]
    pub default_timing: PartialPhaseTiming,
    pub phases: Vec<PhaseConfig>,
    pub rings: [Vec<u8>; 2],
    pub barriers: [Vec<u8>; 2],
    #[serde(default)]
    pub inputs: Vec<InputConfig>,
    #[serde(default)]
    pub calls: CallWeightsToml,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RandomActuationToml {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub delay: Option<f64>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub enabled: bool,
}

/// Optional call-weight tuning parameters: not part of the core v4 schema,
/// accepted as an optional `[calls]` section with every field defaulted so
/// a plain v4 document still parses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallWeightsToml {
    #[serde(default, rename = "duplicate-factor")]
    pub duplicate_factor: Option<f64>,
    #[serde(default, rename = "system-weight")]
    pub system_weight: Option<f64>,
    #[serde(default, rename = "active-barrier-bonus")]
    pub active_barrier_bonus: Option<f64>,
    #[serde(default, rename = "max-age")]
    pub max_age: Option<f64>,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            mode: InitMode::Off,
            recall_all: false,
            cet_delay_s: 0.0,
        }
    }
}

impl Default for IdlingConfig {
    fn default() -> Self {
        Self { phases: Vec::new() }
    }
}

/// Fully validated, ready-to-run controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub device: String,
    pub init: InitConfig,
    pub random_actuation: RandomActuationConfig,
    pub idling_phases: Vec<u8>,
    pub phases: Vec<Phase>,
    pub rings: [Ring; 2],
    pub barriers: [Barrier; 2],
    pub inputs: Vec<InputConfig>,
    pub call_weights: CallWeights,
    pub tick_size_s: f64,
}

impl ControllerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let raw: RootConfig = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RootConfig) -> Result<Self, ConfigError> {
        if raw.version != CONFIG_SCHEMA_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: raw.version,
                expected: CONFIG_SCHEMA_VERSION,
            });
        }

        if raw.tick_size_s < tsc_common::consts::MIN_TICK_SIZE_S
            || raw.tick_size_s > tsc_common::consts::MAX_TICK_SIZE_S
        {
            return Err(ConfigError::Validation(format!(
                "tick-size {} outside [{}, {}]",
                raw.tick_size_s,
                tsc_common::consts::MIN_TICK_SIZE_S,
                tsc_common::consts::MAX_TICK_SIZE_S
            )));
        }

        let default_timing = raw.default_timing.resolve(&PhaseTiming::default());
        default_timing
            .validate()
            .map_err(ConfigError::Validation)?;

        if raw.phases.len() < 2 || raw.phases.len() > 8 {
            return Err(ConfigError::Validation(format!(
                "expected 2..8 phases, found {}",
                raw.phases.len()
            )));
        }

        let mut phase_ids = HashSet::new();
        let mut vehicle_switches = HashSet::new();
        let mut ped_switches = HashSet::new();
        let mut phases = Vec::with_capacity(raw.phases.len());
        for p in &raw.phases {
            if !phase_ids.insert(p.id) {
                return Err(ConfigError::Validation(format!(
                    "duplicate phase id {}",
                    p.id
                )));
            }
            if !vehicle_switches.insert(p.load_switches.vehicle) {
                return Err(ConfigError::Validation(format!(
                    "vehicle load switch {} assigned to more than one phase",
                    p.load_switches.vehicle
                )));
            }
            if let Some(ped) = p.load_switches.ped {
                if !ped_switches.insert(ped) {
                    return Err(ConfigError::Validation(format!(
                        "pedestrian load switch {ped} assigned to more than one phase"
                    )));
                }
            }
            let timing = p
                .timing
                .as_ref()
                .map(|t| t.resolve(&default_timing))
                .unwrap_or(default_timing);
            timing.validate().map_err(ConfigError::Validation)?;
            phases.push(Phase {
                id: p.id,
                flash_mode: p.flash_mode,
                vehicle_switch: p.load_switches.vehicle,
                ped_switch: p.load_switches.ped,
                timing,
            });
        }

        let rings = [
            Ring {
                phases: raw.rings[0].clone(),
            },
            Ring {
                phases: raw.rings[1].clone(),
            },
        ];
        let barriers = [
            Barrier {
                phases: raw.barriers[0].clone(),
            },
            Barrier {
                phases: raw.barriers[1].clone(),
            },
        ];
        validate_partition(&rings, &barriers, &phase_ids)?;

        for idling in &raw.idling.phases {
            if !phase_ids.contains(idling) {
                return Err(ConfigError::Validation(format!(
                    "idling.phases references unknown phase {idling}"
                )));
            }
        }

        for input in &raw.inputs {
            for target in &input.targets {
                if !phase_ids.contains(target) {
                    return Err(ConfigError::Validation(format!(
                        "input {} targets unknown phase {target}",
                        input.id
                    )));
                }
            }
        }

        let random_actuation = RandomActuationConfig {
            enabled: raw.random_actuation.enabled,
            min_s: raw.random_actuation.min.unwrap_or(5.0),
            max_s: raw.random_actuation.max.unwrap_or(20.0),
            seed: raw.random_actuation.seed.unwrap_or(0),
        };
        if random_actuation.min_s > random_actuation.max_s {
            return Err(ConfigError::Validation(format!(
                "random-actuation.min={} must be <= max={}",
                random_actuation.min_s, random_actuation.max_s
            )));
        }

        let call_weights = CallWeights {
            duplicate_factor: raw.calls.duplicate_factor.unwrap_or(1.5),
            system_weight: raw.calls.system_weight.unwrap_or(0.1),
            active_barrier_bonus: raw.calls.active_barrier_bonus.unwrap_or(2.0),
            max_age_s: raw.calls.max_age.unwrap_or(120.0),
        };

        Ok(Self {
            device: raw.device,
            init: raw.init,
            random_actuation,
            idling_phases: raw.idling.phases,
            phases,
            rings,
            barriers,
            inputs: raw.inputs,
            call_weights,
            tick_size_s: raw.tick_size_s,
        })
    }

    pub fn phase(&self, id: u8) -> Option<&Phase> {
        self.phases.iter().find(|p| p.id == id)
    }

    /// Validate and apply a replacement configuration document without a
    /// process restart. Only valid when the controller is `OFF` or
    /// sitting at a stable inter-cycle boundary (every phase at `STOP`) —
    /// callers must attest to that with `at_stable_boundary`. The candidate
    /// runs through the same validation a cold start would; on failure the
    /// current configuration is returned untouched.
    pub fn apply_config(
        current: &Self,
        candidate_toml: &str,
        mode_is_off: bool,
        at_stable_boundary: bool,
    ) -> Result<Self, ConfigError> {
        if !mode_is_off && !at_stable_boundary {
            return Err(ConfigError::ReloadDenied(
                "reload requires OFF mode or all phases parked at STOP".into(),
            ));
        }
        let _ = current;
        Self::parse(candidate_toml).map_err(|e| ConfigError::ReloadValidationFailed(e.to_string()))
    }
}

/// Confirms the ring/barrier partition invariant: the union of
/// the two barriers equals the union of the two rings, and each phase
/// appears in exactly one ring and exactly one barrier.
fn validate_partition(
    rings: &[Ring; 2],
    barriers: &[Barrier; 2],
    phase_ids: &HashSet<u8>,
) -> Result<(), ConfigError> {
    let mut ring_membership: HashMap<u8, usize> = HashMap::new();
    for (idx, ring) in rings.iter().enumerate() {
        if ring.phases.is_empty() || ring.phases.len() > 4 {
            return Err(ConfigError::Validation(format!(
                "ring {idx} must list 1..4 phases, found {}",
                ring.phases.len()
            )));
        }
        for &p in &ring.phases {
            if ring_membership.insert(p, idx).is_some() {
                return Err(ConfigError::Validation(format!(
                    "phase {p} appears in more than one ring"
                )));
            }
        }
    }

    let mut barrier_membership: HashMap<u8, usize> = HashMap::new();
    for (idx, barrier) in barriers.iter().enumerate() {
        if barrier.phases.is_empty() || barrier.phases.len() > 4 {
            return Err(ConfigError::Validation(format!(
                "barrier {idx} must list 1..4 phases, found {}",
                barrier.phases.len()
            )));
        }
        for &p in &barrier.phases {
            if barrier_membership.insert(p, idx).is_some() {
                return Err(ConfigError::Validation(format!(
                    "phase {p} appears in more than one barrier"
                )));
            }
        }
    }

    let ring_set: HashSet<u8> = ring_membership.keys().copied().collect();
    let barrier_set: HashSet<u8> = barrier_membership.keys().copied().collect();
    if ring_set != barrier_set {
        return Err(ConfigError::Validation(
            "union of barriers does not match union of rings".into(),
        ));
    }
    if &ring_set != phase_ids {
        return Err(ConfigError::Validation(
            "ring/barrier phase set does not match the configured phase list".into(),
        ));
    }

    // Each barrier's intersection with a ring, across both barriers, must
    // exactly partition that ring: every phase in the ring is reachable
    // from exactly one barrier. A barrier may legitimately claim more than
    // one phase from the same ring (e.g. barrier 1 = {1, 2, 5, 6} against
    // ring 1 = [1, 2, 3, 4]) since the ring only ever runs one of them at
    // a time; per-ring exclusion is enforced at runtime by the scheduler,
    // not by this structural check.
    for (ring_idx, ring) in rings.iter().enumerate() {
        let mut covered: HashSet<u8> = HashSet::new();
        for barrier in barriers {
            let in_ring: Vec<u8> = barrier
                .phases
                .iter()
                .copied()
                .filter(|p| ring.phases.contains(p))
                .collect();
            for &p in &in_ring {
                if !covered.insert(p) {
                    return Err(ConfigError::Validation(format!(
                        "phase {p} in ring {ring_idx} is claimed by more than one barrier"
                    )));
                }
            }
        }
        let ring_set: HashSet<u8> = ring.phases.iter().copied().collect();
        if covered != ring_set {
            return Err(ConfigError::Validation(format!(
                "barriers do not jointly cover every phase in ring {ring_idx}"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_toml() -> String {
        r#"
version = 4
device = "intersection-12"

[init]
mode = "normal"
cet-delay = 4.0

[default-timing]

[[phases]]
id = 2
[phases.load-switches]
vehicle = 1

[[phases]]
id = 4
[phases.load-switches]
vehicle = 2

[[phases]]
id = 6
[phases.load-switches]
vehicle = 3

[[phases]]
id = 8
[phases.load-switches]
vehicle = 4

rings = [[2, 4], [6, 8]]
barriers = [[2, 6], [4, 8]]
"#
        .to_string()
    }

    #[test]
    fn rejects_unsupported_schema_version() {
        let mut doc = valid_toml();
        doc = doc.replacen("version = 4", "version = 3", 1);
        assert!(matches!(
            ControllerConfig::parse(&doc),
            Err(ConfigError::UnsupportedVersion { found: 3, .. })
        ));
    }

    #[test]
    fn rejects_unknown_top_level_key() {
        let mut doc = valid_toml();
        doc.push_str("\nbogus = true\n");
        assert!(matches!(ControllerConfig::parse(&doc), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn rejects_duplicate_phase_ids() {
        let doc = valid_toml().replacen("id = 4", "id = 2", 1);
        assert!(matches!(
            ControllerConfig::parse(&doc),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn min_stop_defaults_to_zero_when_absent() {
        let cfg = ControllerConfig::parse(&valid_toml()).unwrap();
        assert_eq!(cfg.phase(2).unwrap().timing.min_stop, 0.0);
    }

    #[test]
    fn accepts_well_formed_minimal_config() {
        let cfg = ControllerConfig::parse(&valid_toml()).unwrap();
        assert_eq!(cfg.phases.len(), 4);
        assert_eq!(cfg.rings[0].phases, vec![2, 4]);
    }

    #[test]
    fn tick_size_defaults_when_absent() {
        let cfg = ControllerConfig::parse(&valid_toml()).unwrap();
        assert_eq!(cfg.tick_size_s, tsc_common::consts::DEFAULT_TICK_SIZE_S);
    }

    #[test]
    fn tick_size_honors_explicit_value() {
        let doc = valid_toml().replacen("version = 4", "version = 4\ntick-size = 0.05", 1);
        let cfg = ControllerConfig::parse(&doc).unwrap();
        assert_eq!(cfg.tick_size_s, 0.05);
    }

    #[test]
    fn tick_size_out_of_bounds_is_rejected() {
        let doc = valid_toml().replacen("version = 4", "version = 4\ntick-size = 5.0", 1);
        assert!(matches!(
            ControllerConfig::parse(&doc),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn rejects_ring_barrier_set_mismatch() {
        let doc = valid_toml().replace(
            "barriers = [[2, 6], [4, 8]]",
            "barriers = [[2, 6], [4, 4]]",
        );
        assert!(matches!(
            ControllerConfig::parse(&doc),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn reload_denied_outside_off_or_stable_boundary() {
        let current = ControllerConfig::parse(&valid_toml()).unwrap();
        let result = ControllerConfig::apply_config(&current, &valid_toml(), false, false);
        assert!(matches!(result, Err(ConfigError::ReloadDenied(_))));
    }

    #[test]
    fn reload_succeeds_at_stable_boundary_with_valid_candidate() {
        let current = ControllerConfig::parse(&valid_toml()).unwrap();
        let candidate = valid_toml().replacen("cet-delay = 4.0", "cet-delay = 5.0", 1);
        let reloaded = ControllerConfig::apply_config(&current, &candidate, false, true).unwrap();
        assert_eq!(reloaded.init.cet_delay_s, 5.0);
    }

    #[test]
    fn reload_rejects_invalid_candidate_without_touching_caller() {
        let current = ControllerConfig::parse(&valid_toml()).unwrap();
        let candidate = valid_toml().replacen("id = 4", "id = 2", 1);
        let result = ControllerConfig::apply_config(&current, &candidate, true, false);
        assert!(matches!(result, Err(ConfigError::ReloadValidationFailed(_))));
    }
}
