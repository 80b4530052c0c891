//! Controller runtime: the tick loop, mode machine, and recall/idle policy.
//! Owns every mutable piece of controller state — the call queue and the
//! phase array are mutated nowhere else.
//!
//! ## Inbound bit layout
//!
//! `InboundFrame.levels`/`rising`/`falling` are laid out as: one bit per
//! configured phase (in `config.phases` order) carrying that phase's
//! vehicle detector, followed by one bit per entry in `config.inputs` (in
//! list order) carrying that cabinet input's level. The field-bus adapter
//! is responsible for producing frames in this layout; the core only
//! consumes it.

use std::collections::HashMap;

use tsc_common::bus::{InboundFrame, OutboundFrame};
use tsc_common::model::{CallSource, ControlMode, LoadSwitchOutput, PhaseState, PhaseStatus};
use tsc_common::telemetry::{LoadSwitchTelemetry, PhaseTelemetry, StateFlags, StatusSnapshot};

use crate::call_queue::CallQueue;
use crate::config::{ControllerConfig, InitMode, InputAction, RecallType};
use crate::phase_state::PhaseStateMachine;
use crate::projection;
use crate::random_actuation::RandomActuator;
use crate::scheduler::{Scheduler, SchedulerInvariantViolation};
use crate::timing::{ControlClock, IntervalTimer};

/// Outbound bus frame failures before the runtime fails safe to `LS_FLASH`.
const BUS_FAILURE_THRESHOLD: u32 = 3;
/// Consecutive successful frames required to clear a bus fault.
const BUS_RECOVERY_THRESHOLD: u32 = 5;

/// Errors raised once the tick loop is running. Configuration errors are
/// reported by [`crate::config::ConfigError`] before the loop ever starts.
#[derive(Debug)]
pub enum RuntimeError {
    /// A scheduler invariant was violated — a fatal bug, never a
    /// recoverable condition. The runtime asserts and fails safe.
    SchedulerInvariant(SchedulerInvariantViolation),
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SchedulerInvariant(e) => write!(f, "scheduler invariant violated: {e}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<SchedulerInvariantViolation> for RuntimeError {
    fn from(e: SchedulerInvariantViolation) -> Self {
        Self::SchedulerInvariant(e)
    }
}

fn init_mode_to_control(mode: InitMode) -> ControlMode {
    match mode {
        InitMode::Off => ControlMode::Off,
        InitMode::Cet => ControlMode::Cet,
        InitMode::Cxt => ControlMode::Cxt,
        InitMode::LsFlash => ControlMode::LsFlash,
        InitMode::Normal => ControlMode::Normal,
    }
}

pub struct ControllerRuntime {
    config: ControllerConfig,
    clock: ControlClock,
    mode: ControlMode,
    requested_mode: Option<ControlMode>,
    cet_timer: Option<IntervalTimer>,
    phases: HashMap<u8, PhaseStateMachine>,
    statuses: HashMap<u8, PhaseStatus>,
    queue: CallQueue,
    scheduler: Scheduler,
    random: RandomActuator,
    detector_levels: HashMap<u8, bool>,
    vehicle_calls: HashMap<u8, u32>,
    ped_calls: HashMap<u8, u32>,
    detections: HashMap<u8, u32>,
    time_freeze: bool,
    tech_flash: bool,
    bus_consecutive_failures: u32,
    bus_consecutive_successes: u32,
    bus_fault: bool,
    scheduler_fault: bool,
    transfer_count: u32,
    last_active_barrier: Option<usize>,
    just_granted: std::collections::HashSet<u8>,
    ped_clear_inhibited: std::collections::HashSet<u8>,
}

impl ControllerRuntime {
    pub fn new(config: ControllerConfig) -> Self {
        let mode = init_mode_to_control(config.init.mode);
        let cet_timer = (mode == ControlMode::Cet)
            .then(|| IntervalTimer::load(config.init.cet_delay_s, config.tick_size_s));

        let rings = config.rings.clone();
        let barriers = config.barriers.clone();
        let idling_phases = config.idling_phases.clone();
        let scheduler = Scheduler::new(rings, barriers, idling_phases);

        let targets: Vec<u8> = config.phases.iter().map(|p| p.id).collect();
        let random = RandomActuator::new(&config.random_actuation, targets.clone());

        let phases = targets
            .iter()
            .map(|&id| (id, PhaseStateMachine::new()))
            .collect();
        let statuses = targets.iter().map(|&id| (id, PhaseStatus::Inactive)).collect();
        let detector_levels = targets.iter().map(|&id| (id, false)).collect();
        let mut vehicle_calls: HashMap<u8, u32> = targets.iter().map(|&id| (id, 0)).collect();
        let ped_calls = targets.iter().map(|&id| (id, 0)).collect();
        let detections = targets.iter().map(|&id| (id, 0)).collect();

        let mut queue = CallQueue::new();
        if config.init.recall_all {
            for &id in &targets {
                queue.place(id, false, CallSource::System, 1.0, &config.call_weights);
                *vehicle_calls.entry(id).or_insert(0) += 1;
            }
        }

        Self {
            config,
            clock: ControlClock::new(),
            mode,
            requested_mode: None,
            cet_timer,
            phases,
            statuses,
            queue,
            scheduler,
            random,
            detector_levels,
            vehicle_calls,
            ped_calls,
            detections,
            time_freeze: false,
            tech_flash: false,
            bus_consecutive_failures: 0,
            bus_consecutive_successes: 0,
            bus_fault: false,
            scheduler_fault: false,
            transfer_count: 0,
            last_active_barrier: None,
            just_granted: Default::default(),
            ped_clear_inhibited: Default::default(),
        }
    }

    #[inline]
    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    #[inline]
    pub fn control_time_s(&self) -> f64 {
        self.clock.seconds(self.config.tick_size_s)
    }

    /// External request to change mode (telemetry control channel).
    /// Applied at the top of the next tick.
    pub fn request_mode(&mut self, mode: ControlMode) {
        self.requested_mode = Some(mode);
    }

    /// Report the outcome of the most recent outbound bus transmission.
    /// Three consecutive failures force `LS_FLASH`; five consecutive
    /// successes clear the fault.
    pub fn record_bus_outcome(&mut self, success: bool) {
        if success {
            self.bus_consecutive_failures = 0;
            self.bus_consecutive_successes += 1;
            if self.bus_consecutive_successes >= BUS_RECOVERY_THRESHOLD {
                self.bus_fault = false;
            }
        } else {
            self.bus_consecutive_successes = 0;
            self.bus_consecutive_failures += 1;
            if self.bus_consecutive_failures >= BUS_FAILURE_THRESHOLD {
                self.bus_fault = true;
                self.mode = ControlMode::LsFlash;
                self.requested_mode = None;
            }
        }
    }

    /// Advance the controller by exactly one tick. Never runs ahead of or
    /// skips ticks — the caller is responsible for pacing calls to
    /// `tick_size_s` of wall time.
    pub fn tick(&mut self, inbound: &InboundFrame) -> Result<(OutboundFrame, StatusSnapshot), RuntimeError> {
        self.clock.advance();
        self.just_granted.clear();
        self.apply_mode_requests();
        self.apply_inputs(inbound);
        self.queue.age(self.config.tick_size_s, &self.config.call_weights);

        if self.mode == ControlMode::Cxt {
            self.drive_cxt_exit();
        }

        if !self.mode.suppresses_service() {
            self.run_scheduler()?;
        }

        if !self.time_freeze {
            self.advance_phases();
        }

        self.advance_cet_timer();

        let outbound = self.project_outputs();
        let snapshot = self.build_snapshot(&outbound);
        Ok((outbound, snapshot))
    }

    fn apply_mode_requests(&mut self) {
        if let Some(requested) = self.requested_mode.take() {
            if requested == ControlMode::Cet {
                self.cet_timer = Some(IntervalTimer::load(
                    self.config.init.cet_delay_s,
                    self.config.tick_size_s,
                ));
            }
            self.mode = requested;
        }
    }

    fn advance_cet_timer(&mut self) {
        if self.mode != ControlMode::Cet {
            return;
        }
        if let Some(timer) = self.cet_timer.as_mut() {
            if timer.tick() || timer.expired() {
                self.mode = ControlMode::Normal;
                self.cet_timer = None;
            }
        } else {
            self.mode = ControlMode::Normal;
        }
    }

    /// `CXT` drives every phase to `STOP` through its normal clearance
    /// path, then enters `LS_FLASH` once the whole intersection is clear.
    fn drive_cxt_exit(&mut self) {
        let all_clear = self
            .phases
            .values()
            .all(|p| matches!(p.state(), PhaseState::Stop | PhaseState::MinStop));
        if all_clear {
            self.mode = ControlMode::LsFlash;
        }
    }

    fn apply_inputs(&mut self, inbound: &InboundFrame) {
        let phase_ids: Vec<u8> = self.config.phases.iter().map(|p| p.id).collect();
        let n_phases = phase_ids.len();

        let mut call_inhibited: std::collections::HashSet<u8> = Default::default();
        let mut extend_inhibited: std::collections::HashSet<u8> = Default::default();
        let mut ped_clear_inhibited: std::collections::HashSet<u8> = Default::default();
        let mut random_inhibited = false;
        let mut dark_requested = false;

        for (idx, input) in self.config.inputs.iter().enumerate() {
            let bit = n_phases + idx;
            let level = inbound.levels.get(bit).copied().unwrap_or(false);
            let rising = inbound.rising.get(bit).copied().unwrap_or(false);

            match input.action {
                InputAction::Ignore | InputAction::Preemption => {}
                InputAction::Recall => {
                    let source = match input.recall_type {
                        Some(RecallType::Maintain) => {
                            if level {
                                Some(CallSource::RecallMaintained)
                            } else {
                                None
                            }
                        }
                        Some(RecallType::Latch) | None => {
                            if rising {
                                Some(CallSource::RecallLatched)
                            } else {
                                None
                            }
                        }
                    };
                    if let Some(source) = source {
                        for &target in &input.targets {
                            self.place_call(target, input.ped_service, source, 1.0);
                        }
                    }
                }
                InputAction::TimeFreeze => self.time_freeze = level,
                InputAction::TechFlash => self.tech_flash = level,
                InputAction::Dark => dark_requested = level,
                InputAction::CallInhibit => {
                    if level {
                        call_inhibited.extend(input.targets.iter().copied());
                    }
                }
                InputAction::ExtendInhibit => {
                    if level {
                        extend_inhibited.extend(input.targets.iter().copied());
                    }
                }
                InputAction::PedClearInhibit => {
                    if level {
                        ped_clear_inhibited.extend(input.targets.iter().copied());
                    }
                }
                InputAction::RandomRecallInhibit => random_inhibited |= level,
            }
        }
        self.ped_clear_inhibited = ped_clear_inhibited;

        if dark_requested {
            self.mode = ControlMode::Off;
        } else if self.tech_flash && self.mode == ControlMode::Normal {
            self.mode = ControlMode::LsFlash;
        }

        for (idx, &phase_id) in phase_ids.iter().enumerate() {
            let level = inbound.levels.get(idx).copied().unwrap_or(false);
            let rising = inbound.rising.get(idx).copied().unwrap_or(false);
            self.detector_levels.insert(
                phase_id,
                level && !extend_inhibited.contains(&phase_id),
            );
            if rising {
                *self.detections.entry(phase_id).or_insert(0) += 1;
            }
            if rising && !call_inhibited.contains(&phase_id) {
                self.place_call(phase_id, false, CallSource::Detector, 1.0);
            }
        }

        if !random_inhibited {
            if let Some(target) = self.random.tick(self.config.tick_size_s, &self.config.random_actuation) {
                self.place_call(target, false, CallSource::Random, 1.0);
            }
        }
    }

    /// Place a call on the queue and bump the matching per-phase telemetry
    /// counter (`vehicle_calls`/`ped_calls`).
    fn place_call(&mut self, target_phase: u8, ped_service: bool, source: CallSource, weight: f64) {
        self.queue
            .place(target_phase, ped_service, source, weight, &self.config.call_weights);
        let counter = if ped_service { &mut self.ped_calls } else { &mut self.vehicle_calls };
        *counter.entry(target_phase).or_insert(0) += 1;
    }

    fn run_scheduler(&mut self) -> Result<(), RuntimeError> {
        let states: HashMap<u8, PhaseState> =
            self.phases.iter().map(|(&id, sm)| (id, sm.state())).collect();

        let active_barrier = self.scheduler.active_barrier(&states);
        if let (Some(prev), Some(now)) = (self.last_active_barrier, active_barrier) {
            if prev != now {
                self.transfer_count += 1;
            }
        }
        self.last_active_barrier = active_barrier.or(self.last_active_barrier);

        let decision = match self.scheduler.select(&states, &self.queue, &self.config.call_weights) {
            Ok(d) => d,
            Err(violation) => {
                self.scheduler_fault = true;
                self.mode = ControlMode::LsFlash;
                return Err(RuntimeError::SchedulerInvariant(violation));
            }
        };

        for ring_idx in 0..2 {
            let Some(phase_id) = decision.next[ring_idx] else {
                continue;
            };
            let Some(sm) = self.phases.get_mut(&phase_id) else {
                continue;
            };
            if sm.state() != PhaseState::Stop {
                self.statuses.insert(phase_id, PhaseStatus::Next);
                continue;
            }
            let Some(phase) = self.config.phase(phase_id) else {
                continue;
            };
            let wants_ped = phase.is_pedestrian_capable()
                && phase.timing.walk > 0.0
                && self.queue.has_pending(phase_id, true)
                && !self.ped_clear_inhibited.contains(&phase_id);
            sm.grant(wants_ped, &phase.timing, self.config.tick_size_s);
            self.just_granted.insert(phase_id);
            self.scheduler.note_granted(phase_id);
            let status = self.entering_status(phase_id);
            self.statuses.insert(phase_id, status);
        }

        for ring_idx in 0..2 {
            let Some(phase_id) = decision.held[ring_idx] else {
                continue;
            };
            if self.phases.get(&phase_id).map(|sm| sm.state()) == Some(PhaseState::Stop) {
                self.statuses.insert(phase_id, PhaseStatus::Next);
            }
        }

        Ok(())
    }

    /// A phase entering service becomes `LEADER` unless its barrier already
    /// has a serving partner in the other ring, in which case it enters as
    /// `SECONDARY` — the original partner keeps `LEADER`.
    fn entering_status(&self, just_granted: u8) -> PhaseStatus {
        let Some(barrier) = self.config.barriers.iter().find(|b| b.contains(just_granted)) else {
            return PhaseStatus::Leader;
        };
        let has_active_partner = barrier.phases.iter().any(|&p| {
            p != just_granted
                && self
                    .phases
                    .get(&p)
                    .map(|sm| sm.state().is_active())
                    .unwrap_or(false)
        });
        if has_active_partner {
            PhaseStatus::Secondary
        } else {
            PhaseStatus::Leader
        }
    }

    fn advance_phases(&mut self) {
        let phase_ids: Vec<u8> = self.config.phases.iter().map(|p| p.id).collect();
        for phase_id in phase_ids {
            if self.just_granted.contains(&phase_id) {
                continue;
            }
            let Some(phase) = self.config.phase(phase_id) else {
                continue;
            };
            let timing = phase.timing;
            let detector_present = *self.detector_levels.get(&phase_id).unwrap_or(&false);
            let was_serving_ped = self
                .phases
                .get(&phase_id)
                .map(|sm| sm.is_serving_pedestrian())
                .unwrap_or(false);
            let prior_state = self.phases.get(&phase_id).map(|sm| sm.state());

            if let Some(sm) = self.phases.get_mut(&phase_id) {
                sm.tick(&timing, self.config.tick_size_s, detector_present);
                // Only a phase that just cleared out of an active/clearing
                // state completes service; a phase already idling at STOP
                // with an ungranted pending call must not have that call
                // discarded.
                if sm.state() == PhaseState::Stop && prior_state != Some(PhaseState::Stop) {
                    self.queue.served(phase_id, was_serving_ped);
                    self.statuses.insert(phase_id, PhaseStatus::Inactive);
                }
            }
        }
    }

    fn project_outputs(&self) -> OutboundFrame {
        let mut switches = vec![LoadSwitchOutput::DARK; self.switch_count()];
        let pulse_on = self.clock.pulse_1hz(self.config.tick_size_s);

        for phase in &self.config.phases {
            let sm = &self.phases[&phase.id];
            let vehicle = projection::project_vehicle(self.mode, sm.state(), phase.flash_mode, pulse_on);
            set_switch(&mut switches, phase.vehicle_switch, vehicle);

            if let Some(ped_switch) = phase.ped_switch {
                let ped = projection::project_pedestrian(self.mode, sm.state(), pulse_on);
                set_switch(&mut switches, ped_switch, ped);
            }
        }

        OutboundFrame {
            control_time_ticks: self.clock.ticks(),
            switches,
        }
    }

    fn switch_count(&self) -> usize {
        self.config
            .phases
            .iter()
            .flat_map(|p| std::iter::once(p.vehicle_switch).chain(p.ped_switch))
            .max()
            .map(|m| m as usize + 1)
            .unwrap_or(0)
    }

    fn build_snapshot(&self, outbound: &OutboundFrame) -> StatusSnapshot {
        let ranked = self.queue.ranked(None, &self.config.call_weights);
        let avg_demand = if ranked.is_empty() {
            0.0
        } else {
            ranked.iter().map(|c| c.weight).sum::<f64>() / ranked.len() as f64
        };
        let peek_demand = ranked.iter().map(|c| c.weight).fold(0.0_f64, f64::max);

        let phases = self
            .config
            .phases
            .iter()
            .map(|phase| {
                let sm = &self.phases[&phase.id];
                PhaseTelemetry {
                    id: phase.id,
                    status: self.statuses.get(&phase.id).copied().unwrap_or_default(),
                    state: sm.state(),
                    ped_service: sm.is_serving_pedestrian(),
                    time_lower: interval_elapsed_s(sm, &phase.timing, self.config.tick_size_s),
                    time_upper: interval_target_s(sm, &phase.timing),
                    detections: self.detections.get(&phase.id).copied().unwrap_or(0),
                    vehicle_calls: self.vehicle_calls.get(&phase.id).copied().unwrap_or(0),
                    ped_calls: self.ped_calls.get(&phase.id).copied().unwrap_or(0),
                }
            })
            .collect();

        let load_switches = outbound
            .switches
            .iter()
            .enumerate()
            .map(|(id, &output)| LoadSwitchTelemetry {
                id: id as u16,
                output,
            })
            .collect();

        StatusSnapshot {
            mode: self.mode,
            state_flags: StateFlags {
                bus_fault: self.bus_fault,
                time_freeze: self.time_freeze,
                tech_flash: self.tech_flash,
                scheduler_fault: self.scheduler_fault,
            },
            plan_id: 0,
            avg_demand,
            peek_demand,
            runtime: self.clock.seconds(self.config.tick_size_s),
            control_time: self.clock.ticks(),
            transfer_count: self.transfer_count,
            phases,
            load_switches,
        }
    }
}

fn set_switch(switches: &mut [LoadSwitchOutput], id: u16, output: LoadSwitchOutput) {
    if let Some(slot) = switches.get_mut(id as usize) {
        *slot = output;
    }
}

fn interval_elapsed_s(sm: &PhaseStateMachine, timing: &tsc_common::model::PhaseTiming, tick_size_s: f64) -> f64 {
    let target = interval_target_s(sm, timing);
    (target - sm.interval_remaining_s(tick_size_s)).max(0.0)
}

fn interval_target_s(sm: &PhaseStateMachine, timing: &tsc_common::model::PhaseTiming) -> f64 {
    match sm.state() {
        PhaseState::Stop => 0.0,
        PhaseState::MinStop => timing.min_stop,
        PhaseState::Rclr => timing.rclr,
        PhaseState::Caution => timing.caution,
        PhaseState::Extend => timing.extend,
        PhaseState::Go => timing.go,
        PhaseState::Pclr => timing.pclr,
        PhaseState::Walk => timing.walk,
        PhaseState::Fya => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_toml() -> String {
        r#"
version = 4
device = "test"

[init]
mode = "normal"
cet-delay = 4.0

[default-timing]
rclr = 1.0
caution = 4.0
extend = 3.0
go = 12.5
pclr = 10.0
walk = 7.0
max-go = 60.0

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

[[inputs]]
id = 1
action = "recall"
recall-type = "maintain"
targets = [2]
"#
        .to_string()
    }

    fn blank_inbound(n: usize) -> InboundFrame {
        InboundFrame::with_input_count(n)
    }

    #[test]
    fn single_call_runs_full_cycle_then_returns_to_stop() {
        let cfg = crate::config::ControllerConfig::parse(&config_toml()).unwrap();
        let mut rt = ControllerRuntime::new(cfg);
        // phase 3 doesn't exist in this fixture; use phase 4 as the "minor street" call.
        let mut inbound = blank_inbound(4 + 1);
        inbound.rising[1] = true; // phase 4 vehicle detector (index 1)
        inbound.levels[1] = true;
        let (_out, snap) = rt.tick(&inbound).unwrap();
        let p4 = snap.phases.iter().find(|p| p.id == 4).unwrap();
        assert_eq!(p4.state, PhaseState::Go);

        // Hold the detector low and run out go/caution/rclr.
        let idle = blank_inbound(4 + 1);
        for _ in 0..(125 + 40 + 10 + 5) {
            rt.tick(&idle).unwrap();
        }
        let snap = rt.tick(&idle).unwrap().1;
        let p4 = snap.phases.iter().find(|p| p.id == 4).unwrap();
        assert_eq!(p4.state, PhaseState::Stop);
    }

    #[test]
    fn bus_failure_then_recovery_toggles_fault_flag() {
        let cfg = crate::config::ControllerConfig::parse(&config_toml()).unwrap();
        let mut rt = ControllerRuntime::new(cfg);
        assert!(!rt.build_snapshot(&OutboundFrame { control_time_ticks: 0, switches: vec![] }).state_flags.bus_fault);
        rt.record_bus_outcome(false);
        rt.record_bus_outcome(false);
        rt.record_bus_outcome(false);
        assert_eq!(rt.mode(), ControlMode::LsFlash);
        for _ in 0..5 {
            rt.record_bus_outcome(true);
        }
        assert!(!rt.bus_fault);
    }

    #[test]
    fn cet_boot_transitions_to_normal_after_delay() {
        let doc = config_toml().replace("mode = \"normal\"", "mode = \"cet\"");
        let cfg = crate::config::ControllerConfig::parse(&doc).unwrap();
        let mut rt = ControllerRuntime::new(cfg);
        assert_eq!(rt.mode(), ControlMode::Cet);
        let inbound = blank_inbound(5);
        // cet-delay = 4.0s at 0.1s ticks = 40 ticks.
        for _ in 0..40 {
            rt.tick(&inbound).unwrap();
        }
        assert_eq!(rt.mode(), ControlMode::Normal);
    }

    #[test]
    fn idle_recall_keeps_reoffering_configured_phases() {
        let doc = config_toml().replace(
            "[[inputs]]\nid = 1\naction = \"recall\"\nrecall-type = \"maintain\"\ntargets = [2]\n",
            "",
        );
        let doc = doc.replace("rings = [[2, 4], [6, 8]]", "rings = [[2, 4], [6, 8]]\n[idling]\nphases = [2, 6]");
        let cfg = crate::config::ControllerConfig::parse(&doc).unwrap();
        let mut rt = ControllerRuntime::new(cfg);
        let inbound = blank_inbound(4);
        let (_out, snap) = rt.tick(&inbound).unwrap();
        let p2 = snap.phases.iter().find(|p| p.id == 2).unwrap();
        let p6 = snap.phases.iter().find(|p| p.id == 6).unwrap();
        assert_eq!(p2.state, PhaseState::Go);
        assert_eq!(p6.state, PhaseState::Go);
    }
}
