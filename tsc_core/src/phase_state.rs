//! Per-phase state machine: governs one phase's STOP → GO → CLEAR cycle.
//!
//! Mirrors the transition-table style used for the machine-level state
//! machine elsewhere in this workspace: a `TransitionResult` distinguishes
//! an accepted transition from a rejected request, and every legal edge is
//! enumerated explicitly rather than inferred.

use tsc_common::model::PhaseState;
use tsc_common::model::PhaseTiming;

use crate::timing::{IntervalTimer, ServiceTimer};

/// Result of a phase state transition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition succeeded — new state.
    Ok(PhaseState),
    /// Transition rejected — reason.
    Rejected(&'static str),
}

/// One phase's live timing state.
#[derive(Debug, Clone, Copy)]
pub struct PhaseStateMachine {
    state: PhaseState,
    interval_timer: IntervalTimer,
    service_timer: ServiceTimer,
    serving_ped: bool,
}

impl PhaseStateMachine {
    pub const fn new() -> Self {
        Self {
            state: PhaseState::Stop,
            interval_timer: IntervalTimer::new(),
            service_timer: ServiceTimer::new(),
            serving_ped: false,
        }
    }

    #[inline]
    pub const fn state(&self) -> PhaseState {
        self.state
    }

    #[inline]
    pub const fn is_serving_pedestrian(&self) -> bool {
        self.serving_ped
    }

    pub fn interval_remaining_s(&self, tick_size_s: f64) -> f64 {
        self.interval_timer.remaining_seconds(tick_size_s)
    }

    /// Grant service from STOP. Pedestrian service requires the phase be
    /// pedestrian-capable and `timing.walk > 0`; the caller (scheduler) is
    /// responsible for only requesting `ped_service` on a capable phase.
    pub fn grant(
        &mut self,
        ped_service: bool,
        timing: &PhaseTiming,
        tick_size_s: f64,
    ) -> TransitionResult {
        if self.state != PhaseState::Stop {
            return TransitionResult::Rejected("phase not at STOP");
        }

        self.serving_ped = ped_service;
        if ped_service {
            self.interval_timer = IntervalTimer::load(timing.walk, tick_size_s);
            self.state = PhaseState::Walk;
        } else {
            self.service_timer = ServiceTimer::start(timing.max_go, tick_size_s);
            self.interval_timer = IntervalTimer::load(timing.go, tick_size_s);
            self.state = PhaseState::Go;
        }
        TransitionResult::Ok(self.state)
    }

    /// Advance the state machine by one tick. Never rejected: an idle phase
    /// simply stays at STOP.
    pub fn tick(&mut self, timing: &PhaseTiming, tick_size_s: f64, detector_present: bool) -> TransitionResult {
        match self.state {
            PhaseState::Stop => TransitionResult::Ok(self.state),

            PhaseState::MinStop => {
                if self.interval_timer.expired() || self.interval_timer.tick() {
                    self.state = PhaseState::Stop;
                }
                TransitionResult::Ok(self.state)
            }

            PhaseState::Walk => {
                if self.interval_timer.tick() {
                    self.interval_timer = IntervalTimer::load(timing.pclr, tick_size_s);
                    self.state = PhaseState::Pclr;
                }
                TransitionResult::Ok(self.state)
            }

            PhaseState::Pclr => {
                if self.interval_timer.tick() {
                    self.service_timer = ServiceTimer::start(timing.max_go, tick_size_s);
                    self.interval_timer = IntervalTimer::load(timing.go, tick_size_s);
                    self.state = PhaseState::Go;
                }
                TransitionResult::Ok(self.state)
            }

            PhaseState::Go => {
                if self.service_timer.tick() {
                    self.enter_caution(timing, tick_size_s);
                } else if detector_present {
                    self.interval_timer = IntervalTimer::load(timing.extend, tick_size_s);
                    self.state = PhaseState::Extend;
                } else if self.interval_timer.tick() {
                    self.enter_caution(timing, tick_size_s);
                }
                TransitionResult::Ok(self.state)
            }

            PhaseState::Extend => {
                if self.service_timer.tick() {
                    self.enter_caution(timing, tick_size_s);
                } else if detector_present {
                    self.interval_timer = IntervalTimer::load(timing.extend, tick_size_s);
                } else if self.interval_timer.tick() {
                    self.enter_caution(timing, tick_size_s);
                }
                TransitionResult::Ok(self.state)
            }

            PhaseState::Caution => {
                if self.interval_timer.tick() {
                    self.interval_timer = IntervalTimer::load(timing.rclr, tick_size_s);
                    self.state = PhaseState::Rclr;
                }
                TransitionResult::Ok(self.state)
            }

            PhaseState::Rclr => {
                if self.interval_timer.tick() {
                    self.interval_timer = IntervalTimer::load(timing.min_stop, tick_size_s);
                    self.state = PhaseState::MinStop;
                    self.serving_ped = false;
                }
                TransitionResult::Ok(self.state)
            }

            PhaseState::Fya => TransitionResult::Ok(self.state),
        }
    }

    fn enter_caution(&mut self, timing: &PhaseTiming, tick_size_s: f64) {
        self.interval_timer = IntervalTimer::load(timing.caution, tick_size_s);
        self.state = PhaseState::Caution;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> PhaseTiming {
        PhaseTiming {
            min_stop: 0.0,
            rclr: 1.0,
            caution: 0.3,
            extend: 0.3,
            go: 0.2,
            pclr: 0.2,
            walk: 0.2,
            max_go: 2.0,
        }
    }
    const TICK: f64 = 0.1;

    #[test]
    fn initial_state_is_stop() {
        assert_eq!(PhaseStateMachine::new().state(), PhaseState::Stop);
    }

    #[test]
    fn grant_rejected_unless_at_stop() {
        let mut sm = PhaseStateMachine::new();
        sm.grant(false, &timing(), TICK);
        assert!(matches!(
            sm.grant(false, &timing(), TICK),
            TransitionResult::Rejected(_)
        ));
    }

    #[test]
    fn vehicle_only_cycle_runs_full_sequence() {
        let t = timing();
        let mut sm = PhaseStateMachine::new();
        assert_eq!(sm.grant(false, &t, TICK), TransitionResult::Ok(PhaseState::Go));

        // go = 0.2s = 2 ticks, no detector -> gap straight to caution
        sm.tick(&t, TICK, false);
        assert_eq!(sm.state(), PhaseState::Go);
        sm.tick(&t, TICK, false);
        assert_eq!(sm.state(), PhaseState::Caution);

        // caution = 0.3s = 3 ticks
        sm.tick(&t, TICK, false);
        sm.tick(&t, TICK, false);
        sm.tick(&t, TICK, false);
        assert_eq!(sm.state(), PhaseState::Rclr);

        // rclr = 1.0s = 10 ticks
        for _ in 0..10 {
            sm.tick(&t, TICK, false);
        }
        assert_eq!(sm.state(), PhaseState::MinStop);
        // min_stop = 0 -> the next tick finds it already expired
        sm.tick(&t, TICK, false);
        assert_eq!(sm.state(), PhaseState::Stop);
    }

    #[test]
    fn detector_presence_extends_green_into_extend_state() {
        let t = timing();
        let mut sm = PhaseStateMachine::new();
        sm.grant(false, &t, TICK);
        sm.tick(&t, TICK, true);
        assert_eq!(sm.state(), PhaseState::Go);
        sm.tick(&t, TICK, true);
        assert_eq!(sm.state(), PhaseState::Extend);
    }

    #[test]
    fn gap_out_terminates_extend_without_further_detection() {
        let t = timing();
        let mut sm = PhaseStateMachine::new();
        sm.grant(false, &t, TICK);
        sm.tick(&t, TICK, true); // -> Go (reload go timer irrelevant, detector seen)
        sm.tick(&t, TICK, true); // -> Extend, interval = extend (3 ticks)
        assert_eq!(sm.state(), PhaseState::Extend);
        sm.tick(&t, TICK, false);
        sm.tick(&t, TICK, false);
        sm.tick(&t, TICK, false);
        assert_eq!(sm.state(), PhaseState::Caution);
    }

    #[test]
    fn max_out_forces_caution_even_with_continuous_detection() {
        let mut t = timing();
        t.max_go = 0.3; // 3 ticks cap
        let mut sm = PhaseStateMachine::new();
        sm.grant(false, &t, TICK);
        for _ in 0..5 {
            sm.tick(&t, TICK, true);
        }
        assert_eq!(sm.state(), PhaseState::Caution);
    }

    #[test]
    fn pedestrian_service_runs_walk_then_pclr_then_go() {
        let t = timing();
        let mut sm = PhaseStateMachine::new();
        assert_eq!(
            sm.grant(true, &t, TICK),
            TransitionResult::Ok(PhaseState::Walk)
        );
        assert!(sm.is_serving_pedestrian());
        // walk = 0.2s = 2 ticks
        sm.tick(&t, TICK, false);
        assert_eq!(sm.state(), PhaseState::Walk);
        sm.tick(&t, TICK, false);
        assert_eq!(sm.state(), PhaseState::Pclr);
        // pclr = 0.2s = 2 ticks
        sm.tick(&t, TICK, false);
        sm.tick(&t, TICK, false);
        assert_eq!(sm.state(), PhaseState::Go);
    }

    #[test]
    fn min_stop_lockout_holds_when_nonzero() {
        let mut t = timing();
        t.min_stop = 0.2;
        let mut sm = PhaseStateMachine::new();
        sm.grant(false, &t, TICK);
        for _ in 0..2 {
            sm.tick(&t, TICK, false); // go
        }
        for _ in 0..3 {
            sm.tick(&t, TICK, false); // caution
        }
        for _ in 0..10 {
            sm.tick(&t, TICK, false); // rclr
        }
        assert_eq!(sm.state(), PhaseState::MinStop);
        sm.tick(&t, TICK, false);
        assert_eq!(sm.state(), PhaseState::MinStop);
        sm.tick(&t, TICK, false);
        assert_eq!(sm.state(), PhaseState::Stop);
    }
}
