//! End-to-end scenarios driven against [`ControllerRuntime`] through its
//! public tick loop only — no reaching into private fields. Mirrors the
//! fixture-constant-plus-scenario-function layout used for the workspace's
//! other cross-module integration suites.
//!
//! Covers a single minor-street call, a barrier lock with a mid-service
//! concurrent promotion, a CET boot transition, and indefinite idle
//! recall.

use tsc_common::bus::InboundFrame;
use tsc_common::model::{ControlMode, PhaseState, PhaseStatus};
use tsc_core::config::ControllerConfig;
use tsc_core::runtime::ControllerRuntime;

/// Standard 8-phase dual-ring, dual-barrier intersection: ring 0 = phases
/// 1-4, ring 1 = phases 5-8, barrier 0 = {1,2,5,6}, barrier 1 = {3,4,7,8}.
/// Odd phases carry no pedestrian movement; even phases do.
const BASE_TOML: &str = r#"
version = 4
device = "eight-phase-intersection"

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
id = 1
[phases.load-switches]
vehicle = 1

[[phases]]
id = 2
[phases.load-switches]
vehicle = 2
ped = 9

[[phases]]
id = 3
[phases.load-switches]
vehicle = 3

[[phases]]
id = 4
[phases.load-switches]
vehicle = 4
ped = 10

[[phases]]
id = 5
[phases.load-switches]
vehicle = 5

[[phases]]
id = 6
[phases.load-switches]
vehicle = 6
ped = 11

[[phases]]
id = 7
[phases.load-switches]
vehicle = 7

[[phases]]
id = 8
[phases.load-switches]
vehicle = 8
ped = 12

rings = [[1, 2, 3, 4], [5, 6, 7, 8]]
barriers = [[1, 2, 5, 6], [3, 4, 7, 8]]
"#;

const N_PHASES: usize = 8;

fn runtime_from(doc: &str) -> ControllerRuntime {
    let cfg = ControllerConfig::parse(doc).expect("fixture config should validate");
    ControllerRuntime::new(cfg)
}

fn idle_inbound() -> InboundFrame {
    InboundFrame::with_input_count(N_PHASES)
}

/// A single-tick inbound frame asserting a rising detector edge on `phase`
/// (phases 1-8 map to indices 0-7 in declaration order).
fn call_inbound(phase: u8) -> InboundFrame {
    let mut frame = idle_inbound();
    let idx = (phase - 1) as usize;
    frame.levels[idx] = true;
    frame.rising[idx] = true;
    frame
}

fn state_of(snap: &tsc_common::telemetry::StatusSnapshot, phase: u8) -> PhaseState {
    snap.phases.iter().find(|p| p.id == phase).unwrap().state
}

fn status_of(snap: &tsc_common::telemetry::StatusSnapshot, phase: u8) -> PhaseStatus {
    snap.phases.iter().find(|p| p.id == phase).unwrap().status
}

/// Single vehicle call on a minor-street phase.
#[test]
fn single_call_minor_street_runs_full_cycle_and_returns_to_stop() {
    let mut rt = runtime_from(BASE_TOML);

    let (_out, snap) = rt.tick(&call_inbound(3)).unwrap();
    assert_eq!(state_of(&snap, 3), PhaseState::Go);
    for other in [1u8, 2, 4, 5, 6, 7, 8] {
        assert_eq!(state_of(&snap, other), PhaseState::Stop, "phase {other} should stay at STOP");
    }

    // go = 125 ticks, caution = 40 ticks, rclr = 10 ticks (175 total) land
    // on MIN_STOP; min_stop defaults to zero, so one further tick clears
    // MIN_STOP to STOP.
    let idle = idle_inbound();
    for _ in 0..(125 + 40 + 10 - 1) {
        rt.tick(&idle).unwrap();
    }
    let snap = rt.tick(&idle).unwrap().1;
    assert_eq!(state_of(&snap, 3), PhaseState::MinStop);
    let snap = rt.tick(&idle).unwrap().1;
    assert_eq!(state_of(&snap, 3), PhaseState::Stop);

    for other in [1u8, 2, 4, 5, 6, 7, 8] {
        assert_eq!(state_of(&snap, other), PhaseState::Stop);
    }
}

/// Barrier lock with a mid-service concurrent promotion.
#[test]
fn barrier_lock_holds_cross_barrier_call_and_promotes_concurrent_partner() {
    let mut rt = runtime_from(BASE_TOML);
    let idle = idle_inbound();

    // Simultaneous calls on phase 2 (ring 0, barrier 0) and phase 4 (ring 0,
    // barrier 1). Both compete for ring 0; phase 2 wins the tie (lower id).
    let mut both = idle_inbound();
    both.levels[1] = true; // phase 2
    both.rising[1] = true;
    both.levels[3] = true; // phase 4
    both.rising[3] = true;
    let (_out, snap) = rt.tick(&both).unwrap();
    assert_eq!(state_of(&snap, 2), PhaseState::Go);
    assert_eq!(status_of(&snap, 2), PhaseStatus::Leader);
    // Phase 4 is outside the active barrier (barrier 1 vs. barrier 0) and
    // must not be promoted to NEXT or LEADER while barrier 0 is active.
    assert_eq!(state_of(&snap, 4), PhaseState::Stop);
    assert_ne!(status_of(&snap, 4), PhaseStatus::Leader);
    assert_ne!(status_of(&snap, 4), PhaseStatus::Next);

    // A handful of idle ticks while phase 2 is still serving.
    for _ in 0..5 {
        rt.tick(&idle).unwrap();
    }

    // Mid-service of 2, a call arrives on phase 6 (ring 1, same barrier 0).
    let (_out, snap) = rt.tick(&call_inbound(6)).unwrap();
    assert_eq!(state_of(&snap, 6), PhaseState::Go);
    assert_eq!(status_of(&snap, 6), PhaseStatus::Secondary);
    assert_eq!(status_of(&snap, 2), PhaseStatus::Leader);
    assert_eq!(state_of(&snap, 4), PhaseState::Stop, "phase 4 still waits for barrier 0 to clear");

    // Run both phase 2 and phase 6 out to STOP (125 go + 40 caution + 10
    // rclr + 1 extra for MIN_STOP, plus a little slack).
    let mut snap = snap;
    for _ in 0..(125 + 40 + 10 + 5) {
        snap = rt.tick(&idle).unwrap().1;
    }
    assert_eq!(state_of(&snap, 2), PhaseState::Stop);
    assert_eq!(state_of(&snap, 6), PhaseState::Stop);

    // Barrier 0 has cleared; phase 4's held call can now be granted.
    let snap = rt.tick(&idle).unwrap().1;
    assert_eq!(state_of(&snap, 4), PhaseState::Go);
}

/// CET boot flashes for `cet-delay` seconds, then transitions to NORMAL.
#[test]
fn cet_boot_flashes_then_transitions_to_normal_after_delay() {
    let doc = BASE_TOML.replace("mode = \"normal\"", "mode = \"cet\"");
    let mut rt = runtime_from(&doc);
    assert_eq!(rt.mode(), ControlMode::Cet);

    let idle = idle_inbound();
    // cet-delay = 4.0s at the default 0.1s tick size = 40 ticks.
    for _ in 0..39 {
        rt.tick(&idle).unwrap();
        assert_eq!(rt.mode(), ControlMode::Cet);
    }
    rt.tick(&idle).unwrap();
    assert_eq!(rt.mode(), ControlMode::Normal);
}

/// Idle recall keeps re-offering the configured phases forever, with the
/// barrier never crossing away from them absent other demand.
#[test]
fn idle_recall_keeps_reoffering_configured_phases_indefinitely() {
    let doc = format!("{BASE_TOML}\n[idling]\nphases = [2, 6]\n");
    let mut rt = runtime_from(&doc);
    let idle = idle_inbound();

    let (_out, snap) = rt.tick(&idle).unwrap();
    assert_eq!(state_of(&snap, 2), PhaseState::Go);
    assert_eq!(state_of(&snap, 6), PhaseState::Go);
    assert_eq!(state_of(&snap, 1), PhaseState::Stop);
    assert_eq!(state_of(&snap, 5), PhaseState::Stop);

    // 125 (go) + 40 (caution) + 10 (rclr) = 175 ticks lands both phases on
    // MIN_STOP. Phases 1 and 5 are never in `idling.phases` and must stay
    // at STOP throughout.
    let mut snap = snap;
    for _ in 0..(125 + 40 + 10) {
        snap = rt.tick(&idle).unwrap().1;
        assert_eq!(state_of(&snap, 1), PhaseState::Stop);
        assert_eq!(state_of(&snap, 5), PhaseState::Stop);
    }
    assert_eq!(state_of(&snap, 2), PhaseState::MinStop);
    assert_eq!(state_of(&snap, 6), PhaseState::MinStop);

    // One further tick clears MIN_STOP (min-stop defaults to zero) to STOP.
    let snap = rt.tick(&idle).unwrap().1;
    assert_eq!(state_of(&snap, 2), PhaseState::Stop);
    assert_eq!(state_of(&snap, 6), PhaseState::Stop);

    // The ring-barrier scheduler sees last tick's (now-STOP) state at the
    // start of this next tick and immediately re-offers both idling phases.
    let snap = rt.tick(&idle).unwrap().1;
    assert_eq!(state_of(&snap, 2), PhaseState::Go);
    assert_eq!(state_of(&snap, 6), PhaseState::Go);
    assert_eq!(state_of(&snap, 1), PhaseState::Stop);
    assert_eq!(state_of(&snap, 5), PhaseState::Stop);
}
