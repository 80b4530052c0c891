//! Ring-barrier scheduler: concurrency control across two rings and two
//! barriers, selecting the next servable phase per ring each tick.

use std::collections::HashMap;

use tsc_common::model::{Barrier, PhaseState, Ring};

use crate::call_queue::{CallQueue, CallWeights};

/// Per-ring selection for this tick. `None` means the ring keeps whatever
/// it is currently doing (no new phase to grant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Decision {
    pub next: [Option<u8>; 2],
    /// The highest-ranked eligible candidate for a ring that is currently
    /// busy serving another phase — not granted this tick, but surfaced so
    /// the runtime can tag it `NEXT`.
    pub held: [Option<u8>; 2],
}

/// The scheduler asserts this before ever returning a decision; surfacing
/// it means a fatal bug, not a recoverable condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("scheduler invariant violation: {0}")]
pub struct SchedulerInvariantViolation(pub &'static str);

pub struct Scheduler {
    rings: [Ring; 2],
    barriers: [Barrier; 2],
    idling_phases: Vec<u8>,
    last_served: [Option<u8>; 2],
}

impl Scheduler {
    pub fn new(rings: [Ring; 2], barriers: [Barrier; 2], idling_phases: Vec<u8>) -> Self {
        Self {
            rings,
            barriers,
            idling_phases,
            last_served: [None, None],
        }
    }

    fn ring_of(&self, phase: u8) -> Option<usize> {
        self.rings.iter().position(|r| r.phases.contains(&phase))
    }

    fn barrier_of(&self, phase: u8) -> Option<usize> {
        self.barriers.iter().position(|b| b.contains(phase))
    }

    /// Note a phase that just began service, so future tie-breaks prefer
    /// ring-forward order from it.
    pub fn note_granted(&mut self, phase: u8) {
        if let Some(ring_idx) = self.ring_of(phase) {
            self.last_served[ring_idx] = Some(phase);
        }
    }

    /// `active_barrier`: the barrier containing any currently non-STOP
    /// phase, or `None` if every phase is at STOP/MIN_STOP.
    pub fn active_barrier(&self, states: &HashMap<u8, PhaseState>) -> Option<usize> {
        for (idx, barrier) in self.barriers.iter().enumerate() {
            if barrier
                .phases
                .iter()
                .any(|&p| states.get(&p).copied().unwrap_or_default().is_active())
            {
                return Some(idx);
            }
        }
        None
    }

    pub fn select(
        &self,
        states: &HashMap<u8, PhaseState>,
        queue: &CallQueue,
        weights: &CallWeights,
    ) -> Result<Decision, SchedulerInvariantViolation> {
        let active_idx = self.active_barrier(states);
        let active_phases: Option<&[u8]> = active_idx.map(|i| self.barriers[i].phases.as_slice());
        let ranked = queue.ranked(active_phases, weights);

        // Determine which barrier is "in play" this tick: the one already
        // active, or — when every phase is clear — the barrier holding the
        // single highest-priority demand (barrier crossing, rule 6).
        let target_idx = active_idx
            .or_else(|| ranked.first().and_then(|c| self.barrier_of(c.target_phase)));

        let mut next = [None, None];
        let mut held = [None, None];
        for ring_idx in 0..2 {
            let ring_busy = self.rings[ring_idx]
                .phases
                .iter()
                .any(|&p| states.get(&p).copied().unwrap_or_default().is_active());

            let eligible = |p: u8| -> bool {
                self.ring_of(p) == Some(ring_idx)
                    && target_idx.is_none_or(|idx| self.barrier_of(p) == Some(idx))
            };

            // Prefer ring-forward order among calls of equal top priority;
            // otherwise take the highest-ranked eligible call.
            let top_priority_candidate = ranked.iter().find(|c| eligible(c.target_phase));

            if ring_busy {
                held[ring_idx] = top_priority_candidate.map(|c| c.target_phase);
                continue;
            }
            let forward_candidate = self.last_served[ring_idx]
                .and_then(|last| self.rings[ring_idx].next_after(last))
                .filter(|&p| eligible(p) && queue.has_pending(p, false));

            let candidate = match (forward_candidate, top_priority_candidate) {
                (Some(fwd), Some(top)) if approx_eq(
                    priority_of(&ranked, fwd, active_phases, weights),
                    priority_of(&ranked, top.target_phase, active_phases, weights),
                ) => Some(fwd),
                (_, Some(top)) => Some(top.target_phase),
                (Some(fwd), None) => Some(fwd),
                (None, None) => None,
            };

            let candidate = candidate.or_else(|| {
                self.idling_phases
                    .iter()
                    .copied()
                    .find(|&p| eligible(p))
            });

            next[ring_idx] = candidate;
        }

        let chosen_barriers: Vec<usize> = next
            .iter()
            .flatten()
            .filter_map(|&p| self.barrier_of(p))
            .collect();
        if let (Some(&first), true) = (
            chosen_barriers.first(),
            chosen_barriers.iter().any(|b| *b != chosen_barriers[0]),
        ) {
            let _ = first;
            return Err(SchedulerInvariantViolation(
                "concurrent grant spans two barriers",
            ));
        }

        Ok(Decision { next, held })
    }
}

fn priority_of(
    ranked: &[crate::call_queue::Call],
    phase: u8,
    active_barrier: Option<&[u8]>,
    weights: &CallWeights,
) -> f64 {
    ranked
        .iter()
        .find(|c| c.target_phase == phase)
        .map(|c| {
            let bonus = match active_barrier {
                Some(phases) if phases.contains(&phase) => weights.active_barrier_bonus,
                _ => 0.0,
            };
            c.weight + c.age_s * weights.system_weight + bonus
        })
        .unwrap_or(f64::NEG_INFINITY)
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
