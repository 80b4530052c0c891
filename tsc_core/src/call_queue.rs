//! Call queue: deduplicated, aged, weighted set of pending service requests.

use tsc_common::model::CallSource;

/// A single pending or in-service request for a phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Call {
    pub target_phase: u8,
    pub ped_service: bool,
    pub age_s: f64,
    pub served: bool,
    pub weight: f64,
    pub source: CallSource,
}

impl Call {
    fn new(target_phase: u8, ped_service: bool, weight: f64, source: CallSource) -> Self {
        Self {
            target_phase,
            ped_service,
            age_s: 0.0,
            served: false,
            weight,
            source,
        }
    }
}

/// Tunable knobs for call prioritization, sourced from the `[calls]` config
/// extension section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallWeights {
    pub duplicate_factor: f64,
    pub system_weight: f64,
    pub active_barrier_bonus: f64,
    pub max_age_s: f64,
}

impl Default for CallWeights {
    fn default() -> Self {
        Self {
            duplicate_factor: 1.5,
            system_weight: 0.1,
            active_barrier_bonus: 2.0,
            max_age_s: 120.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CallQueue {
    calls: Vec<Call>,
}

impl CallQueue {
    pub fn new() -> Self {
        Self { calls: Vec::new() }
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Insert a new call, or — if an unserved call already exists for this
    /// `(target, ped_service)` pair — bump its weight by `weight *
    /// duplicate_factor` and reset its age.
    pub fn place(
        &mut self,
        target_phase: u8,
        ped_service: bool,
        source: CallSource,
        weight: f64,
        weights: &CallWeights,
    ) {
        if let Some(existing) = self
            .calls
            .iter_mut()
            .find(|c| !c.served && c.target_phase == target_phase && c.ped_service == ped_service)
        {
            existing.weight += weight * weights.duplicate_factor;
            existing.age_s = 0.0;
            return;
        }
        self.calls.push(Call::new(target_phase, ped_service, weight, source));
    }

    /// Age every call by `dt`, then drop calls past `max_age_s` and any
    /// call marked served by the previous tick's `served()` call.
    pub fn age(&mut self, dt_s: f64, weights: &CallWeights) {
        for c in &mut self.calls {
            c.age_s += dt_s;
        }
        self.calls.retain(|c| !c.served && c.age_s < weights.max_age_s);
    }

    /// Mark the matching unserved call as served. It is dropped on the
    /// following `age` pass once consumers have had a chance to observe it.
    pub fn served(&mut self, target_phase: u8, ped_service: bool) {
        if let Some(c) = self
            .calls
            .iter_mut()
            .find(|c| !c.served && c.target_phase == target_phase && c.ped_service == ped_service)
        {
            c.served = true;
        }
    }

    /// Unserved calls in decreasing priority order.
    pub fn ranked(&self, active_barrier: Option<&[u8]>, weights: &CallWeights) -> Vec<Call> {
        let mut pending: Vec<Call> = self.calls.iter().copied().filter(|c| !c.served).collect();
        pending.sort_by(|a, b| {
            let pa = priority(a, active_barrier, weights);
            let pb = priority(b, active_barrier, weights);
            pb.partial_cmp(&pa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.target_phase.cmp(&b.target_phase))
        });
        pending
    }

    /// True if an unserved call already targets `(phase, ped_service)`.
    pub fn has_pending(&self, target_phase: u8, ped_service: bool) -> bool {
        self.calls
            .iter()
            .any(|c| !c.served && c.target_phase == target_phase && c.ped_service == ped_service)
    }
}

fn priority(call: &Call, active_barrier: Option<&[u8]>, weights: &CallWeights) -> f64 {
    let bonus = match active_barrier {
        Some(phases) if phases.contains(&call.target_phase) => weights.active_barrier_bonus,
        _ => 0.0,
    };
    call.weight + call.age_s * weights.system_weight + bonus
}
