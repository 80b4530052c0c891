//! Wire contracts shared between the controller core and the field bus
//! adapter. The adapter ([`tsc_bus`]) owns framing and transport; these
//! types are the logical payload it carries each tick.

use crate::model::LoadSwitchOutput;
use serde::{Deserialize, Serialize};

/// Outbound frame: one load-switch projection per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub control_time_ticks: u64,
    pub switches: Vec<LoadSwitchOutput>,
}

/// Inbound frame: discrete input levels and the edges observed since the
/// previous poll.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InboundFrame {
    pub control_time_ticks: u64,
    pub levels: Vec<bool>,
    pub rising: Vec<bool>,
    pub falling: Vec<bool>,
}

impl InboundFrame {
    pub fn with_input_count(count: usize) -> Self {
        Self {
            control_time_ticks: 0,
            levels: vec![false; count],
            rising: vec![false; count],
            falling: vec![false; count],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_frame_starts_all_low() {
        let f = InboundFrame::with_input_count(4);
        assert_eq!(f.levels.len(), 4);
        assert!(f.levels.iter().all(|&l| !l));
        assert!(f.rising.iter().all(|&r| !r));
    }
}
