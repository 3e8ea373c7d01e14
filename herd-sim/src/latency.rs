// latency.rs
// Latency models defining how long messages take to travel between agents
// and how much "compute time" the receiver needs.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::messages::AgentId;

/// Speed of light in meters per nanosecond.
const LIGHT_METERS_PER_NS: f64 = 0.299_792_458;

/// Latency model for simulated network + compute delays.
pub trait LatencyModel {
    /// Network delay for a message travelling from `from` to `to`.
    fn delay_ns(&self, from: AgentId, to: AgentId) -> u64;

    /// Optional compute time on the receiver side.
    fn compute_ns(&self, _agent_id: AgentId) -> u64 {
        0
    }
}

/// Very simple latency model: fixed network and compute delays for all messages.
pub struct FixedLatency {
    network_delay_ns: u64,
    compute_delay_ns: u64,
}

impl FixedLatency {
    /// Create a fixed-latency model.
    /// `network_delay_ns` - delay for any message.
    /// `compute_delay_ns` - extra compute delay.
    pub fn new(network_delay_ns: u64, compute_delay_ns: u64) -> Self {
        Self {
            network_delay_ns,
            compute_delay_ns,
        }
    }
}

impl LatencyModel for FixedLatency {
    fn delay_ns(&self, _from: AgentId, _to: AgentId) -> u64 {
        self.network_delay_ns
    }

    fn compute_ns(&self, _agent_id: AgentId) -> u64 {
        self.compute_delay_ns
    }
}

/// Agents scattered uniformly along a line; latency is light travel time
/// between their positions. Positions are drawn once, so every pair has a
/// fixed latency for the whole run.
pub struct PairwiseLatency {
    positions: HashMap<AgentId, f64>,
    min_delay_ns: u64,
    compute_delay_ns: u64,
}

impl PairwiseLatency {
    pub fn on_line(agents: &[AgentId], length_meters: f64, compute_delay_ns: u64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let positions = agents
            .iter()
            .map(|&id| (id, rng.gen_range(0.0..=length_meters.max(0.0))))
            .collect();

        Self {
            positions,
            min_delay_ns: 1,
            compute_delay_ns,
        }
    }
}

impl LatencyModel for PairwiseLatency {
    fn delay_ns(&self, from: AgentId, to: AgentId) -> u64 {
        let light_ns = match (self.positions.get(&from), self.positions.get(&to)) {
            (Some(a), Some(b)) => ((a - b).abs() / LIGHT_METERS_PER_NS).round() as u64,
            _ => 0,
        };
        light_ns.max(self.min_delay_ns)
    }

    fn compute_ns(&self, _agent_id: AgentId) -> u64 {
        self.compute_delay_ns
    }
}
