use log::{debug, warn};

use crate::events::SimEvent;
use crate::herd::delay_registry::{DelayRegistry, RecordOutcome};
use crate::herd::Signal;
use crate::messages::{AgentId, MessagePayload, MessageType, SimulatorApi};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: Vec<AgentId>,
    /// Followers whose delay is not known yet; they get the next broadcast.
    pub skipped: Vec<AgentId>,
}

/// Fans a leader's signals out to its followers, each copy held back by that
/// follower's relay delay on top of network latency.
pub struct SignalBroadcaster {
    leader: AgentId,
    followers: Vec<AgentId>,
    registry: DelayRegistry,
}

impl SignalBroadcaster {
    pub fn new(leader: AgentId, followers: Vec<AgentId>) -> Self {
        Self {
            leader,
            followers,
            registry: DelayRegistry::new(),
        }
    }

    pub fn followers(&self) -> &[AgentId] {
        &self.followers
    }

    pub fn registry(&self) -> &DelayRegistry {
        &self.registry
    }

    /// Ask every follower for its relay delay. Returns the number of requests sent.
    pub fn request_delays(&self, sim: &mut dyn SimulatorApi) -> usize {
        for &follower in &self.followers {
            sim.send(self.leader, follower, MessageType::SlaveDelayRequest, MessagePayload::Empty);
        }
        self.followers.len()
    }

    /// Store a handshake response. Responses from agents that are not our
    /// followers are ignored and return `None`.
    pub fn record_delay(&mut self, follower: AgentId, delay_ns: u64) -> Option<RecordOutcome> {
        if !self.followers.contains(&follower) {
            warn!(
                "[Broadcaster {}] delay response from non-follower {} ignored",
                self.leader, follower
            );
            return None;
        }
        Some(self.registry.record(follower, delay_ns))
    }

    pub fn broadcast(&self, sim: &mut dyn SimulatorApi, signal: &Signal) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let now = sim.now_ns();

        for &follower in &self.followers {
            let Some(delay_ns) = self.registry.delay_of(follower) else {
                report.skipped.push(follower);
                continue;
            };

            sim.send_delayed(
                self.leader,
                follower,
                MessageType::MasterSignal,
                MessagePayload::Signal(signal.clone()),
                delay_ns,
            );
            sim.emit(SimEvent::SignalRelayed {
                ts: now,
                leader: self.leader,
                follower,
                kind: signal.kind,
                relay_delay_ns: delay_ns,
            });
            report.delivered.push(follower);
        }

        if !report.skipped.is_empty() {
            debug!(
                "[Broadcaster {}] {} sent to {} followers, {} skipped (delay unknown)",
                self.leader,
                signal.kind.as_str(),
                report.delivered.len(),
                report.skipped.len()
            );
        }

        report
    }
}
