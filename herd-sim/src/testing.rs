//! In-memory `SimulatorApi` for unit tests: records everything, delivers nothing.

use crate::events::SimEvent;
use crate::messages::{AgentId, MessagePayload, MessageType, SimulatorApi};

#[derive(Debug, Clone)]
pub struct Sent {
    pub from: AgentId,
    pub to: AgentId,
    pub kind: MessageType,
    pub payload: MessagePayload,
    pub extra_delay_ns: u64,
}

#[derive(Default)]
pub struct RecordingSim {
    pub now: u64,
    pub sent: Vec<Sent>,
    pub wakeups: Vec<(AgentId, u64)>,
    pub broadcasts: Vec<(AgentId, MessageType)>,
    pub events: Vec<SimEvent>,
}

impl RecordingSim {
    pub fn new(now: u64) -> Self {
        Self {
            now,
            ..Self::default()
        }
    }

    pub fn sent_of(&self, kind: MessageType) -> Vec<&Sent> {
        self.sent.iter().filter(|s| s.kind == kind).collect()
    }

    pub fn clear(&mut self) {
        self.sent.clear();
        self.wakeups.clear();
        self.broadcasts.clear();
        self.events.clear();
    }
}

impl SimulatorApi for RecordingSim {
    fn now_ns(&self) -> u64 {
        self.now
    }

    fn send_delayed(
        &mut self,
        from: AgentId,
        to: AgentId,
        kind: MessageType,
        payload: MessagePayload,
        extra_delay_ns: u64,
    ) {
        self.sent.push(Sent {
            from,
            to,
            kind,
            payload,
            extra_delay_ns,
        });
    }

    fn wakeup(&mut self, agent_id: AgentId, at_ns: u64) {
        self.wakeups.push((agent_id, at_ns));
    }

    fn broadcast(&mut self, from: AgentId, kind: MessageType, _payload: MessagePayload) {
        self.broadcasts.push((from, kind));
    }

    fn emit(&mut self, event: SimEvent) {
        self.events.push(event);
    }
}
