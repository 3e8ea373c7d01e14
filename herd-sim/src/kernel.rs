// src/kernel.rs
// Core simulation kernel: virtual time, priority queue for messages,
// and message delivery into agents.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use log::{debug, info, warn};

use crate::agents::Agent;
use crate::events::{EventBus, SimEvent};
use crate::latency::LatencyModel;
use crate::messages::{AgentId, Message, MessagePayload, MessageType, SimulatorApi};

/// Internal wrapper for messages to implement ordering in a BinaryHeap.
/// We want a min-heap by `(at, seq)` (earliest messages first, send order
/// among equal timestamps), but BinaryHeap is a max-heap, so we invert it.
struct ScheduledMessage {
    msg: Message,
    seq: u64,
}

impl Eq for ScheduledMessage {}

impl PartialEq for ScheduledMessage {
    fn eq(&self, other: &Self) -> bool {
        self.msg.at == other.msg.at && self.seq == other.seq
    }
}

impl Ord for ScheduledMessage {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .msg
            .at
            .cmp(&self.msg.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ScheduledMessage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub end_ns: u64,
    pub messages_delivered: u64,
    pub messages_dropped: u64,
}

/// Simulation kernel.
/// Owns the agents, virtual time, the message queue and the EventBus.
pub struct Kernel {
    time_ns: u64,
    latency: Box<dyn LatencyModel>,
    queue: BinaryHeap<ScheduledMessage>,
    next_seq: u64,
    /// Latest delivery time handed out per (from, to) pair; keeps each pair FIFO.
    last_delivery: HashMap<(AgentId, AgentId), u64>,
    agents: Vec<Option<Box<dyn Agent>>>,
    slots: HashMap<AgentId, usize>,
    event_bus: EventBus,
}

impl Kernel {
    /// Create a new kernel with given latency model, starting at `start_ns`.
    pub fn new(latency: Box<dyn LatencyModel>, start_ns: u64) -> Self {
        Self {
            time_ns: start_ns,
            latency,
            queue: BinaryHeap::new(),
            next_seq: 0,
            last_delivery: HashMap::new(),
            agents: Vec::new(),
            slots: HashMap::new(),
            event_bus: EventBus::new(),
        }
    }

    /// Access to the event bus (for SimEngine to subscribe loggers).
    pub fn event_bus_mut(&mut self) -> &mut EventBus {
        &mut self.event_bus
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Add a new agent into the simulation.
    pub fn add_agent(&mut self, mut agent: Box<dyn Agent>) {
        let id = agent.id();
        debug!("[Kernel] registering agent {} (id={})", agent.name(), id);
        if self.slots.contains_key(&id) {
            warn!("[Kernel] agent id={} registered twice, replacing previous instance", id);
        }
        // Let the agent initialize itself using the simulator API.
        agent.on_start(self);
        match self.slots.get(&id) {
            Some(&idx) => self.agents[idx] = Some(agent),
            None => {
                self.slots.insert(id, self.agents.len());
                self.agents.push(Some(agent));
            }
        }
    }

    /// Deliver messages in time order until the queue drains or the next
    /// message lies beyond `stop_ns`, then stop every agent.
    pub fn run(&mut self, stop_ns: u64) -> RunSummary {
        info!(
            "[Kernel] starting simulation with {} agents at t={} ns, stop at {} ns",
            self.agents.len(),
            self.time_ns,
            stop_ns
        );

        let mut delivered = 0u64;
        let mut dropped = 0u64;

        while let Some(next) = self.queue.peek() {
            if next.msg.at > stop_ns {
                break;
            }

            let Some(ScheduledMessage { msg, .. }) = self.queue.pop() else {
                break;
            };
            self.time_ns = self.time_ns.max(msg.at);

            let Some(&idx) = self.slots.get(&msg.to) else {
                warn!(
                    "[Kernel] message scheduled for unknown agent id={} -> dropped: {:?}",
                    msg.to, msg.msg_type
                );
                dropped += 1;
                continue;
            };

            // Temporarily move the agent out of its slot to avoid aliasing
            // &mut self and &mut agent at the same time.
            let Some(mut agent) = self.agents[idx].take() else {
                dropped += 1;
                continue;
            };
            {
                let sim: &mut dyn SimulatorApi = self;
                match msg.msg_type {
                    MessageType::Wakeup => agent.on_wakeup(sim, msg.at),
                    _ => agent.on_message(sim, &msg),
                }
            }
            self.agents[idx] = Some(agent);
            delivered += 1;
        }

        if self.time_ns < stop_ns && !self.queue.is_empty() {
            self.time_ns = stop_ns;
        }

        // Notify agents that we are stopping.
        for idx in 0..self.agents.len() {
            if let Some(mut agent) = self.agents[idx].take() {
                agent.on_stop(self);
                self.agents[idx] = Some(agent);
            }
        }

        info!(
            "[Kernel] simulation finished at {} ns: delivered={} dropped={} pending={}",
            self.time_ns,
            delivered,
            dropped,
            self.queue.len()
        );

        RunSummary {
            end_ns: self.time_ns,
            messages_delivered: delivered,
            messages_dropped: dropped,
        }
    }

    fn push(&mut self, msg: Message) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(ScheduledMessage { msg, seq });
    }

    fn log_order_message(&mut self, msg: &Message) {
        let (symbol, side, price, qty) = match &msg.payload {
            MessagePayload::LimitOrder(p) => (Some(p.symbol.clone()), Some(p.side), Some(p.price), Some(p.qty)),
            MessagePayload::MarketOrder(p) => (Some(p.symbol.clone()), Some(p.side), None, Some(p.qty)),
            MessagePayload::CancelOrder(p) => (Some(p.symbol.clone()), None, None, None),
            _ => (None, None, None, None),
        };

        self.event_bus.emit(SimEvent::OrderLog {
            ts: self.time_ns,
            from: msg.from,
            to: msg.to,
            msg_type: msg.msg_type,
            symbol,
            side,
            price,
            qty,
        });
    }
}

impl SimulatorApi for Kernel {
    fn now_ns(&self) -> u64 {
        self.time_ns
    }

    fn send_delayed(
        &mut self,
        from: AgentId,
        to: AgentId,
        kind: MessageType,
        payload: MessagePayload,
        extra_delay_ns: u64,
    ) {
        let network = self.latency.delay_ns(from, to);
        let compute = self.latency.compute_ns(to);
        let mut at = self
            .time_ns
            .saturating_add(network)
            .saturating_add(compute)
            .saturating_add(extra_delay_ns);

        let last = self.last_delivery.entry((from, to)).or_insert(0);
        at = at.max(*last);
        *last = at;

        let msg = Message::new(to, from, kind, at, payload);

        if matches!(
            kind,
            MessageType::LimitOrder | MessageType::MarketOrder | MessageType::CancelOrder
        ) {
            self.log_order_message(&msg);
        }

        self.push(msg);
    }

    fn wakeup(&mut self, agent_id: AgentId, at_ns: u64) {
        let at = at_ns.max(self.time_ns);
        self.push(Message::new_empty(agent_id, agent_id, MessageType::Wakeup, at));
    }

    fn broadcast(&mut self, from: AgentId, kind: MessageType, payload: MessagePayload) {
        let mut ids: Vec<AgentId> = self.slots.keys().copied().filter(|&id| id != from).collect();
        ids.sort_unstable();
        for id in ids {
            self.send(from, id, kind, payload.clone());
        }
    }

    fn emit(&mut self, event: SimEvent) {
        self.event_bus.emit(event);
    }
}
