use crate::herd::SignalKind;
use crate::messages::{AgentId, MessageType, Side};

#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    OrderLog {
        ts: u64,
        from: AgentId,
        to: AgentId,
        msg_type: MessageType,
        symbol: Option<String>,
        side: Option<Side>,
        price: Option<u64>,
        qty: Option<u64>,
    },

    Trade {
        ts: u64,
        symbol: String,
        price: u64,
        qty: u64,
        buyer: AgentId,
        seller: AgentId,
    },

    /// Leader forwarded a signal to one follower.
    SignalRelayed {
        ts: u64,
        leader: AgentId,
        follower: AgentId,
        kind: SignalKind,
        relay_delay_ns: u64,
    },

    /// Follower acted on a received signal.
    SignalMirrored {
        ts: u64,
        follower: AgentId,
        kind: SignalKind,
        side: Option<Side>,
        qty: u64,
        price: u64,
    },

    FinalValuation {
        ts: u64,
        agent: AgentId,
        name: String,
        holdings: i64,
        cash: i64,
        surplus: f64,
    },
}

pub trait EventListener {
    fn on_event(&mut self, event: &SimEvent);
}

/// Forward events to a closure; handy for scenarios and tests.
pub struct ClosureListener<F: FnMut(&SimEvent)> {
    closure: F,
}

impl<F: FnMut(&SimEvent)> ClosureListener<F> {
    pub fn new(closure: F) -> Self {
        Self { closure }
    }
}

impl<F: FnMut(&SimEvent)> EventListener for ClosureListener<F> {
    fn on_event(&mut self, event: &SimEvent) {
        (self.closure)(event);
    }
}

#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Box<dyn EventListener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { listeners: Vec::new() }
    }

    /// Subscribe a new listener.
    pub fn subscribe(&mut self, listener: Box<dyn EventListener>) {
        self.listeners.push(listener);
    }

    /// Emit an event to all listeners.
    pub fn emit(&mut self, event: SimEvent) {
        for listener in self.listeners.iter_mut() {
            listener.on_event(&event);
        }
    }
}
