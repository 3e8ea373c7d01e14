use crate::events::SimEvent;
use crate::herd::Signal;

pub use order_book::{OrderId, Side};

pub type AgentId = u32;

/// Build a process-unique order id from the owning agent and its own counter.
pub fn make_order_id(agent: AgentId, seq: u32) -> OrderId {
    ((agent as u64) << 32) | seq as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Wakeup,
    MarketHoursRequest,
    MarketHours,
    MarketClosed,
    QuerySpread,
    SpreadResponse,
    LimitOrder,
    MarketOrder,
    CancelOrder,
    OrderAccepted,
    OrderExecuted,
    OrderCancelled,
    SlaveDelayRequest,
    SlaveDelayResponse,
    MasterSignal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketHoursPayload {
    pub open_ns: u64,
    pub close_ns: u64,
}

/// Best price and resting size on one side of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub price: u64,
    pub qty: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadPayload {
    pub symbol: String,
    pub bid: Option<Quote>,
    pub ask: Option<Quote>,
    pub last_trade: Option<u64>,
    pub mkt_closed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitOrderPayload {
    pub order_id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub qty: u64,
    pub price: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketOrderPayload {
    pub order_id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub qty: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelOrderPayload {
    pub order_id: OrderId,
    pub symbol: String,
}

/// Exchange view of an order as reported back to its owner.
/// `price` of 0 marks a market order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderInfo {
    pub order_id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub qty: u64,
    pub price: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderExecutedPayload {
    pub order_id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub fill_qty: u64,
    pub fill_price: u64,
    pub remaining_qty: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayResponsePayload {
    pub delay_ns: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePayload {
    Empty,
    Symbol(String),
    MarketHours(MarketHoursPayload),
    Spread(SpreadPayload),
    LimitOrder(LimitOrderPayload),
    MarketOrder(MarketOrderPayload),
    CancelOrder(CancelOrderPayload),
    Order(OrderInfo),
    OrderExecuted(OrderExecutedPayload),
    DelayResponse(DelayResponsePayload),
    Signal(Signal),
}

/// Core message type that flows through the Kernel.
#[derive(Debug, Clone)]
pub struct Message {
    pub to: AgentId,
    pub from: AgentId,
    pub msg_type: MessageType,
    /// Simulation time in nanoseconds when this message should be delivered.
    pub at: u64,
    pub payload: MessagePayload,
}

impl Message {
    pub fn new(to: AgentId, from: AgentId, msg_type: MessageType, at: u64, payload: MessagePayload) -> Self {
        Self {
            to,
            from,
            msg_type,
            at,
            payload,
        }
    }

    /// Helper constructor for a message with empty payload.
    pub fn new_empty(to: AgentId, from: AgentId, msg_type: MessageType, at: u64) -> Self {
        Self::new(to, from, msg_type, at, MessagePayload::Empty)
    }
}

/// Minimal interface that the kernel exposes to agents.
pub trait SimulatorApi {
    /// Return current simulation time in nanoseconds.
    fn now_ns(&self) -> u64;

    /// Send a message with an explicit extra delay on top of network latency.
    fn send_delayed(
        &mut self,
        from: AgentId,
        to: AgentId,
        kind: MessageType,
        payload: MessagePayload,
        extra_delay_ns: u64,
    );

    /// Send a message from one agent to another.
    fn send(&mut self, from: AgentId, to: AgentId, kind: MessageType, payload: MessagePayload) {
        self.send_delayed(from, to, kind, payload, 0);
    }

    /// Schedule a wakeup for a specific agent at the given simulation time.
    fn wakeup(&mut self, agent_id: AgentId, at_ns: u64);

    /// Broadcast a message from one agent to all others.
    fn broadcast(&mut self, from: AgentId, kind: MessageType, payload: MessagePayload);

    /// Publish a high-level event to the event bus.
    fn emit(&mut self, event: SimEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_ids_do_not_collide_across_agents() {
        assert_ne!(make_order_id(1, 0), make_order_id(0, 1));
        assert_eq!(make_order_id(3, 7) >> 32, 3);
        assert_eq!(make_order_id(3, 7) & 0xffff_ffff, 7);
    }
}
