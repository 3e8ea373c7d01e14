use serde::{Deserialize, Serialize};

use crate::messages::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    OrderPlaced,
    OrderAccepted,
    OrderExecuted,
    OrderCancelled,
}

impl SignalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::OrderPlaced => "ORDER_PLACED",
            SignalKind::OrderAccepted => "ORDER_ACCEPTED",
            SignalKind::OrderExecuted => "ORDER_EXECUTED",
            SignalKind::OrderCancelled => "ORDER_CANCELLED",
        }
    }

    pub fn is_cancellation(self) -> bool {
        self == SignalKind::OrderCancelled
    }
}

/// Immutable payload the leader fans out. `price` of 0 means market order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub kind: SignalKind,
    pub symbol: String,
    pub quantity: u64,
    pub side: Side,
    pub price: u64,
}

impl Signal {
    pub fn is_market(&self) -> bool {
        self.price == 0
    }
}

/// Which exchange confirmation makes the leader broadcast a new order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPolicy {
    /// Broadcast as soon as the order is sent.
    #[default]
    Placement,
    /// Broadcast when the exchange accepts the order.
    Acceptance,
    /// Broadcast each fill of the order.
    Execution,
}

impl TriggerPolicy {
    pub fn signal_kind(self) -> SignalKind {
        match self {
            TriggerPolicy::Placement => SignalKind::OrderPlaced,
            TriggerPolicy::Acceptance => SignalKind::OrderAccepted,
            TriggerPolicy::Execution => SignalKind::OrderExecuted,
        }
    }
}
