use crate::herd::{OrderKind, Signal};
use crate::messages::Side;

/// Order a follower derives from a leader signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorOrder {
    pub side: Side,
    pub quantity: u64,
    /// Limit price, or 0 for a market order.
    pub price: u64,
    pub kind: OrderKind,
}

/// Derive the follower's order from a signal and its own holdings.
///
/// Buys copy the signaled quantity. Sells are capped at the follower's long
/// position when it is long, so a mirrored sell never dumps more than it owns.
/// Cancellation signals produce no order.
pub fn mirror_order(signal: &Signal, holdings: i64) -> Option<MirrorOrder> {
    if signal.kind.is_cancellation() {
        return None;
    }

    let quantity = match signal.side {
        Side::Buy => signal.quantity,
        Side::Sell if holdings > 0 => signal.quantity.min(holdings.unsigned_abs()),
        Side::Sell => signal.quantity,
    };
    if quantity == 0 {
        return None;
    }

    let kind = if signal.is_market() { OrderKind::Market } else { OrderKind::Limit };

    Some(MirrorOrder {
        side: signal.side,
        quantity,
        price: signal.price,
        kind,
    })
}
