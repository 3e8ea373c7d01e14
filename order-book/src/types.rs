pub type OrderId = u64;
pub type OwnerId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Aggregated quantity at one price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    pub price: u64,
    pub qty: u64,
}

/// A limit order waiting in the book. `qty` is the remaining quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestingOrder {
    pub id: OrderId,
    pub owner: OwnerId,
    pub side: Side,
    pub price: u64,
    pub qty: u64,
}

/// One match between an incoming (taker) order and a resting (maker) order.
/// Trades always print at the maker's price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fill {
    pub maker_order: OrderId,
    pub maker_owner: OwnerId,
    pub taker_order: OrderId,
    pub taker_owner: OwnerId,
    pub taker_side: Side,
    pub price: u64,
    pub qty: u64,
    pub maker_remaining: u64,
}

/// Result of submitting an order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Execution {
    pub fills: Vec<Fill>,
    /// Remainder that now rests in the book (limit orders only).
    pub resting: Option<RestingOrder>,
    /// Quantity neither filled nor rested (market orders only).
    pub discarded: u64,
}

impl Execution {
    pub fn filled_qty(&self) -> u64 {
        self.fills.iter().map(|f| f.qty).sum()
    }
}
