use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::error::{BookError, Result};
use crate::types::{Execution, Fill, Level, OrderId, OwnerId, RestingOrder, Side};

/// Price-time priority book for one symbol.
///
/// Bids and asks are kept as price levels, each a FIFO queue of resting
/// orders. An index from order id to (side, price) makes cancellation
/// independent of book depth.
pub struct OrderBook {
    bids: BTreeMap<u64, VecDeque<RestingOrder>>,
    asks: BTreeMap<u64, VecDeque<RestingOrder>>,
    index: HashMap<OrderId, (Side, u64)>,
    last_trade: Option<u64>,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: HashMap::new(),
            last_trade: None,
        }
    }

    /// Submit a limit order. Whatever does not cross rests at `price`.
    pub fn place_limit(&mut self, id: OrderId, owner: OwnerId, side: Side, price: u64, qty: u64) -> Result<Execution> {
        if qty == 0 {
            return Err(BookError::ZeroQuantity);
        }
        if price == 0 {
            return Err(BookError::ZeroPrice(id));
        }
        if self.index.contains_key(&id) {
            return Err(BookError::DuplicateOrder(id));
        }

        let (fills, remaining) = self.sweep(id, owner, side, Some(price), qty);

        let resting = if remaining > 0 {
            let order = RestingOrder {
                id,
                owner,
                side,
                price,
                qty: remaining,
            };
            let levels = match side {
                Side::Buy => &mut self.bids,
                Side::Sell => &mut self.asks,
            };
            levels.entry(price).or_default().push_back(order.clone());
            self.index.insert(id, (side, price));
            Some(order)
        } else {
            None
        };

        Ok(Execution {
            fills,
            resting,
            discarded: 0,
        })
    }

    /// Submit a market order. It never rests; the unfilled part is discarded.
    pub fn place_market(&mut self, id: OrderId, owner: OwnerId, side: Side, qty: u64) -> Result<Execution> {
        if qty == 0 {
            return Err(BookError::ZeroQuantity);
        }

        let (fills, remaining) = self.sweep(id, owner, side, None, qty);
        Ok(Execution {
            fills,
            resting: None,
            discarded: remaining,
        })
    }

    /// Remove a resting order and return what was left of it.
    pub fn cancel(&mut self, id: OrderId) -> Result<RestingOrder> {
        let (side, price) = self.index.remove(&id).ok_or(BookError::UnknownOrder(id))?;
        let levels = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };

        let queue = levels.get_mut(&price).ok_or(BookError::UnknownOrder(id))?;
        let pos = queue.iter().position(|o| o.id == id).ok_or(BookError::UnknownOrder(id))?;
        let order = queue.remove(pos).ok_or(BookError::UnknownOrder(id))?;
        if queue.is_empty() {
            levels.remove(&price);
        }
        Ok(order)
    }

    pub fn best_bid(&self) -> Option<Level> {
        self.bids.iter().next_back().map(|(price, queue)| Level {
            price: *price,
            qty: queue.iter().map(|o| o.qty).sum(),
        })
    }

    pub fn best_ask(&self) -> Option<Level> {
        self.asks.iter().next().map(|(price, queue)| Level {
            price: *price,
            qty: queue.iter().map(|o| o.qty).sum(),
        })
    }

    pub fn last_trade(&self) -> Option<u64> {
        self.last_trade
    }

    pub fn order(&self, id: OrderId) -> Option<&RestingOrder> {
        let (side, price) = self.index.get(&id)?;
        let levels = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        levels.get(price)?.iter().find(|o| o.id == id)
    }

    /// Number of orders `owner` currently has resting in this book.
    pub fn resting_count_for(&self, owner: OwnerId) -> usize {
        self.bids
            .values()
            .chain(self.asks.values())
            .flat_map(|q| q.iter())
            .filter(|o| o.owner == owner)
            .count()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Match an incoming order against the opposite side, best price first and
    /// oldest first within a price. Returns the fills and the unmatched quantity.
    fn sweep(
        &mut self,
        taker_order: OrderId,
        taker_owner: OwnerId,
        taker_side: Side,
        limit: Option<u64>,
        mut remaining: u64,
    ) -> (Vec<Fill>, u64) {
        let mut fills = Vec::new();

        while remaining > 0 {
            let level = match taker_side {
                Side::Buy => self.asks.first_entry(),
                Side::Sell => self.bids.last_entry(),
            };
            let Some(mut level) = level else { break };

            let price = *level.key();
            let crosses = match (taker_side, limit) {
                (_, None) => true,
                (Side::Buy, Some(limit)) => price <= limit,
                (Side::Sell, Some(limit)) => price >= limit,
            };
            if !crosses {
                break;
            }

            let queue = level.get_mut();
            while remaining > 0 {
                let Some(maker) = queue.front_mut() else { break };
                let qty = remaining.min(maker.qty);
                maker.qty -= qty;
                remaining -= qty;

                fills.push(Fill {
                    maker_order: maker.id,
                    maker_owner: maker.owner,
                    taker_order,
                    taker_owner,
                    taker_side,
                    price,
                    qty,
                    maker_remaining: maker.qty,
                });

                if maker.qty == 0 {
                    let filled = maker.id;
                    queue.pop_front();
                    self.index.remove(&filled);
                }
            }

            if queue.is_empty() {
                level.remove();
            }
        }

        if let Some(last) = fills.last() {
            self.last_trade = Some(last.price);
        }

        (fills, remaining)
    }
}
