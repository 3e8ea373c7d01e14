use std::collections::HashMap;

use crate::messages::{OrderId, Side};

/// An agent's own limit order as it believes it rests on the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOrder {
    pub id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub price: u64,
    /// Remaining quantity after the fills seen so far.
    pub qty: u64,
    /// A cancel was sent and its confirmation is still in flight.
    pub cancel_pending: bool,
}

/// Per-agent store of open orders, indexed by id and by symbol.
#[derive(Debug, Default)]
pub struct OpenOrderStore {
    orders: HashMap<OrderId, OpenOrder>,
    by_symbol: HashMap<String, Vec<OrderId>>,
}

impl OpenOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, order: OpenOrder) {
        self.by_symbol.entry(order.symbol.clone()).or_default().push(order.id);
        self.orders.insert(order.id, order);
    }

    pub fn remove(&mut self, order_id: OrderId) -> Option<OpenOrder> {
        let order = self.orders.remove(&order_id)?;
        if let Some(ids) = self.by_symbol.get_mut(&order.symbol) {
            ids.retain(|&id| id != order_id);
        }
        Some(order)
    }

    pub fn get(&self, order_id: OrderId) -> Option<&OpenOrder> {
        self.orders.get(&order_id)
    }

    pub fn get_by_symbol(&self, symbol: &str) -> Vec<&OpenOrder> {
        self.by_symbol
            .get(symbol)
            .map(|ids| ids.iter().filter_map(|id| self.orders.get(id)).collect())
            .unwrap_or_default()
    }

    /// Apply a fill. The order is dropped once nothing remains.
    pub fn apply_fill(&mut self, order_id: OrderId, remaining_qty: u64) {
        if remaining_qty == 0 {
            self.remove(order_id);
        } else if let Some(order) = self.orders.get_mut(&order_id) {
            order.qty = remaining_qty;
        }
    }

    /// Mark every order on `symbol` as being cancelled and return the ids that
    /// were not already marked.
    pub fn mark_cancel_pending(&mut self, symbol: &str) -> Vec<OrderId> {
        let Some(ids) = self.by_symbol.get(symbol) else {
            return Vec::new();
        };
        let mut marked = Vec::new();
        for id in ids {
            if let Some(order) = self.orders.get_mut(id) {
                if !order.cancel_pending {
                    order.cancel_pending = true;
                    marked.push(*id);
                }
            }
        }
        marked
    }

    /// Orders on `symbol` not being cancelled.
    pub fn live_count(&self, symbol: &str) -> usize {
        self.get_by_symbol(symbol)
            .into_iter()
            .filter(|o| !o.cancel_pending)
            .count()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
