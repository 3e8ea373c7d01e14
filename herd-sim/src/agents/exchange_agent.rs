use std::collections::HashMap;

use log::{debug, info, warn};
use order_book::{Execution, OrderBook};

use crate::agents::Agent;
use crate::error::{Result, SimError};
use crate::events::SimEvent;
use crate::messages::{
    AgentId, CancelOrderPayload, LimitOrderPayload, MarketHoursPayload, MarketOrderPayload, Message, MessagePayload,
    MessageType, OrderExecutedPayload, OrderInfo, Quote, Side, SimulatorApi, SpreadPayload,
};

/// Continuous double auction over one order book per symbol, open between
/// `open_ns` and `close_ns`.
pub struct ExchangeAgent {
    id: AgentId,
    name: String,
    hours: MarketHoursPayload,
    books: HashMap<String, OrderBook>,
    close_announced: bool,
    trades: u64,
}

impl ExchangeAgent {
    pub fn new(id: AgentId, name: String, symbols: &[String], open_ns: u64, close_ns: u64) -> Result<Self> {
        if open_ns >= close_ns {
            return Err(SimError::InvalidMarketHours { open_ns, close_ns });
        }
        let books = symbols
            .iter()
            .map(|s| (s.clone(), OrderBook::new()))
            .collect();
        Ok(Self {
            id,
            name,
            hours: MarketHoursPayload { open_ns, close_ns },
            books,
            close_announced: false,
            trades: 0,
        })
    }

    pub fn book(&self, symbol: &str) -> Option<&OrderBook> {
        self.books.get(symbol)
    }

    fn is_closed(&self, now_ns: u64) -> bool {
        now_ns >= self.hours.close_ns
    }

    fn spread_for(&self, symbol: &str, now_ns: u64) -> SpreadPayload {
        let book = self.books.get(symbol);
        let quote = |level: order_book::Level| Quote {
            price: level.price,
            qty: level.qty,
        };
        SpreadPayload {
            symbol: symbol.to_string(),
            bid: book.and_then(|b| b.best_bid()).map(quote),
            ask: book.and_then(|b| b.best_ask()).map(quote),
            last_trade: book.and_then(|b| b.last_trade()),
            mkt_closed: self.is_closed(now_ns),
        }
    }

    fn reject_closed(&self, sim: &mut dyn SimulatorApi, to: AgentId, symbol: &str) {
        debug!("[Exchange {}] order from {} after close rejected", self.name, to);
        sim.send(self.id, to, MessageType::MarketClosed, MessagePayload::Symbol(symbol.to_string()));
    }

    fn process_limit_order(&mut self, sim: &mut dyn SimulatorApi, from: AgentId, order: &LimitOrderPayload) {
        let now_ns = sim.now_ns();
        if self.is_closed(now_ns) {
            self.reject_closed(sim, from, &order.symbol);
            return;
        }
        let Some(book) = self.books.get_mut(&order.symbol) else {
            warn!("[Exchange {}] LIMIT from {}: unknown symbol {}", self.name, from, order.symbol);
            return;
        };

        let execution = match book.place_limit(order.order_id, from, order.side, order.price, order.qty) {
            Ok(execution) => execution,
            Err(e) => {
                warn!("[Exchange {}] LIMIT from {} rejected: {}", self.name, from, e);
                return;
            }
        };

        let accepted = OrderInfo {
            order_id: order.order_id,
            symbol: order.symbol.clone(),
            side: order.side,
            qty: order.qty,
            price: order.price,
        };
        sim.send(self.id, from, MessageType::OrderAccepted, MessagePayload::Order(accepted));

        self.report_fills(sim, &order.symbol, order.qty, &execution);
    }

    fn process_market_order(&mut self, sim: &mut dyn SimulatorApi, from: AgentId, order: &MarketOrderPayload) {
        let now_ns = sim.now_ns();
        if self.is_closed(now_ns) {
            self.reject_closed(sim, from, &order.symbol);
            return;
        }
        let Some(book) = self.books.get_mut(&order.symbol) else {
            warn!("[Exchange {}] MARKET from {}: unknown symbol {}", self.name, from, order.symbol);
            return;
        };

        let execution = match book.place_market(order.order_id, from, order.side, order.qty) {
            Ok(execution) => execution,
            Err(e) => {
                warn!("[Exchange {}] MARKET from {} rejected: {}", self.name, from, e);
                return;
            }
        };

        let accepted = OrderInfo {
            order_id: order.order_id,
            symbol: order.symbol.clone(),
            side: order.side,
            qty: order.qty,
            price: 0,
        };
        sim.send(self.id, from, MessageType::OrderAccepted, MessagePayload::Order(accepted));

        if execution.discarded > 0 {
            debug!(
                "[Exchange {}] MARKET {} from {}: {} unfilled, discarded",
                self.name, order.order_id, from, execution.discarded
            );
        }
        self.report_fills(sim, &order.symbol, order.qty, &execution);
    }

    /// Notify both counterparties of every fill and publish the trades.
    fn report_fills(&mut self, sim: &mut dyn SimulatorApi, symbol: &str, taker_qty: u64, execution: &Execution) {
        let now_ns = sim.now_ns();
        let mut taker_left = taker_qty;

        for fill in &execution.fills {
            taker_left = taker_left.saturating_sub(fill.qty);
            let maker_side = fill.taker_side.opposite();

            let maker = OrderExecutedPayload {
                order_id: fill.maker_order,
                symbol: symbol.to_string(),
                side: maker_side,
                fill_qty: fill.qty,
                fill_price: fill.price,
                remaining_qty: fill.maker_remaining,
            };
            sim.send(self.id, fill.maker_owner, MessageType::OrderExecuted, MessagePayload::OrderExecuted(maker));

            let taker = OrderExecutedPayload {
                order_id: fill.taker_order,
                symbol: symbol.to_string(),
                side: fill.taker_side,
                fill_qty: fill.qty,
                fill_price: fill.price,
                remaining_qty: taker_left,
            };
            sim.send(self.id, fill.taker_owner, MessageType::OrderExecuted, MessagePayload::OrderExecuted(taker));

            let (buyer, seller) = match fill.taker_side {
                Side::Buy => (fill.taker_owner, fill.maker_owner),
                Side::Sell => (fill.maker_owner, fill.taker_owner),
            };
            sim.emit(SimEvent::Trade {
                ts: now_ns,
                symbol: symbol.to_string(),
                price: fill.price,
                qty: fill.qty,
                buyer,
                seller,
            });
            self.trades += 1;
        }
    }

    fn process_cancel(&mut self, sim: &mut dyn SimulatorApi, from: AgentId, cancel: &CancelOrderPayload) {
        let Some(book) = self.books.get_mut(&cancel.symbol) else {
            warn!("[Exchange {}] CANCEL from {}: unknown symbol {}", self.name, from, cancel.symbol);
            return;
        };

        match book.order(cancel.order_id) {
            Some(resting) if resting.owner != from => {
                warn!(
                    "[Exchange {}] CANCEL of order {} from non-owner {} ignored",
                    self.name, cancel.order_id, from
                );
                return;
            }
            Some(_) => {}
            None => {
                // Filled or cancelled already; the owner learns that from the fill.
                debug!("[Exchange {}] CANCEL of unknown order {} from {}", self.name, cancel.order_id, from);
                return;
            }
        }

        if let Ok(resting) = book.cancel(cancel.order_id) {
            let info = OrderInfo {
                order_id: resting.id,
                symbol: cancel.symbol.clone(),
                side: resting.side,
                qty: resting.qty,
                price: resting.price,
            };
            sim.send(self.id, from, MessageType::OrderCancelled, MessagePayload::Order(info));
        }
    }
}

impl Agent for ExchangeAgent {
    fn id(&self) -> AgentId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn on_start(&mut self, sim: &mut dyn SimulatorApi) {
        info!(
            "[Exchange {}] open={} close={} symbols={:?}",
            self.name,
            self.hours.open_ns,
            self.hours.close_ns,
            self.books.keys().collect::<Vec<_>>()
        );
        sim.wakeup(self.id, self.hours.close_ns);
    }

    fn on_wakeup(&mut self, sim: &mut dyn SimulatorApi, now_ns: u64) {
        if self.is_closed(now_ns) && !self.close_announced {
            self.close_announced = true;
            info!("[Exchange {}] market closed at {} ns, trades={}", self.name, now_ns, self.trades);
            sim.broadcast(self.id, MessageType::MarketClosed, MessagePayload::Empty);
        }
    }

    fn on_message(&mut self, sim: &mut dyn SimulatorApi, msg: &Message) {
        match (&msg.msg_type, &msg.payload) {
            (MessageType::MarketHoursRequest, _) => {
                sim.send(self.id, msg.from, MessageType::MarketHours, MessagePayload::MarketHours(self.hours));
            }
            (MessageType::QuerySpread, MessagePayload::Symbol(symbol)) => {
                let spread = self.spread_for(symbol, sim.now_ns());
                sim.send(self.id, msg.from, MessageType::SpreadResponse, MessagePayload::Spread(spread));
            }
            (MessageType::LimitOrder, MessagePayload::LimitOrder(order)) => {
                self.process_limit_order(sim, msg.from, order);
            }
            (MessageType::MarketOrder, MessagePayload::MarketOrder(order)) => {
                self.process_market_order(sim, msg.from, order);
            }
            (MessageType::CancelOrder, MessagePayload::CancelOrder(cancel)) => {
                self.process_cancel(sim, msg.from, cancel);
            }
            _ => {
                debug!("[Exchange {}] ignoring {:?} from {}", self.name, msg.msg_type, msg.from);
            }
        }
    }

    fn on_stop(&mut self, _sim: &mut dyn SimulatorApi) {
        for (symbol, book) in &self.books {
            info!(
                "[Exchange {}] {} final: last_trade={:?} resting={}",
                self.name,
                symbol,
                book.last_trade(),
                book.len()
            );
        }
    }
}
