//! State and plumbing shared by every trading agent: market hours, lifecycle,
//! portfolio, own orders, and the request/confirmation traffic with the
//! exchange.

use log::{debug, info};
use rand::rngs::StdRng;

use crate::events::SimEvent;
use crate::lifecycle::{AgentRole, Lifecycle, SpreadAction, WakeupAction};
use crate::messages::{
    make_order_id, AgentId, CancelOrderPayload, LimitOrderPayload, MarketOrderPayload, Message, MessagePayload,
    MessageType, OrderExecutedPayload, OrderId, OrderInfo, Side, SimulatorApi, SpreadPayload,
};
use crate::open_orders::{OpenOrder, OpenOrderStore};
use crate::oracle::SharedOracle;

/// Cash in cents and signed share holdings. Only exchange fills move it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Portfolio {
    pub cash: i64,
    pub holdings: i64,
    pub starting_cash: i64,
}

impl Portfolio {
    pub fn new(starting_cash: i64) -> Self {
        Self {
            cash: starting_cash,
            holdings: 0,
            starting_cash,
        }
    }

    pub fn apply_fill(&mut self, side: Side, qty: u64, price: u64) {
        let qty = qty as i64;
        let notional = qty.saturating_mul(price as i64);
        match side {
            Side::Buy => {
                self.holdings += qty;
                self.cash -= notional;
            }
            Side::Sell => {
                self.holdings -= qty;
                self.cash += notional;
            }
        }
    }

    /// Mark-to-fundamental return relative to starting cash.
    pub fn surplus(&self, mark_price: u64) -> f64 {
        if self.starting_cash == 0 {
            return 0.0;
        }
        let value = mark_price as f64 * self.holdings as f64 + self.cash as f64;
        (value - self.starting_cash as f64) / self.starting_cash as f64
    }
}

/// What an exchange message changed in the trader state.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeUpdate {
    Hours,
    Closed,
    Spread(SpreadAction),
    Accepted(OrderInfo),
    Executed(OrderExecutedPayload),
    Cancelled(OrderInfo),
    /// Not an exchange message.
    Unhandled,
}

pub struct TraderState {
    pub id: AgentId,
    pub name: String,
    pub exchange_id: AgentId,
    pub symbol: String,
    pub lifecycle: Lifecycle,
    pub portfolio: Portfolio,
    pub orders: OpenOrderStore,
    next_seq: u32,
    last_spread: Option<SpreadPayload>,
}

impl TraderState {
    pub fn new(id: AgentId, name: String, exchange_id: AgentId, symbol: String, starting_cash: i64) -> Self {
        Self {
            id,
            name,
            exchange_id,
            symbol,
            lifecycle: Lifecycle::new(),
            portfolio: Portfolio::new(starting_cash),
            orders: OpenOrderStore::new(),
            next_seq: 0,
            last_spread: None,
        }
    }

    pub fn holdings(&self) -> i64 {
        self.portfolio.holdings
    }

    /// Best bid and ask prices from the last spread response.
    pub fn touch(&self) -> (Option<u64>, Option<u64>) {
        match &self.last_spread {
            Some(s) => (s.bid.map(|q| q.price), s.ask.map(|q| q.price)),
            None => (None, None),
        }
    }

    /// Run the lifecycle for a wakeup and perform the exchange traffic every
    /// role shares. Role-specific work is left to the caller.
    pub fn handle_wakeup(&mut self, sim: &mut dyn SimulatorApi, role: AgentRole, now_ns: u64) -> WakeupAction {
        let action = self.lifecycle.on_wakeup(role, now_ns);
        match action {
            WakeupAction::DiscoverHours { .. } => self.request_market_hours(sim),
            WakeupAction::AwaitOpen { open_ns } => sim.wakeup(self.id, open_ns),
            WakeupAction::Idle => {}
            WakeupAction::QueryClosingSpread => self.query_spread(sim),
            WakeupAction::CancelAndQuerySpread { first_trading } => {
                if first_trading {
                    info!("[{}] trading started at {} ns", self.name, now_ns);
                }
                self.cancel_all(sim);
                self.query_spread(sim);
            }
        }
        action
    }

    pub fn request_market_hours(&self, sim: &mut dyn SimulatorApi) {
        sim.send(self.id, self.exchange_id, MessageType::MarketHoursRequest, MessagePayload::Empty);
    }

    pub fn query_spread(&self, sim: &mut dyn SimulatorApi) {
        sim.send(
            self.id,
            self.exchange_id,
            MessageType::QuerySpread,
            MessagePayload::Symbol(self.symbol.clone()),
        );
    }

    fn next_order_id(&mut self) -> OrderId {
        let id = make_order_id(self.id, self.next_seq);
        self.next_seq = self.next_seq.wrapping_add(1);
        id
    }

    pub fn place_limit(&mut self, sim: &mut dyn SimulatorApi, side: Side, qty: u64, price: u64) -> OrderId {
        let order_id = self.next_order_id();
        self.orders.insert(OpenOrder {
            id: order_id,
            symbol: self.symbol.clone(),
            side,
            price,
            qty,
            cancel_pending: false,
        });
        let payload = MessagePayload::LimitOrder(LimitOrderPayload {
            order_id,
            symbol: self.symbol.clone(),
            side,
            qty,
            price,
        });
        debug!("[{}] LIMIT {:?} {} @ {} (id={})", self.name, side, qty, price, order_id);
        sim.send(self.id, self.exchange_id, MessageType::LimitOrder, payload);
        order_id
    }

    pub fn place_market(&mut self, sim: &mut dyn SimulatorApi, side: Side, qty: u64) -> OrderId {
        let order_id = self.next_order_id();
        let payload = MessagePayload::MarketOrder(MarketOrderPayload {
            order_id,
            symbol: self.symbol.clone(),
            side,
            qty,
        });
        debug!("[{}] MARKET {:?} {} (id={})", self.name, side, qty, order_id);
        sim.send(self.id, self.exchange_id, MessageType::MarketOrder, payload);
        order_id
    }

    /// Cancel every open order on our symbol. Returns how many cancels were sent.
    pub fn cancel_all(&mut self, sim: &mut dyn SimulatorApi) -> usize {
        let ids = self.orders.mark_cancel_pending(&self.symbol);
        for &order_id in &ids {
            let payload = MessagePayload::CancelOrder(CancelOrderPayload {
                order_id,
                symbol: self.symbol.clone(),
            });
            sim.send(self.id, self.exchange_id, MessageType::CancelOrder, payload);
        }
        ids.len()
    }

    /// Mark holdings to the noise-free fundamental, log the end-of-day
    /// surplus and publish it. Returns the surplus.
    pub fn report_valuation(&self, sim: &mut dyn SimulatorApi, oracle: &SharedOracle, rng: &mut StdRng) -> f64 {
        let now_ns = sim.now_ns();
        let r_t = oracle.borrow_mut().observe(&self.symbol, now_ns, 0.0, rng);
        let surplus = self.portfolio.surplus(r_t);
        info!(
            "[{}] final report: holdings={} cash={} start_cash={} fundamental={} surplus={:.6}",
            self.name, self.portfolio.holdings, self.portfolio.cash, self.portfolio.starting_cash, r_t, surplus
        );
        sim.emit(SimEvent::FinalValuation {
            ts: now_ns,
            agent: self.id,
            name: self.name.clone(),
            holdings: self.portfolio.holdings,
            cash: self.portfolio.cash,
            surplus,
        });
        surplus
    }

    /// Apply an exchange message to lifecycle, portfolio and order store.
    pub fn on_exchange_message(&mut self, sim: &mut dyn SimulatorApi, msg: &Message) -> ExchangeUpdate {
        match (&msg.msg_type, &msg.payload) {
            (MessageType::MarketHours, MessagePayload::MarketHours(hours)) => {
                debug!(
                    "[{}] market hours open={} close={}",
                    self.name, hours.open_ns, hours.close_ns
                );
                self.lifecycle.set_hours(*hours);
                sim.wakeup(self.id, hours.open_ns);
                ExchangeUpdate::Hours
            }
            (MessageType::MarketClosed, _) => {
                if !self.lifecycle.is_market_closed() {
                    info!("[{}] market closed at {} ns", self.name, sim.now_ns());
                }
                self.lifecycle.mark_closed();
                ExchangeUpdate::Closed
            }
            (MessageType::SpreadResponse, MessagePayload::Spread(spread)) => {
                let action = self.lifecycle.on_spread(spread.mkt_closed, spread.last_trade);
                if action == SpreadAction::Evaluate {
                    self.last_spread = Some(spread.clone());
                }
                ExchangeUpdate::Spread(action)
            }
            (MessageType::OrderAccepted, MessagePayload::Order(info)) => ExchangeUpdate::Accepted(info.clone()),
            (MessageType::OrderExecuted, MessagePayload::OrderExecuted(fill)) => {
                self.portfolio.apply_fill(fill.side, fill.fill_qty, fill.fill_price);
                self.orders.apply_fill(fill.order_id, fill.remaining_qty);
                ExchangeUpdate::Executed(fill.clone())
            }
            (MessageType::OrderCancelled, MessagePayload::Order(info)) => {
                self.orders.remove(info.order_id);
                ExchangeUpdate::Cancelled(info.clone())
            }
            _ => ExchangeUpdate::Unhandled,
        }
    }
}
