use std::collections::HashMap;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::agents::trading::{ExchangeUpdate, TraderState};
use crate::agents::Agent;
use crate::error::{Result, SimError};
use crate::herd::decision::evaluate;
use crate::herd::{
    DecisionParams, OrderKind, Outcome, RecordOutcome, Signal, SignalBroadcaster, SignalKind, TriggerPolicy,
};
use crate::lifecycle::{AgentRole, SpreadAction, WakeupAction};
use crate::messages::{AgentId, Message, MessagePayload, MessageType, OrderId, Side, SimulatorApi};
use crate::oracle::SharedOracle;

#[derive(Debug, Clone)]
pub struct HerdMasterConfig {
    pub name: String,
    pub exchange_id: AgentId,
    pub symbol: String,
    pub starting_cash: i64,
    /// Observation noise on the fair-value estimate.
    pub sigma_n: f64,
    /// How far ahead the fair value is estimated; also the re-wake interval.
    pub future_window_ns: u64,
    pub decision: DecisionParams,
    pub trigger: TriggerPolicy,
    pub followers: Vec<AgentId>,
    pub seed: u64,
}

/// Leader of a herd: trades against its estimate of future fair value and
/// relays every order it makes to its followers.
pub struct HerdMasterAgent {
    trader: TraderState,
    sigma_n: f64,
    future_window_ns: u64,
    decision: DecisionParams,
    trigger: TriggerPolicy,
    rng: StdRng,
    oracle: SharedOracle,
    broadcaster: SignalBroadcaster,
    /// Orders whose exchange confirmation has not been relayed yet.
    awaiting_trigger: HashMap<OrderId, OrderKind>,
    /// Set once the post-close spread query for the close price went out.
    closing_queried: bool,
    orders_placed: u64,
    signals_sent: u64,
}

impl HerdMasterAgent {
    pub fn new(id: AgentId, config: HerdMasterConfig, oracle: SharedOracle) -> Result<Self> {
        config.decision.validate()?;
        if config.future_window_ns == 0 {
            return Err(SimError::InvalidParameter {
                name: "master.future_window_ns",
                reason: "must be positive".to_string(),
            });
        }

        Ok(Self {
            trader: TraderState::new(id, config.name, config.exchange_id, config.symbol, config.starting_cash),
            sigma_n: config.sigma_n,
            future_window_ns: config.future_window_ns,
            decision: config.decision,
            trigger: config.trigger,
            rng: StdRng::seed_from_u64(config.seed),
            oracle,
            broadcaster: SignalBroadcaster::new(id, config.followers),
            awaiting_trigger: HashMap::new(),
            closing_queried: false,
            orders_placed: 0,
            signals_sent: 0,
        })
    }

    pub fn trader(&self) -> &TraderState {
        &self.trader
    }

    pub fn broadcaster(&self) -> &SignalBroadcaster {
        &self.broadcaster
    }

    fn place_order(&mut self, sim: &mut dyn SimulatorApi) {
        let now_ns = sim.now_ns();
        let close_ns = self.trader.lifecycle.hours().map_or(u64::MAX, |h| h.close_ns);
        let horizon = now_ns.saturating_add(self.future_window_ns);

        // Next cycle: at the horizon, or at the close to pick up the close price.
        sim.wakeup(self.trader.id, horizon.min(close_ns));

        if horizon >= close_ns {
            debug!("[{}] horizon {} past close {}, no order", self.trader.name, horizon, close_ns);
            return;
        }

        let future_fair = self
            .oracle
            .borrow_mut()
            .observe(&self.trader.symbol, horizon, self.sigma_n, &mut self.rng);
        let (bid, ask) = self.trader.touch();
        let holdings = self.trader.holdings();

        let decision = match evaluate(bid, ask, future_fair, holdings, &self.decision, &mut self.rng) {
            Outcome::Trade(decision) => decision,
            Outcome::NoTrade(reason) => {
                debug!("[{}] no trade at {} ns: {:?}", self.trader.name, now_ns, reason);
                return;
            }
        };

        let order_id = match decision.kind {
            OrderKind::Limit => self.trader.place_limit(sim, decision.side, decision.quantity, decision.price),
            OrderKind::Market => self.trader.place_market(sim, decision.side, decision.quantity),
        };
        self.orders_placed += 1;
        debug!(
            "[{}] {:?} {} @ {} (fair {} at +{} ns, holdings {})",
            self.trader.name,
            decision.side,
            decision.quantity,
            decision.reported_price(),
            future_fair,
            self.future_window_ns,
            holdings
        );

        match self.trigger {
            TriggerPolicy::Placement => {
                self.relay(sim, self.trigger.signal_kind(), decision.side, decision.quantity, decision.reported_price());
            }
            TriggerPolicy::Acceptance | TriggerPolicy::Execution => {
                self.awaiting_trigger.insert(order_id, decision.kind);
            }
        }
    }

    fn relay(&mut self, sim: &mut dyn SimulatorApi, kind: SignalKind, side: Side, quantity: u64, price: u64) {
        let signal = Signal {
            kind,
            symbol: self.trader.symbol.clone(),
            quantity,
            side,
            price,
        };
        let report = self.broadcaster.broadcast(sim, &signal);
        self.signals_sent += report.delivered.len() as u64;
    }

    fn on_delay_response(&mut self, from: AgentId, delay_ns: u64) {
        match self.broadcaster.record_delay(from, delay_ns) {
            Some(RecordOutcome::Registered) => {
                debug!("[{}] follower {} relay delay {} ns", self.trader.name, from, delay_ns);
                if self.broadcaster.registry().len() == self.broadcaster.followers().len() {
                    info!(
                        "[{}] delay handshake complete with {} followers",
                        self.trader.name,
                        self.broadcaster.followers().len()
                    );
                }
            }
            Some(RecordOutcome::Unchanged) | Some(RecordOutcome::Conflict { .. }) | None => {}
        }
    }

    fn on_exchange_update(&mut self, sim: &mut dyn SimulatorApi, update: ExchangeUpdate) {
        match update {
            ExchangeUpdate::Spread(SpreadAction::Evaluate) => self.place_order(sim),
            ExchangeUpdate::Spread(SpreadAction::Stale) if !self.closing_queried => {
                // The close landed while our query was in flight: come back
                // once more to pick up the close price.
                let close_ns = self.trader.lifecycle.hours().map_or(sim.now_ns(), |h| h.close_ns);
                debug!("[{}] spread went stale at the close, re-waking at {}", self.trader.name, close_ns);
                sim.wakeup(self.trader.id, close_ns);
            }
            ExchangeUpdate::Accepted(order) => {
                if self.trigger == TriggerPolicy::Acceptance && self.awaiting_trigger.remove(&order.order_id).is_some() {
                    self.relay(sim, self.trigger.signal_kind(), order.side, order.qty, order.price);
                }
            }
            ExchangeUpdate::Executed(fill) => {
                if self.trigger == TriggerPolicy::Execution && self.awaiting_trigger.contains_key(&fill.order_id) {
                    if fill.remaining_qty == 0 {
                        self.awaiting_trigger.remove(&fill.order_id);
                    }
                    self.relay(sim, self.trigger.signal_kind(), fill.side, fill.fill_qty, fill.fill_price);
                }
            }
            ExchangeUpdate::Cancelled(order) => {
                self.awaiting_trigger.remove(&order.order_id);
                self.relay(sim, SignalKind::OrderCancelled, order.side, order.qty, order.price);
            }
            ExchangeUpdate::Hours
            | ExchangeUpdate::Closed
            | ExchangeUpdate::Spread(_)
            | ExchangeUpdate::Unhandled => {}
        }
    }
}

impl Agent for HerdMasterAgent {
    fn id(&self) -> AgentId {
        self.trader.id
    }

    fn name(&self) -> &str {
        &self.trader.name
    }

    fn on_start(&mut self, sim: &mut dyn SimulatorApi) {
        info!(
            "[{}] starting: symbol={} followers={} trigger={:?} strategy={:?}",
            self.trader.name,
            self.trader.symbol,
            self.broadcaster.followers().len(),
            self.trigger,
            self.decision.strategy
        );
        let now = sim.now_ns();
        sim.wakeup(self.trader.id, now);
    }

    fn on_wakeup(&mut self, sim: &mut dyn SimulatorApi, now_ns: u64) {
        let action = self.trader.handle_wakeup(sim, AgentRole::Leader, now_ns);
        match action {
            WakeupAction::DiscoverHours { request_delays: true } => {
                let sent = self.broadcaster.request_delays(sim);
                debug!("[{}] relay delay requested from {} followers", self.trader.name, sent);
            }
            WakeupAction::QueryClosingSpread => self.closing_queried = true,
            WakeupAction::CancelAndQuerySpread { .. } => {
                // Market orders never rest; whatever fills they got have arrived by now.
                let orders = &self.trader.orders;
                self.awaiting_trigger.retain(|id, kind| *kind == OrderKind::Limit && orders.get(*id).is_some());
            }
            _ => {}
        }
    }

    fn on_message(&mut self, sim: &mut dyn SimulatorApi, msg: &Message) {
        if msg.msg_type == MessageType::SlaveDelayResponse {
            if let MessagePayload::DelayResponse(response) = &msg.payload {
                self.on_delay_response(msg.from, response.delay_ns);
            }
            return;
        }

        let update = self.trader.on_exchange_message(sim, msg);
        self.on_exchange_update(sim, update);
    }

    fn on_stop(&mut self, sim: &mut dyn SimulatorApi) {
        info!(
            "[{}] stopping: orders={} signals={} delays_known={}/{}",
            self.trader.name,
            self.orders_placed,
            self.signals_sent,
            self.broadcaster.registry().len(),
            self.broadcaster.followers().len()
        );
        self.trader.report_valuation(sim, &self.oracle, &mut self.rng);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::herd::OrderStrategy;
    use crate::lifecycle::Session;
    use crate::messages::{
        DelayResponsePayload, MarketHoursPayload, OrderExecutedPayload, OrderInfo, Quote, SpreadPayload,
    };
    use crate::oracle::ScheduledOracle;
    use crate::testing::RecordingSim;

    const OPEN: u64 = 1_000;
    const CLOSE: u64 = 1_000_000;
    const WINDOW: u64 = 10_000;

    fn master(trigger: TriggerPolicy, fair: u64) -> HerdMasterAgent {
        let oracle: SharedOracle = Rc::new(RefCell::new(ScheduledOracle::new().with_value("ABM", 0, fair)));
        let config = HerdMasterConfig {
            name: "master".to_string(),
            exchange_id: 0,
            symbol: "ABM".to_string(),
            starting_cash: 10_000_000,
            sigma_n: 0.0,
            future_window_ns: WINDOW,
            decision: DecisionParams {
                percent_aggr: 1.0,
                depth_spread: 2.0,
                size: 10,
                strategy: OrderStrategy::Limit,
            },
            trigger,
            followers: vec![5, 6],
            seed: 1,
        };
        let mut m = HerdMasterAgent::new(1, config, oracle).unwrap();
        m.trader.lifecycle.set_hours(MarketHoursPayload {
            open_ns: OPEN,
            close_ns: CLOSE,
        });
        m
    }

    fn from_exchange(msg_type: MessageType, payload: MessagePayload) -> Message {
        Message::new(1, 0, msg_type, 0, payload)
    }

    fn spread(bid: u64, ask: u64) -> Message {
        from_exchange(
            MessageType::SpreadResponse,
            MessagePayload::Spread(SpreadPayload {
                symbol: "ABM".to_string(),
                bid: Some(Quote { price: bid, qty: 10 }),
                ask: Some(Quote { price: ask, qty: 10 }),
                last_trade: None,
                mkt_closed: false,
            }),
        )
    }

    fn with_known_delays(m: &mut HerdMasterAgent, sim: &mut RecordingSim) {
        for (follower, delay) in [(5, 7), (6, 300)] {
            let msg = Message::new(
                1,
                follower,
                MessageType::SlaveDelayResponse,
                0,
                MessagePayload::DelayResponse(DelayResponsePayload { delay_ns: delay }),
            );
            m.on_message(sim, &msg);
        }
    }

    #[test]
    fn first_wakeup_asks_hours_and_delays() {
        let oracle: SharedOracle = Rc::new(RefCell::new(ScheduledOracle::new()));
        let config = HerdMasterConfig {
            name: "master".to_string(),
            exchange_id: 0,
            symbol: "ABM".to_string(),
            starting_cash: 1,
            sigma_n: 0.0,
            future_window_ns: 1,
            decision: DecisionParams::default(),
            trigger: TriggerPolicy::Placement,
            followers: vec![5, 6],
            seed: 0,
        };
        let mut m = HerdMasterAgent::new(1, config, oracle).unwrap();
        let mut sim = RecordingSim::new(0);
        m.on_wakeup(&mut sim, 0);

        assert_eq!(sim.sent_of(MessageType::MarketHoursRequest).len(), 1);
        assert_eq!(sim.sent_of(MessageType::SlaveDelayRequest).len(), 2);
    }

    #[test]
    fn placement_trigger_relays_with_each_followers_delay() {
        let mut sim = RecordingSim::new(OPEN);
        let mut m = master(TriggerPolicy::Placement, 100_100);
        with_known_delays(&mut m, &mut sim);

        m.on_wakeup(&mut sim, OPEN);
        m.on_message(&mut sim, &spread(100_000, 100_050));

        let orders = sim.sent_of(MessageType::LimitOrder);
        assert_eq!(orders.len(), 1);
        let signals = sim.sent_of(MessageType::MasterSignal);
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].extra_delay_ns, 7);
        assert_eq!(signals[1].extra_delay_ns, 300);
        match &signals[0].payload {
            MessagePayload::Signal(s) => {
                assert_eq!(s.kind, SignalKind::OrderPlaced);
                assert_eq!(s.side, Side::Buy);
                assert_eq!(s.price, 100_050);
                assert_eq!(s.quantity, 10);
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert!(sim.wakeups.contains(&(1, OPEN + WINDOW)));
    }

    #[test]
    fn priced_in_book_places_nothing_but_rewakes() {
        let mut sim = RecordingSim::new(OPEN);
        let mut m = master(TriggerPolicy::Placement, 100_020);
        with_known_delays(&mut m, &mut sim);

        m.on_wakeup(&mut sim, OPEN);
        m.on_message(&mut sim, &spread(100_000, 100_050));

        assert!(sim.sent_of(MessageType::LimitOrder).is_empty());
        assert!(sim.sent_of(MessageType::MasterSignal).is_empty());
        assert!(sim.wakeups.contains(&(1, OPEN + WINDOW)));
    }

    #[test]
    fn acceptance_trigger_waits_for_confirmation() {
        let mut sim = RecordingSim::new(OPEN);
        let mut m = master(TriggerPolicy::Acceptance, 100_100);
        with_known_delays(&mut m, &mut sim);

        m.on_wakeup(&mut sim, OPEN);
        m.on_message(&mut sim, &spread(100_000, 100_050));
        assert!(sim.sent_of(MessageType::MasterSignal).is_empty());

        let order_id = match &sim.sent_of(MessageType::LimitOrder)[0].payload {
            MessagePayload::LimitOrder(p) => p.order_id,
            other => panic!("unexpected payload {other:?}"),
        };
        let accepted = from_exchange(
            MessageType::OrderAccepted,
            MessagePayload::Order(OrderInfo {
                order_id,
                symbol: "ABM".to_string(),
                side: Side::Buy,
                qty: 10,
                price: 100_050,
            }),
        );
        m.on_message(&mut sim, &accepted);
        m.on_message(&mut sim, &accepted);

        let signals = sim.sent_of(MessageType::MasterSignal);
        assert_eq!(signals.len(), 2, "one copy per follower, only once");
    }

    #[test]
    fn execution_trigger_relays_each_fill() {
        let mut sim = RecordingSim::new(OPEN);
        let mut m = master(TriggerPolicy::Execution, 100_100);
        with_known_delays(&mut m, &mut sim);

        m.on_wakeup(&mut sim, OPEN);
        m.on_message(&mut sim, &spread(100_000, 100_050));
        let order_id = match &sim.sent_of(MessageType::LimitOrder)[0].payload {
            MessagePayload::LimitOrder(p) => p.order_id,
            other => panic!("unexpected payload {other:?}"),
        };

        for (fill_qty, remaining_qty) in [(4, 6), (6, 0)] {
            let executed = from_exchange(
                MessageType::OrderExecuted,
                MessagePayload::OrderExecuted(OrderExecutedPayload {
                    order_id,
                    symbol: "ABM".to_string(),
                    side: Side::Buy,
                    fill_qty,
                    fill_price: 100_050,
                    remaining_qty,
                }),
            );
            m.on_message(&mut sim, &executed);
        }

        let quantities: Vec<u64> = sim
            .sent_of(MessageType::MasterSignal)
            .iter()
            .filter_map(|s| match &s.payload {
                MessagePayload::Signal(sig) if sig.kind == SignalKind::OrderExecuted => Some(sig.quantity),
                _ => None,
            })
            .collect();
        assert_eq!(quantities, vec![4, 4, 6, 6]);
        assert_eq!(m.trader().holdings(), 10);
    }

    #[test]
    fn cancellations_are_always_relayed() {
        let mut sim = RecordingSim::new(OPEN);
        let mut m = master(TriggerPolicy::Execution, 100_100);
        with_known_delays(&mut m, &mut sim);

        let cancelled = from_exchange(
            MessageType::OrderCancelled,
            MessagePayload::Order(OrderInfo {
                order_id: 99,
                symbol: "ABM".to_string(),
                side: Side::Sell,
                qty: 3,
                price: 100_010,
            }),
        );
        m.on_message(&mut sim, &cancelled);

        let signals = sim.sent_of(MessageType::MasterSignal);
        assert_eq!(signals.len(), 2);
        assert!(matches!(
            &signals[0].payload,
            MessagePayload::Signal(s) if s.kind == SignalKind::OrderCancelled
        ));
    }

    #[test]
    fn short_master_buys_exactly_to_flat() {
        let mut sim = RecordingSim::new(OPEN);
        let mut m = master(TriggerPolicy::Placement, 100_100);
        with_known_delays(&mut m, &mut sim);
        m.trader.portfolio.holdings = -5;

        m.on_wakeup(&mut sim, OPEN);
        m.on_message(&mut sim, &spread(100_000, 100_050));

        match &sim.sent_of(MessageType::MasterSignal)[0].payload {
            MessagePayload::Signal(s) => assert_eq!(s.quantity, 5),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn close_during_spread_query_still_learns_close_price() {
        let mut sim = RecordingSim::new(OPEN);
        let mut m = master(TriggerPolicy::Placement, 100_100);
        m.on_wakeup(&mut sim, OPEN);

        let closed_spread = |last_trade| {
            from_exchange(
                MessageType::SpreadResponse,
                MessagePayload::Spread(SpreadPayload {
                    symbol: "ABM".to_string(),
                    bid: Some(Quote { price: 100_000, qty: 10 }),
                    ask: Some(Quote { price: 100_050, qty: 10 }),
                    last_trade,
                    mkt_closed: true,
                }),
            )
        };

        sim.clear();
        m.on_message(&mut sim, &closed_spread(None));
        assert!(sim.sent_of(MessageType::LimitOrder).is_empty());
        assert_eq!(sim.wakeups, vec![(1, CLOSE)]);

        sim.clear();
        m.on_wakeup(&mut sim, CLOSE);
        assert_eq!(sim.sent_of(MessageType::QuerySpread).len(), 1);

        sim.clear();
        m.on_message(&mut sim, &closed_spread(Some(100_010)));
        assert_eq!(m.trader().lifecycle.session(), Session::Finished);
        assert_eq!(m.trader().lifecycle.close_price(), Some(100_010));
        assert!(sim.wakeups.is_empty(), "one closing query only");
        assert!(sim.sent.is_empty());
    }

    #[test]
    fn near_close_wakes_at_close_without_order() {
        let mut sim = RecordingSim::new(CLOSE - 10);
        let mut m = master(TriggerPolicy::Placement, 100_100);
        m.on_wakeup(&mut sim, CLOSE - 10);
        m.on_message(&mut sim, &spread(100_000, 100_050));

        assert!(sim.sent_of(MessageType::LimitOrder).is_empty());
        assert!(sim.wakeups.contains(&(1, CLOSE)));
    }
}
