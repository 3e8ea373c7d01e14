use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::agents::trading::TraderState;
use crate::agents::Agent;
use crate::events::SimEvent;
use crate::herd::{mirror_order, DelayRange, OrderKind, Signal};
use crate::lifecycle::AgentRole;
use crate::messages::{AgentId, DelayResponsePayload, Message, MessagePayload, MessageType, SimulatorApi};
use crate::oracle::SharedOracle;

#[derive(Debug, Clone)]
pub struct HerdFollowerConfig {
    pub name: String,
    pub exchange_id: AgentId,
    pub symbol: String,
    pub starting_cash: i64,
    pub leader_id: AgentId,
    pub delay_range: DelayRange,
    pub seed: u64,
}

/// Copies its leader's orders after a private relay delay fixed at creation.
pub struct HerdFollowerAgent {
    trader: TraderState,
    leader_id: AgentId,
    relay_delay_ns: u64,
    rng: StdRng,
    oracle: SharedOracle,
    mirrored: u64,
    dropped: u64,
}

impl HerdFollowerAgent {
    pub fn new(id: AgentId, config: HerdFollowerConfig, oracle: SharedOracle) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let relay_delay_ns = config.delay_range.draw(&mut rng);
        Self {
            trader: TraderState::new(id, config.name, config.exchange_id, config.symbol, config.starting_cash),
            leader_id: config.leader_id,
            relay_delay_ns,
            rng,
            oracle,
            mirrored: 0,
            dropped: 0,
        }
    }

    pub fn relay_delay_ns(&self) -> u64 {
        self.relay_delay_ns
    }

    pub fn trader(&self) -> &TraderState {
        &self.trader
    }

    fn on_signal(&mut self, sim: &mut dyn SimulatorApi, from: AgentId, signal: &Signal) {
        if from != self.leader_id {
            debug!("[{}] signal from {} who is not our leader, dropped", self.trader.name, from);
            self.dropped += 1;
            return;
        }
        if signal.symbol != self.trader.symbol {
            debug!("[{}] signal for {} ignored", self.trader.name, signal.symbol);
            self.dropped += 1;
            return;
        }
        if !self.trader.lifecycle.is_trading() {
            debug!(
                "[{}] {} outside trading session ({:?}), dropped",
                self.trader.name,
                signal.kind.as_str(),
                self.trader.lifecycle.session()
            );
            self.dropped += 1;
            return;
        }

        // Never more than one resting order: clear ours before mirroring.
        self.trader.cancel_all(sim);

        let now_ns = sim.now_ns();
        let Some(order) = mirror_order(signal, self.trader.holdings()) else {
            sim.emit(SimEvent::SignalMirrored {
                ts: now_ns,
                follower: self.trader.id,
                kind: signal.kind,
                side: None,
                qty: 0,
                price: 0,
            });
            return;
        };

        match order.kind {
            OrderKind::Limit => {
                self.trader.place_limit(sim, order.side, order.quantity, order.price);
            }
            OrderKind::Market => {
                self.trader.place_market(sim, order.side, order.quantity);
            }
        }
        self.mirrored += 1;
        sim.emit(SimEvent::SignalMirrored {
            ts: now_ns,
            follower: self.trader.id,
            kind: signal.kind,
            side: Some(order.side),
            qty: order.quantity,
            price: order.price,
        });
    }
}

impl Agent for HerdFollowerAgent {
    fn id(&self) -> AgentId {
        self.trader.id
    }

    fn name(&self) -> &str {
        &self.trader.name
    }

    fn on_start(&mut self, sim: &mut dyn SimulatorApi) {
        debug!(
            "[{}] following {} with relay delay {} ns",
            self.trader.name, self.leader_id, self.relay_delay_ns
        );
        let now = sim.now_ns();
        sim.wakeup(self.trader.id, now);
    }

    fn on_wakeup(&mut self, sim: &mut dyn SimulatorApi, now_ns: u64) {
        self.trader.handle_wakeup(sim, AgentRole::Follower, now_ns);
    }

    fn on_message(&mut self, sim: &mut dyn SimulatorApi, msg: &Message) {
        match (&msg.msg_type, &msg.payload) {
            (MessageType::SlaveDelayRequest, _) => {
                let payload = MessagePayload::DelayResponse(DelayResponsePayload {
                    delay_ns: self.relay_delay_ns,
                });
                sim.send(self.trader.id, msg.from, MessageType::SlaveDelayResponse, payload);
            }
            (MessageType::MasterSignal, MessagePayload::Signal(signal)) => {
                self.on_signal(sim, msg.from, signal);
            }
            _ => {
                self.trader.on_exchange_message(sim, msg);
            }
        }
    }

    fn on_stop(&mut self, sim: &mut dyn SimulatorApi) {
        info!(
            "[{}] stopping: mirrored={} dropped={} delay={} ns",
            self.trader.name, self.mirrored, self.dropped, self.relay_delay_ns
        );
        self.trader.report_valuation(sim, &self.oracle, &mut self.rng);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::herd::SignalKind;
    use crate::messages::{MarketHoursPayload, Side};
    use crate::oracle::ScheduledOracle;
    use crate::testing::RecordingSim;

    fn follower(seed: u64) -> HerdFollowerAgent {
        let oracle: SharedOracle = Rc::new(RefCell::new(ScheduledOracle::new()));
        let config = HerdFollowerConfig {
            name: "follower".to_string(),
            exchange_id: 0,
            symbol: "ABM".to_string(),
            starting_cash: 1_000_000,
            leader_id: 1,
            delay_range: DelayRange::new(10, 500).unwrap(),
            seed,
        };
        HerdFollowerAgent::new(5, config, oracle)
    }

    fn trading_follower(sim: &mut RecordingSim) -> HerdFollowerAgent {
        let mut f = follower(3);
        f.trader.lifecycle.set_hours(MarketHoursPayload {
            open_ns: 0,
            close_ns: 1_000_000,
        });
        f.on_wakeup(sim, 0);
        sim.clear();
        f
    }

    fn signal_msg(from: AgentId, kind: SignalKind, side: Side, quantity: u64, price: u64) -> Message {
        Message::new(
            5,
            from,
            MessageType::MasterSignal,
            0,
            MessagePayload::Signal(Signal {
                kind,
                symbol: "ABM".to_string(),
                quantity,
                side,
                price,
            }),
        )
    }

    #[test]
    fn delay_is_drawn_once_in_range() {
        for seed in 0..50 {
            let f = follower(seed);
            assert!((10..500).contains(&f.relay_delay_ns()));
        }
    }

    #[test]
    fn answers_every_delay_request_with_same_value() {
        let mut sim = RecordingSim::new(0);
        let mut f = follower(9);
        let request = Message::new_empty(5, 1, MessageType::SlaveDelayRequest, 0);
        f.on_message(&mut sim, &request);
        f.on_message(&mut sim, &request);

        let responses = sim.sent_of(MessageType::SlaveDelayResponse);
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].payload, responses[1].payload);
        assert_eq!(
            responses[0].payload,
            MessagePayload::DelayResponse(DelayResponsePayload {
                delay_ns: f.relay_delay_ns()
            })
        );
    }

    #[test]
    fn mirrors_placement_after_cancelling_own_order() {
        let mut sim = RecordingSim::new(10);
        let mut f = trading_follower(&mut sim);

        f.on_message(&mut sim, &signal_msg(1, SignalKind::OrderPlaced, Side::Buy, 8, 100_050));
        f.on_message(&mut sim, &signal_msg(1, SignalKind::OrderPlaced, Side::Buy, 8, 100_060));

        let kinds: Vec<MessageType> = sim
            .sent
            .iter()
            .map(|s| s.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![MessageType::LimitOrder, MessageType::CancelOrder, MessageType::LimitOrder]
        );
        assert_eq!(f.trader().orders.live_count("ABM"), 1);
    }

    #[test]
    fn cancellation_signal_only_cancels() {
        let mut sim = RecordingSim::new(10);
        let mut f = trading_follower(&mut sim);
        f.on_message(&mut sim, &signal_msg(1, SignalKind::OrderPlaced, Side::Sell, 2, 100_000));
        sim.clear();

        f.on_message(&mut sim, &signal_msg(1, SignalKind::OrderCancelled, Side::Sell, 2, 100_000));

        assert_eq!(sim.sent_of(MessageType::CancelOrder).len(), 1);
        assert!(sim.sent_of(MessageType::LimitOrder).is_empty());
        assert!(matches!(sim.events[0], SimEvent::SignalMirrored { side: None, .. }));
    }

    #[test]
    fn long_follower_caps_sell() {
        let mut sim = RecordingSim::new(10);
        let mut f = trading_follower(&mut sim);
        f.trader.portfolio.holdings = 3;

        f.on_message(&mut sim, &signal_msg(1, SignalKind::OrderPlaced, Side::Sell, 10, 100_000));

        match &sim.sent_of(MessageType::LimitOrder)[0].payload {
            MessagePayload::LimitOrder(p) => {
                assert_eq!(p.qty, 3);
                assert_eq!(p.side, Side::Sell);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn signals_outside_session_or_from_strangers_are_dropped() {
        let mut sim = RecordingSim::new(10);
        let mut f = follower(1);
        f.on_message(&mut sim, &signal_msg(1, SignalKind::OrderPlaced, Side::Buy, 1, 10));
        assert!(sim.sent.is_empty());

        let mut f = trading_follower(&mut sim);
        f.on_message(&mut sim, &signal_msg(2, SignalKind::OrderPlaced, Side::Buy, 1, 10));
        assert!(sim.sent.is_empty());

        f.on_message(&mut sim, &Message::new_empty(5, 0, MessageType::MarketClosed, 0));
        f.on_message(&mut sim, &signal_msg(1, SignalKind::OrderPlaced, Side::Buy, 1, 10));
        assert!(sim.sent.is_empty());
    }

    #[test]
    fn market_signal_becomes_market_order() {
        let mut sim = RecordingSim::new(10);
        let mut f = trading_follower(&mut sim);
        f.on_message(&mut sim, &signal_msg(1, SignalKind::OrderExecuted, Side::Buy, 4, 0));
        assert_eq!(sim.sent_of(MessageType::MarketOrder).len(), 1);
    }
}
