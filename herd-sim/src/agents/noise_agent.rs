use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};

use crate::agents::trading::{ExchangeUpdate, TraderState};
use crate::agents::Agent;
use crate::error::{Result, SimError};
use crate::lifecycle::{AgentRole, SpreadAction};
use crate::messages::{AgentId, Message, Side, SimulatorApi};
use crate::oracle::SharedOracle;

#[derive(Debug, Clone)]
pub struct NoiseAgentConfig {
    pub name: String,
    pub exchange_id: AgentId,
    pub symbol: String,
    pub starting_cash: i64,
    pub sigma_n: f64,
    /// Orders rest up to this far from the observed fair value.
    pub half_spread: u64,
    pub min_size: u64,
    pub max_size: u64,
    pub mean_wake_ns: u64,
    pub seed: u64,
}

/// Background liquidity: one passive limit order around a noisy fair value
/// per wakeup, with exponential inter-arrival times.
pub struct NoiseAgent {
    trader: TraderState,
    sigma_n: f64,
    half_spread: u64,
    min_size: u64,
    max_size: u64,
    wake_gap: Exp<f64>,
    rng: StdRng,
    oracle: SharedOracle,
    orders_placed: u64,
}

impl NoiseAgent {
    pub fn new(id: AgentId, config: NoiseAgentConfig, oracle: SharedOracle) -> Result<Self> {
        if config.min_size == 0 || config.min_size > config.max_size {
            return Err(SimError::InvalidParameter {
                name: "noise.min_size",
                reason: format!("size range [{}, {}] is empty or zero", config.min_size, config.max_size),
            });
        }
        let wake_gap = Exp::new(1.0 / config.mean_wake_ns.max(1) as f64).map_err(|e| SimError::InvalidParameter {
            name: "noise.mean_wake_ns",
            reason: e.to_string(),
        })?;

        Ok(Self {
            trader: TraderState::new(id, config.name, config.exchange_id, config.symbol, config.starting_cash),
            sigma_n: config.sigma_n,
            half_spread: config.half_spread,
            min_size: config.min_size,
            max_size: config.max_size,
            wake_gap,
            rng: StdRng::seed_from_u64(config.seed),
            oracle,
            orders_placed: 0,
        })
    }

    pub fn trader(&self) -> &TraderState {
        &self.trader
    }

    fn place_order(&mut self, sim: &mut dyn SimulatorApi) {
        let now_ns = sim.now_ns();
        let fair = self
            .oracle
            .borrow_mut()
            .observe(&self.trader.symbol, now_ns, self.sigma_n, &mut self.rng);

        let side = if self.rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
        let qty = self.rng.gen_range(self.min_size..=self.max_size);
        let offset = self.rng.gen_range(0..=self.half_spread);
        let price = match side {
            Side::Buy => fair.saturating_sub(offset).max(1),
            Side::Sell => fair.saturating_add(offset),
        };

        self.trader.place_limit(sim, side, qty, price);
        self.orders_placed += 1;

        let gap = self.wake_gap.sample(&mut self.rng).round() as u64;
        sim.wakeup(self.trader.id, now_ns.saturating_add(gap.max(1)));
    }
}

impl Agent for NoiseAgent {
    fn id(&self) -> AgentId {
        self.trader.id
    }

    fn name(&self) -> &str {
        &self.trader.name
    }

    fn on_start(&mut self, sim: &mut dyn SimulatorApi) {
        let now = sim.now_ns();
        sim.wakeup(self.trader.id, now);
    }

    fn on_wakeup(&mut self, sim: &mut dyn SimulatorApi, now_ns: u64) {
        self.trader.handle_wakeup(sim, AgentRole::Background, now_ns);
    }

    fn on_message(&mut self, sim: &mut dyn SimulatorApi, msg: &Message) {
        if let ExchangeUpdate::Spread(SpreadAction::Evaluate) = self.trader.on_exchange_message(sim, msg) {
            self.place_order(sim);
        }
    }

    fn on_stop(&mut self, _sim: &mut dyn SimulatorApi) {
        debug!(
            "[{}] stopping, orders={} holdings={} cash={}",
            self.trader.name, self.orders_placed, self.trader.portfolio.holdings, self.trader.portfolio.cash
        );
    }
}
