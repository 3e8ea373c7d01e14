use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::agents::exchange_agent::ExchangeAgent;
use crate::agents::herd_follower_agent::{HerdFollowerAgent, HerdFollowerConfig};
use crate::agents::herd_master_agent::{HerdMasterAgent, HerdMasterConfig};
use crate::agents::noise_agent::{NoiseAgent, NoiseAgentConfig};
use crate::error::{Result, SimError};
use crate::events::{ClosureListener, SimEvent};
use crate::herd::{DecisionParams, DelayRange, OrderStrategy, TriggerPolicy};
use crate::kernel::RunSummary;
use crate::latency::{FixedLatency, LatencyModel, PairwiseLatency};
use crate::messages::AgentId;
use crate::oracle::{MeanRevertingOracle, OracleParams};
use crate::sim_engine::SimEngine;

const NS_PER_SEC: u64 = 1_000_000_000;
const NS_PER_HOUR: u64 = 3_600 * NS_PER_SEC;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum LatencyConfig {
    Fixed {
        network_ns: u64,
        #[serde(default)]
        compute_ns: u64,
    },
    /// Agents spread along a line; light travel time between them.
    Pairwise {
        length_meters: f64,
        #[serde(default)]
        compute_ns: u64,
    },
}

impl Default for LatencyConfig {
    fn default() -> Self {
        // Roughly New York to Seattle.
        LatencyConfig::Pairwise {
            length_meters: 3_866_660.0,
            compute_ns: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseJsonConfig {
    #[serde(default = "default_noise_count")]
    pub count: usize,
    #[serde(default = "default_starting_cash")]
    pub starting_cash: i64,
    #[serde(default = "default_noise_sigma_n")]
    pub sigma_n: f64,
    #[serde(default = "default_half_spread")]
    pub half_spread: u64,
    #[serde(default = "default_min_size")]
    pub min_size: u64,
    #[serde(default = "default_max_size")]
    pub max_size: u64,
    #[serde(default = "default_mean_wake")]
    pub mean_wake_ns: u64,
}

fn default_noise_count() -> usize {
    50
}
fn default_starting_cash() -> i64 {
    10_000_000 // $100k in cents
}
fn default_noise_sigma_n() -> f64 {
    100.0
}
fn default_half_spread() -> u64 {
    200
}
fn default_min_size() -> u64 {
    1
}
fn default_max_size() -> u64 {
    20
}
fn default_mean_wake() -> u64 {
    2 * NS_PER_SEC
}

impl Default for NoiseJsonConfig {
    fn default() -> Self {
        Self {
            count: default_noise_count(),
            starting_cash: default_starting_cash(),
            sigma_n: default_noise_sigma_n(),
            half_spread: default_half_spread(),
            min_size: default_min_size(),
            max_size: default_max_size(),
            mean_wake_ns: default_mean_wake(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterJsonConfig {
    #[serde(default = "default_starting_cash")]
    pub starting_cash: i64,
    #[serde(default)]
    pub sigma_n: f64,
    #[serde(default = "default_future_window")]
    pub future_window_ns: u64,
    #[serde(default = "default_percent_aggr")]
    pub percent_aggr: f64,
    #[serde(default = "default_depth_spread")]
    pub depth_spread: f64,
    #[serde(default = "default_order_size")]
    pub size: u64,
    #[serde(default)]
    pub strategy: OrderStrategy,
    #[serde(default)]
    pub trigger: TriggerPolicy,
}

fn default_future_window() -> u64 {
    10 * NS_PER_SEC
}
fn default_percent_aggr() -> f64 {
    0.1
}
fn default_depth_spread() -> f64 {
    2.0
}
fn default_order_size() -> u64 {
    30
}

impl Default for MasterJsonConfig {
    fn default() -> Self {
        Self {
            starting_cash: default_starting_cash(),
            sigma_n: 0.0,
            future_window_ns: default_future_window(),
            percent_aggr: default_percent_aggr(),
            depth_spread: default_depth_spread(),
            size: default_order_size(),
            strategy: OrderStrategy::default(),
            trigger: TriggerPolicy::default(),
        }
    }
}

impl MasterJsonConfig {
    fn decision_params(&self) -> DecisionParams {
        DecisionParams {
            percent_aggr: self.percent_aggr,
            depth_spread: self.depth_spread,
            size: self.size,
            strategy: self.strategy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowerJsonConfig {
    #[serde(default = "default_follower_count")]
    pub count: usize,
    #[serde(default = "default_starting_cash")]
    pub starting_cash: i64,
    #[serde(default = "default_min_delay")]
    pub min_delay_ns: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ns: u64,
}

fn default_follower_count() -> usize {
    60
}
fn default_min_delay() -> u64 {
    100
}
fn default_max_delay() -> u64 {
    100_000_000
}

impl Default for FollowerJsonConfig {
    fn default() -> Self {
        Self {
            count: default_follower_count(),
            starting_cash: default_starting_cash(),
            min_delay_ns: default_min_delay(),
            max_delay_ns: default_max_delay(),
        }
    }
}

/// A whole trading day: one exchange, a noise population keeping the book
/// two-sided, one herd leader and its followers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default = "default_scenario_name")]
    pub scenario_name: String,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default)]
    pub start_ns: u64,
    #[serde(default = "default_open")]
    pub open_ns: u64,
    #[serde(default = "default_close")]
    pub close_ns: u64,
    /// Defaults to one minute after the close.
    #[serde(default)]
    pub stop_ns: Option<u64>,
    #[serde(default)]
    pub logs_dir: Option<String>,
    #[serde(default)]
    pub latency: LatencyConfig,
    #[serde(default)]
    pub oracle: OracleParams,
    #[serde(default)]
    pub noise: NoiseJsonConfig,
    #[serde(default)]
    pub master: MasterJsonConfig,
    #[serde(default)]
    pub followers: FollowerJsonConfig,
}

fn default_scenario_name() -> String {
    "herd_demo".to_string()
}
fn default_symbol() -> String {
    "ABM".to_string()
}
fn default_open() -> u64 {
    9 * NS_PER_HOUR + 30 * 60 * NS_PER_SEC
}
fn default_close() -> u64 {
    10 * NS_PER_HOUR
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            scenario_name: default_scenario_name(),
            seed: 0,
            symbol: default_symbol(),
            start_ns: 0,
            open_ns: default_open(),
            close_ns: default_close(),
            stop_ns: None,
            logs_dir: None,
            latency: LatencyConfig::default(),
            oracle: OracleParams::default(),
            noise: NoiseJsonConfig::default(),
            master: MasterJsonConfig::default(),
            followers: FollowerJsonConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SimConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn stop_ns(&self) -> u64 {
        self.stop_ns.unwrap_or(self.close_ns.saturating_add(60 * NS_PER_SEC))
    }

    pub fn validate(&self) -> Result<()> {
        if self.open_ns >= self.close_ns {
            return Err(SimError::InvalidMarketHours {
                open_ns: self.open_ns,
                close_ns: self.close_ns,
            });
        }
        if self.start_ns > self.open_ns {
            return Err(SimError::InvalidParameter {
                name: "start_ns",
                reason: format!("start {} is after the open {}", self.start_ns, self.open_ns),
            });
        }
        if self.stop_ns() < self.close_ns {
            return Err(SimError::InvalidParameter {
                name: "stop_ns",
                reason: format!("stop {} is before the close {}", self.stop_ns(), self.close_ns),
            });
        }
        if self.symbol.is_empty() {
            return Err(SimError::InvalidParameter {
                name: "symbol",
                reason: "must not be empty".to_string(),
            });
        }
        if self.noise.min_size == 0 || self.noise.min_size > self.noise.max_size {
            return Err(SimError::InvalidParameter {
                name: "noise.min_size",
                reason: format!(
                    "size range [{}, {}] is empty or zero",
                    self.noise.min_size, self.noise.max_size
                ),
            });
        }
        if self.master.future_window_ns == 0 {
            return Err(SimError::InvalidParameter {
                name: "master.future_window_ns",
                reason: "must be positive".to_string(),
            });
        }
        self.master.decision_params().validate()?;
        DelayRange::new(self.followers.min_delay_ns, self.followers.max_delay_ns)?;
        Ok(())
    }
}

/// End-of-day figures for one herd agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Valuation {
    pub agent: AgentId,
    pub name: String,
    pub holdings: i64,
    pub cash: i64,
    pub surplus: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunStats {
    pub trades: u64,
    pub volume: u64,
    pub signals_relayed: u64,
    pub signals_mirrored: u64,
    pub valuations: Vec<Valuation>,
}

impl RunStats {
    fn record(&mut self, event: &SimEvent) {
        match event {
            SimEvent::Trade { qty, .. } => {
                self.trades += 1;
                self.volume += qty;
            }
            SimEvent::SignalRelayed { .. } => self.signals_relayed += 1,
            SimEvent::SignalMirrored { .. } => self.signals_mirrored += 1,
            SimEvent::FinalValuation {
                agent,
                name,
                holdings,
                cash,
                surplus,
                ..
            } => self.valuations.push(Valuation {
                agent: *agent,
                name: name.clone(),
                holdings: *holdings,
                cash: *cash,
                surplus: *surplus,
            }),
            SimEvent::OrderLog { .. } => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioReport {
    pub summary: RunSummary,
    pub stats: RunStats,
    pub master_id: AgentId,
    pub follower_ids: Vec<AgentId>,
}

/// Agent ids in creation order: exchange, noise, master, followers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentLayout {
    pub exchange: AgentId,
    pub noise: Vec<AgentId>,
    pub master: AgentId,
    pub followers: Vec<AgentId>,
}

impl AgentLayout {
    pub fn for_config(config: &SimConfig) -> Self {
        let noise_start = 1;
        let master = noise_start + config.noise.count as AgentId;
        Self {
            exchange: 0,
            noise: (noise_start..master).collect(),
            master,
            followers: (master + 1..master + 1 + config.followers.count as AgentId).collect(),
        }
    }

    pub fn all(&self) -> Vec<AgentId> {
        let mut ids = vec![self.exchange];
        ids.extend(&self.noise);
        ids.push(self.master);
        ids.extend(&self.followers);
        ids
    }
}

fn build_latency(config: &SimConfig, layout: &AgentLayout, seed: u64) -> Box<dyn LatencyModel> {
    match config.latency {
        LatencyConfig::Fixed { network_ns, compute_ns } => Box::new(FixedLatency::new(network_ns, compute_ns)),
        LatencyConfig::Pairwise {
            length_meters,
            compute_ns,
        } => Box::new(PairwiseLatency::on_line(&layout.all(), length_meters, compute_ns, seed)),
    }
}

/// Build every agent of the scenario into a fresh engine.
pub fn build_engine(config: &SimConfig, logs_dir: Option<&Path>) -> Result<(SimEngine, AgentLayout)> {
    config.validate()?;
    let layout = AgentLayout::for_config(config);

    // Every random stream is derived from the scenario seed, in a fixed order.
    let mut seeder = StdRng::seed_from_u64(config.seed);

    let latency = build_latency(config, &layout, seeder.gen());
    let oracle = MeanRevertingOracle::new(config.oracle, config.start_ns, seeder.gen()).into_shared();
    let mut engine = SimEngine::new(latency, config.start_ns, logs_dir);

    let exchange = ExchangeAgent::new(
        layout.exchange,
        "EXCHANGE".to_string(),
        std::slice::from_ref(&config.symbol),
        config.open_ns,
        config.close_ns,
    )?;
    engine.add_agent(Box::new(exchange));

    for &id in &layout.noise {
        let noise = NoiseAgentConfig {
            name: format!("NOISE_{id}"),
            exchange_id: layout.exchange,
            symbol: config.symbol.clone(),
            starting_cash: config.noise.starting_cash,
            sigma_n: config.noise.sigma_n,
            half_spread: config.noise.half_spread,
            min_size: config.noise.min_size,
            max_size: config.noise.max_size,
            mean_wake_ns: config.noise.mean_wake_ns,
            seed: seeder.gen(),
        };
        engine.add_agent(Box::new(NoiseAgent::new(id, noise, Rc::clone(&oracle))?));
    }

    let master = HerdMasterConfig {
        name: format!("HERD_MASTER_{}", layout.master),
        exchange_id: layout.exchange,
        symbol: config.symbol.clone(),
        starting_cash: config.master.starting_cash,
        sigma_n: config.master.sigma_n,
        future_window_ns: config.master.future_window_ns,
        decision: config.master.decision_params(),
        trigger: config.master.trigger,
        followers: layout.followers.clone(),
        seed: seeder.gen(),
    };
    engine.add_agent(Box::new(HerdMasterAgent::new(layout.master, master, Rc::clone(&oracle))?));

    let delay_range = DelayRange::new(config.followers.min_delay_ns, config.followers.max_delay_ns)?;
    for &id in &layout.followers {
        let follower = HerdFollowerConfig {
            name: format!("HERD_FOLLOWER_{id}"),
            exchange_id: layout.exchange,
            symbol: config.symbol.clone(),
            starting_cash: config.followers.starting_cash,
            leader_id: layout.master,
            delay_range,
            seed: seeder.gen(),
        };
        engine.add_agent(Box::new(HerdFollowerAgent::new(id, follower, Rc::clone(&oracle))));
    }

    info!(
        "[Scenario] {}: {} agents (noise={}, followers={}), open={} close={}",
        config.scenario_name,
        engine.kernel.agent_count(),
        layout.noise.len(),
        layout.followers.len(),
        config.open_ns,
        config.close_ns
    );

    Ok((engine, layout))
}

/// Build, run and summarize one scenario.
pub fn run_with_config(config: &SimConfig) -> Result<ScenarioReport> {
    let logs_dir = config.logs_dir.as_deref().map(Path::new);
    let (mut engine, layout) = build_engine(config, logs_dir)?;

    let stats = Rc::new(RefCell::new(RunStats::default()));
    {
        let stats = Rc::clone(&stats);
        engine.subscribe(Box::new(ClosureListener::new(move |ev: &SimEvent| {
            stats.borrow_mut().record(ev)
        })));
    }

    let summary = engine.run(config.stop_ns());
    let stats = stats.borrow().clone();

    info!(
        "[Scenario] {} done at {} ns: trades={} volume={} relayed={} mirrored={}",
        config.scenario_name, summary.end_ns, stats.trades, stats.volume, stats.signals_relayed, stats.signals_mirrored
    );
    for v in &stats.valuations {
        info!(
            "[Scenario] {:>20} holdings={:>6} cash={:>12} surplus={:+.6}",
            v.name, v.holdings, v.cash, v.surplus
        );
    }

    Ok(ScenarioReport {
        summary,
        stats,
        master_id: layout.master,
        follower_ids: layout.followers,
    })
}
