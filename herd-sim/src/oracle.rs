//! Fundamental-value oracle.
//!
//! Agents observe the fundamental through `FairValueOracle::observe`, for the
//! current instant or for a future one. The mean-reverting implementation
//! memoizes its path, so a later query for an earlier instant sees the same
//! value the path already went through.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

pub trait FairValueOracle {
    /// Fundamental value of `symbol` at `time_ns`, plus Gaussian observation
    /// noise with standard deviation `sigma_n` drawn from the caller's RNG.
    fn observe(&mut self, symbol: &str, time_ns: u64, sigma_n: f64, rng: &mut StdRng) -> u64;
}

/// Oracle handle shared by all agents inside the single-threaded kernel.
pub type SharedOracle = Rc<RefCell<dyn FairValueOracle>>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OracleParams {
    /// Long-run mean the fundamental reverts to.
    pub r_bar: f64,
    /// Mean-reversion speed per nanosecond.
    pub kappa: f64,
    /// Volatility per square-root nanosecond.
    pub sigma_s: f64,
}

impl Default for OracleParams {
    fn default() -> Self {
        Self {
            r_bar: 100_000.0,
            kappa: 1.67e-16,
            sigma_s: 1e-4,
        }
    }
}

struct Series {
    path: BTreeMap<u64, f64>,
}

/// Ornstein-Uhlenbeck fundamental per symbol, advanced with the exact
/// transition density so arbitrary query spacing is allowed.
pub struct MeanRevertingOracle {
    params: OracleParams,
    start_ns: u64,
    series: HashMap<String, Series>,
    rng: StdRng,
}

impl MeanRevertingOracle {
    pub fn new(params: OracleParams, start_ns: u64, seed: u64) -> Self {
        Self {
            params,
            start_ns,
            series: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn into_shared(self) -> SharedOracle {
        Rc::new(RefCell::new(self))
    }

    /// Noise-free fundamental at `time_ns`.
    pub fn fundamental(&mut self, symbol: &str, time_ns: u64) -> f64 {
        let OracleParams { r_bar, kappa, sigma_s } = self.params;
        let start_ns = self.start_ns;
        let series = self.series.entry(symbol.to_string()).or_insert_with(|| Series {
            path: BTreeMap::from([(start_ns, r_bar)]),
        });

        if let Some(value) = series.path.get(&time_ns) {
            return *value;
        }

        let (last_t, last_v) = match series.path.iter().next_back() {
            Some((t, v)) => (*t, *v),
            None => (start_ns, r_bar),
        };

        if time_ns < last_t {
            // Already walked past this instant: reuse the value in force then.
            return series
                .path
                .range(..=time_ns)
                .next_back()
                .map(|(_, v)| *v)
                .unwrap_or(r_bar);
        }

        let dt = (time_ns - last_t) as f64;
        let decay = (-kappa * dt).exp();
        let mean = r_bar + (last_v - r_bar) * decay;
        let variance = if kappa > 0.0 {
            sigma_s * sigma_s / (2.0 * kappa) * (1.0 - decay * decay)
        } else {
            sigma_s * sigma_s * dt
        };

        let value = match Normal::new(mean, variance.max(0.0).sqrt()) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => mean,
        };
        let value = value.max(0.0);
        series.path.insert(time_ns, value);
        value
    }
}

impl FairValueOracle for MeanRevertingOracle {
    fn observe(&mut self, symbol: &str, time_ns: u64, sigma_n: f64, rng: &mut StdRng) -> u64 {
        let fundamental = self.fundamental(symbol, time_ns);
        let noise = if sigma_n > 0.0 {
            Normal::new(0.0, sigma_n).map(|n| n.sample(rng)).unwrap_or(0.0)
        } else {
            0.0
        };
        (fundamental + noise).round().max(0.0) as u64
    }
}

/// Fixed per-symbol schedule of fundamental values; the value in force at
/// `time_ns` is the last one scheduled at or before it.
#[derive(Debug, Clone, Default)]
pub struct ScheduledOracle {
    schedule: HashMap<String, BTreeMap<u64, u64>>,
}

impl ScheduledOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, symbol: &str, from_ns: u64, value: u64) -> Self {
        self.schedule
            .entry(symbol.to_string())
            .or_default()
            .insert(from_ns, value);
        self
    }
}

impl FairValueOracle for ScheduledOracle {
    fn observe(&mut self, symbol: &str, time_ns: u64, sigma_n: f64, rng: &mut StdRng) -> u64 {
        let value = self
            .schedule
            .get(symbol)
            .and_then(|s| s.range(..=time_ns).next_back().map(|(_, v)| *v))
            .unwrap_or(0);
        if sigma_n > 0.0 {
            let jitter: f64 = rng.gen_range(-sigma_n..sigma_n);
            (value as f64 + jitter).round().max(0.0) as u64
        } else {
            value
        }
    }
}
