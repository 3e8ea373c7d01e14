//! Fair-value decision engine.
//!
//! The leader compares where it believes the price is heading (`r_f`, the
//! fair value at `now + future_window`) with the current touch. It buys below
//! belief and sells above it, never at a price that would cross its own
//! estimate.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::messages::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStrategy {
    Limit,
    Market,
    /// Coin-flip between limit and market for each decision.
    #[default]
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Limit,
    Market,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionParams {
    /// Probability of placing at the touch instead of a passive offset.
    pub percent_aggr: f64,
    /// Passive offset is drawn from `[0, depth_spread * (ask - bid))`.
    pub depth_spread: f64,
    /// Base order size when not flattening.
    pub size: u64,
    pub strategy: OrderStrategy,
}

impl Default for DecisionParams {
    fn default() -> Self {
        Self {
            percent_aggr: 0.1,
            depth_spread: 2.0,
            size: 10,
            strategy: OrderStrategy::Mixed,
        }
    }
}

impl DecisionParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.percent_aggr) {
            return Err(SimError::InvalidParameter {
                name: "percent_aggr",
                reason: format!("{} is not a probability", self.percent_aggr),
            });
        }
        if !self.depth_spread.is_finite() || self.depth_spread < 0.0 {
            return Err(SimError::InvalidParameter {
                name: "depth_spread",
                reason: format!("{} must be a finite non-negative multiplier", self.depth_spread),
            });
        }
        if self.size == 0 {
            return Err(SimError::InvalidParameter {
                name: "size",
                reason: "base order size must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub side: Side,
    pub quantity: u64,
    /// Price the decision was taken at: `p` for limit orders, the touch for market orders.
    pub price: u64,
    pub kind: OrderKind,
}

impl Decision {
    /// Price as carried on the wire; market orders report 0.
    pub fn reported_price(&self) -> u64 {
        match self.kind {
            OrderKind::Limit => self.price,
            OrderKind::Market => 0,
        }
    }
}

/// Why a cycle produced no order. None of these is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoTrade {
    /// One side of the book is empty.
    NoLiquidity,
    /// `bid <= r_f <= ask`: the book already prices in the belief.
    PricedIn { bid: u64, ask: u64, fair: u64 },
    /// The computed price would not beat the belief.
    Unprofitable { side: Side, price: u64, fair: u64 },
    /// The passive offset pushed a buy price down to zero.
    NonPositivePrice { side: Side },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Trade(Decision),
    NoTrade(NoTrade),
}

impl Outcome {
    pub fn decision(&self) -> Option<Decision> {
        match self {
            Outcome::Trade(d) => Some(*d),
            Outcome::NoTrade(_) => None,
        }
    }
}

/// Evaluate one decision cycle.
///
/// `holdings` is the leader's signed position; a buy while short (or a sell
/// while long) is sized to exactly flatten it instead of using the base size.
pub fn evaluate<R: Rng + ?Sized>(
    bid: Option<u64>,
    ask: Option<u64>,
    future_fair: u64,
    holdings: i64,
    params: &DecisionParams,
    rng: &mut R,
) -> Outcome {
    let (Some(bid), Some(ask)) = (bid, ask) else {
        return Outcome::NoTrade(NoTrade::NoLiquidity);
    };

    let adjust = passive_adjust(bid, ask, params, rng);

    let (side, price, quantity) = if ask < future_fair {
        let price = ask.saturating_sub(adjust);
        if price == 0 {
            return Outcome::NoTrade(NoTrade::NonPositivePrice { side: Side::Buy });
        }
        if price >= future_fair {
            return Outcome::NoTrade(NoTrade::Unprofitable {
                side: Side::Buy,
                price,
                fair: future_fair,
            });
        }
        let quantity = if holdings < 0 { holdings.unsigned_abs() } else { params.size };
        (Side::Buy, price, quantity)
    } else if bid > future_fair {
        let price = bid.saturating_add(adjust);
        if price <= future_fair {
            return Outcome::NoTrade(NoTrade::Unprofitable {
                side: Side::Sell,
                price,
                fair: future_fair,
            });
        }
        let quantity = if holdings > 0 { holdings.unsigned_abs() } else { params.size };
        (Side::Sell, price, quantity)
    } else {
        return Outcome::NoTrade(NoTrade::PricedIn {
            bid,
            ask,
            fair: future_fair,
        });
    };

    let kind = match params.strategy {
        OrderStrategy::Limit => OrderKind::Limit,
        OrderStrategy::Market => OrderKind::Market,
        OrderStrategy::Mixed => {
            if rng.gen::<bool>() {
                OrderKind::Limit
            } else {
                OrderKind::Market
            }
        }
    };

    // Market orders execute against the touch, whatever the passive offset was.
    let price = match (kind, side) {
        (OrderKind::Limit, _) => price,
        (OrderKind::Market, Side::Buy) => ask,
        (OrderKind::Market, Side::Sell) => bid,
    };

    Outcome::Trade(Decision {
        side,
        quantity,
        price,
        kind,
    })
}

/// Zero with probability `percent_aggr`, otherwise a passive offset inside
/// the spread or deeper in the book.
fn passive_adjust<R: Rng + ?Sized>(bid: u64, ask: u64, params: &DecisionParams, rng: &mut R) -> u64 {
    if rng.gen::<f64>() < params.percent_aggr {
        return 0;
    }
    let depth = (params.depth_spread * ask.saturating_sub(bid) as f64).floor() as u64;
    if depth == 0 {
        0
    } else {
        rng.gen_range(0..depth)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    const BID: u64 = 100_000;
    const ASK: u64 = 100_050;

    fn aggressive_limit() -> DecisionParams {
        DecisionParams {
            percent_aggr: 1.0,
            depth_spread: 2.0,
            size: 10,
            strategy: OrderStrategy::Limit,
        }
    }

    #[test]
    fn buys_at_the_ask_when_fair_value_is_above() {
        let mut rng = StdRng::seed_from_u64(1);
        let outcome = evaluate(Some(BID), Some(ASK), 100_100, 0, &aggressive_limit(), &mut rng);

        assert_eq!(
            outcome,
            Outcome::Trade(Decision {
                side: Side::Buy,
                quantity: 10,
                price: 100_050,
                kind: OrderKind::Limit,
            })
        );
    }

    #[test]
    fn no_trade_when_fair_value_is_inside_the_spread() {
        let mut rng = StdRng::seed_from_u64(2);
        let outcome = evaluate(Some(BID), Some(ASK), 100_020, 0, &DecisionParams::default(), &mut rng);

        assert_eq!(
            outcome,
            Outcome::NoTrade(NoTrade::PricedIn {
                bid: BID,
                ask: ASK,
                fair: 100_020,
            })
        );
    }

    #[test]
    fn buy_while_short_flattens_exactly() {
        let mut rng = StdRng::seed_from_u64(3);
        let decision = evaluate(Some(BID), Some(ASK), 100_100, -5, &aggressive_limit(), &mut rng)
            .decision()
            .unwrap();

        assert_eq!(decision.side, Side::Buy);
        assert_eq!(decision.quantity, 5);
    }

    #[test]
    fn sell_while_long_flattens_exactly() {
        let mut rng = StdRng::seed_from_u64(4);
        let decision = evaluate(Some(BID), Some(ASK), 99_900, 7, &aggressive_limit(), &mut rng)
            .decision()
            .unwrap();

        assert_eq!(decision.side, Side::Sell);
        assert_eq!(decision.price, BID);
        assert_eq!(decision.quantity, 7);
    }

    #[test]
    fn directional_size_ignores_same_side_position() {
        let mut rng = StdRng::seed_from_u64(5);
        let decision = evaluate(Some(BID), Some(ASK), 100_100, 30, &aggressive_limit(), &mut rng)
            .decision()
            .unwrap();
        assert_eq!(decision.quantity, 10);
    }

    #[test]
    fn missing_side_is_no_liquidity() {
        let mut rng = StdRng::seed_from_u64(6);
        let params = DecisionParams::default();
        assert_eq!(
            evaluate(None, Some(ASK), 100_100, 0, &params, &mut rng),
            Outcome::NoTrade(NoTrade::NoLiquidity)
        );
        assert_eq!(
            evaluate(Some(BID), None, 100_100, 0, &params, &mut rng),
            Outcome::NoTrade(NoTrade::NoLiquidity)
        );
    }

    #[test]
    fn never_crosses_its_own_belief() {
        let mut rng = StdRng::seed_from_u64(7);
        let params = DecisionParams {
            percent_aggr: 0.3,
            depth_spread: 3.0,
            size: 1,
            strategy: OrderStrategy::Mixed,
        };

        for fair in (99_000..101_000).step_by(7) {
            match evaluate(Some(BID), Some(ASK), fair, 0, &params, &mut rng) {
                Outcome::Trade(d) if d.side == Side::Buy => assert!(d.price < fair),
                Outcome::Trade(d) => assert!(d.price > fair),
                Outcome::NoTrade(_) => {}
            }
        }
    }

    #[test]
    fn passive_offset_stays_within_depth() {
        let mut rng = StdRng::seed_from_u64(8);
        let params = DecisionParams {
            percent_aggr: 0.0,
            depth_spread: 2.0,
            size: 1,
            strategy: OrderStrategy::Limit,
        };

        for _ in 0..500 {
            let d = evaluate(Some(BID), Some(ASK), 200_000, 0, &params, &mut rng)
                .decision()
                .unwrap();
            assert!(d.price <= ASK && d.price > ASK - 100);
        }
    }

    #[test]
    fn mixed_strategy_uses_both_routes_and_market_reports_zero() {
        let mut rng = StdRng::seed_from_u64(9);
        let params = DecisionParams {
            percent_aggr: 0.0,
            strategy: OrderStrategy::Mixed,
            ..DecisionParams::default()
        };

        let decisions: Vec<Decision> = (0..200)
            .filter_map(|_| evaluate(Some(BID), Some(ASK), 100_100, 0, &params, &mut rng).decision())
            .collect();

        let market: Vec<&Decision> = decisions.iter().filter(|d| d.kind == OrderKind::Market).collect();
        assert!(!market.is_empty());
        assert!(decisions.iter().any(|d| d.kind == OrderKind::Limit));
        for d in market {
            assert_eq!(d.price, ASK);
            assert_eq!(d.reported_price(), 0);
        }
    }

    #[test]
    fn deep_passive_buy_can_hit_zero_and_is_dropped() {
        let mut rng = StdRng::seed_from_u64(10);
        let params = DecisionParams {
            percent_aggr: 0.0,
            depth_spread: 1_000.0,
            size: 1,
            strategy: OrderStrategy::Limit,
        };

        let mut saw_zero = false;
        for _ in 0..200 {
            match evaluate(Some(1), Some(3), 10, 0, &params, &mut rng) {
                Outcome::NoTrade(NoTrade::NonPositivePrice { side }) => {
                    assert_eq!(side, Side::Buy);
                    saw_zero = true;
                }
                Outcome::Trade(d) => assert!(d.price >= 1 && d.price <= 3),
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        assert!(saw_zero);
    }

    #[test]
    fn validates_parameters() {
        assert!(DecisionParams::default().validate().is_ok());
        let bad = DecisionParams {
            percent_aggr: 1.5,
            ..DecisionParams::default()
        };
        assert!(bad.validate().is_err());
        let bad = DecisionParams {
            size: 0,
            ..DecisionParams::default()
        };
        assert!(bad.validate().is_err());
    }
}
