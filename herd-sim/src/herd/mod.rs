//! Herd core: the leader's fair-value decision, the relay-delay handshake,
//! the staggered broadcast and the follower's mirror rule.

pub mod broadcast;
pub mod decision;
pub mod delay_registry;
pub mod mirror;
mod signal;

pub use broadcast::{BroadcastReport, SignalBroadcaster};
pub use decision::{Decision, DecisionParams, NoTrade, OrderKind, OrderStrategy, Outcome};
pub use delay_registry::{DelayRange, DelayRegistry, RecordOutcome};
pub use mirror::{mirror_order, MirrorOrder};
pub use signal::{Signal, SignalKind, TriggerPolicy};
