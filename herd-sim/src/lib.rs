//! Discrete-event herd trading simulation.
//!
//! A fair-value leader trades against its estimate of where the price is
//! heading and relays every order to a cohort of followers. Each follower
//! receives the relay after its own delay, so orders spread through the book
//! as a staggered wave. The kernel, exchange, oracle and noise population
//! around that core make a runnable trading day.

pub mod agents;
pub mod error;
pub mod events;
pub mod herd;
pub mod kernel;
pub mod latency;
pub mod lifecycle;
pub mod logging;
pub mod messages;
pub mod open_orders;
pub mod oracle;
pub mod scenarios;
pub mod sim_engine;

#[cfg(test)]
mod testing;

pub use error::{Result, SimError};
