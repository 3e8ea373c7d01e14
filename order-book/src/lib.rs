//! Single-symbol limit order book with price-time priority matching.
//!
//! The book knows nothing about agents or simulated time: owners are opaque
//! ids and every call returns the fills it produced so the caller can notify
//! counterparties.

mod book;
mod error;
mod types;

pub use book::OrderBook;
pub use error::{BookError, Result};
pub use types::{Execution, Fill, Level, OrderId, OwnerId, RestingOrder, Side};
