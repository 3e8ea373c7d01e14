//! Simulation errors
//!
//! Only scenario loading and validation can fail. Conditions met while the
//! simulation runs (no liquidity, stale spreads, unknown follower delays) are
//! reported as outcomes, never as errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid scenario JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Invalid relay delay range: min={min_ns} must be below max={max_ns}")]
    InvalidDelayRange { min_ns: u64, max_ns: u64 },

    #[error("Invalid market hours: open={open_ns} must be before close={close_ns}")]
    InvalidMarketHours { open_ns: u64, close_ns: u64 },
}

pub type Result<T> = std::result::Result<T, SimError>;
