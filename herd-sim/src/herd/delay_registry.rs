use std::collections::HashMap;

use log::warn;
use rand::Rng;

use crate::error::{Result, SimError};
use crate::messages::AgentId;

/// Half-open range `[min_ns, max_ns)` a follower draws its relay delay from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    min_ns: u64,
    max_ns: u64,
}

impl DelayRange {
    pub fn new(min_ns: u64, max_ns: u64) -> Result<Self> {
        if min_ns >= max_ns {
            return Err(SimError::InvalidDelayRange { min_ns, max_ns });
        }
        Ok(Self { min_ns, max_ns })
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        rng.gen_range(self.min_ns..self.max_ns)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Registered,
    /// Duplicate response carrying the value already on file.
    Unchanged,
    /// A different value for a follower already on file; the first one is kept.
    Conflict { kept: u64, offered: u64 },
}

/// Leader-owned table of follower relay delays. An entry never changes once
/// written.
#[derive(Debug, Clone, Default)]
pub struct DelayRegistry {
    delays: HashMap<AgentId, u64>,
}

impl DelayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, follower: AgentId, delay_ns: u64) -> RecordOutcome {
        match self.delays.get(&follower) {
            None => {
                self.delays.insert(follower, delay_ns);
                RecordOutcome::Registered
            }
            Some(&kept) if kept == delay_ns => RecordOutcome::Unchanged,
            Some(&kept) => {
                warn!(
                    "[DelayRegistry] follower {} reported delay {} but {} is on file, keeping it",
                    follower, delay_ns, kept
                );
                RecordOutcome::Conflict {
                    kept,
                    offered: delay_ns,
                }
            }
        }
    }

    pub fn delay_of(&self, follower: AgentId) -> Option<u64> {
        self.delays.get(&follower).copied()
    }

    pub fn len(&self) -> usize {
        self.delays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }
}
