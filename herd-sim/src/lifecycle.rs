//! Per-agent lifecycle automaton.
//!
//! `AgentState` is the fine-grained cycle every agent walks through on each
//! wakeup. `Session` tracks where the trading day stands and replaces the
//! one-shot flags (trading started, market closed, close price seen) with
//! explicit states, so no impossible flag combination can be represented.

use log::debug;

use crate::messages::MarketHoursPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    AwaitingWakeup,
    Inactive,
    AwaitingSpread,
    /// Reserved for roles that act on wakeup without a fresh spread.
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Session {
    HoursUnknown,
    /// Hours known, first trading wakeup not yet happened.
    PreOpen,
    Trading,
    /// Market closed, close price not observed yet.
    Closed,
    /// Market closed and close price observed: nothing left to do today.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    Leader,
    Follower,
    Background,
}

/// What the agent must do after a wakeup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeupAction {
    /// Hours unknown: ask the exchange; leaders also start the delay handshake.
    DiscoverHours { request_delays: bool },
    /// Woke before the open; sleep until `open_ns`.
    AwaitOpen { open_ns: u64 },
    /// Day is over.
    Idle,
    /// Closed without a close price: query the spread once more.
    QueryClosingSpread,
    /// Normal trading cycle: cancel own orders and query the spread.
    CancelAndQuerySpread { first_trading: bool },
}

/// How to treat an incoming spread response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadAction {
    /// Solicited and the market is open: run the decision.
    Evaluate,
    /// Solicited but the market has closed meanwhile: drop it.
    Stale,
    /// Not waiting for a spread: ignore it.
    Unsolicited,
}

#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: AgentState,
    session: Session,
    hours: Option<MarketHoursPayload>,
    close_price: Option<u64>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AgentState::AwaitingWakeup,
            session: Session::HoursUnknown,
            hours: None,
            close_price: None,
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn session(&self) -> Session {
        self.session
    }

    pub fn hours(&self) -> Option<MarketHoursPayload> {
        self.hours
    }

    pub fn close_price(&self) -> Option<u64> {
        self.close_price
    }

    /// True while the market is open and the agent has started trading.
    pub fn is_trading(&self) -> bool {
        self.session == Session::Trading
    }

    pub fn is_market_closed(&self) -> bool {
        matches!(self.session, Session::Closed | Session::Finished)
    }

    pub fn set_hours(&mut self, hours: MarketHoursPayload) {
        if self.session == Session::HoursUnknown {
            self.session = Session::PreOpen;
        }
        self.hours = Some(hours);
    }

    pub fn mark_closed(&mut self) {
        if !self.is_market_closed() {
            self.session = Session::Closed;
        }
    }

    pub fn on_wakeup(&mut self, role: AgentRole, now_ns: u64) -> WakeupAction {
        self.state = AgentState::Inactive;

        let Some(hours) = self.hours else {
            return WakeupAction::DiscoverHours {
                request_delays: role == AgentRole::Leader,
            };
        };

        if now_ns >= hours.close_ns {
            self.mark_closed();
        }

        match self.session {
            Session::HoursUnknown | Session::PreOpen if now_ns < hours.open_ns => WakeupAction::AwaitOpen {
                open_ns: hours.open_ns,
            },
            Session::Finished => WakeupAction::Idle,
            Session::Closed => {
                self.state = AgentState::AwaitingSpread;
                WakeupAction::QueryClosingSpread
            }
            Session::HoursUnknown | Session::PreOpen | Session::Trading => {
                let first_trading = self.session != Session::Trading;
                self.session = Session::Trading;
                self.state = AgentState::AwaitingSpread;
                WakeupAction::CancelAndQuerySpread { first_trading }
            }
        }
    }

    /// Classify a spread response. `last_trade` seen after the close becomes
    /// the day's close price.
    pub fn on_spread(&mut self, mkt_closed: bool, last_trade: Option<u64>) -> SpreadAction {
        if mkt_closed {
            self.mark_closed();
        }
        if self.session == Session::Closed {
            if let Some(price) = last_trade {
                self.close_price = Some(price);
                self.session = Session::Finished;
            }
        }

        if self.state != AgentState::AwaitingSpread {
            debug!("[Lifecycle] unsolicited spread in state {:?}, ignored", self.state);
            return SpreadAction::Unsolicited;
        }

        if self.is_market_closed() {
            self.state = AgentState::Inactive;
            return SpreadAction::Stale;
        }

        self.state = AgentState::AwaitingWakeup;
        SpreadAction::Evaluate
    }

    /// Act on this wakeup without waiting for the spread just requested.
    /// Only allowed in a trading cycle; a spread arriving later is then
    /// treated as unsolicited. Returns false if the transition is not allowed.
    pub fn enter_active(&mut self) -> bool {
        let in_cycle = matches!(self.state, AgentState::Inactive | AgentState::AwaitingSpread);
        if !in_cycle || !self.is_trading() {
            return false;
        }
        self.state = AgentState::Active;
        true
    }

    /// Leave `Active` once the immediate action is done.
    pub fn complete(&mut self) {
        if self.state == AgentState::Active {
            self.state = AgentState::AwaitingWakeup;
        }
    }
}
