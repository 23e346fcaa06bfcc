//! Daily loss breaker.
//!
//! The governor moves to `Disabled` once realized pnl for the current session
//! day reaches `-max_daily_loss`, and back to `Enabled` with pnl reset to zero
//! when the clock crosses the configured day boundary. Closed-trade reports
//! are the only way pnl changes.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernorState {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GovernorConfig {
    /// Absolute loss in account currency, always positive.
    pub max_daily_loss: f64,
    /// UTC hour at which a new session day starts (0-23).
    pub reset_hour_utc: u32,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_daily_loss: 500.0,
            reset_hour_utc: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskGovernor {
    config: GovernorConfig,
    state: GovernorState,
    cumulative_daily_pnl: f64,
    session_day: Option<NaiveDate>,
}

/// Governor shared by every per-instrument engine.
pub type SharedGovernor = Arc<Mutex<RiskGovernor>>;

impl RiskGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            config,
            state: GovernorState::Enabled,
            cumulative_daily_pnl: 0.0,
            session_day: None,
        }
    }

    pub fn shared(config: GovernorConfig) -> SharedGovernor {
        Arc::new(Mutex::new(Self::new(config)))
    }

    pub fn state(&self) -> GovernorState {
        self.state
    }

    pub fn trading_enabled(&self) -> bool {
        self.state == GovernorState::Enabled
    }

    pub fn cumulative_daily_pnl(&self) -> f64 {
        self.cumulative_daily_pnl
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    /// The session day `now` belongs to.
    pub fn session_day_of(&self, now: DateTime<Utc>) -> NaiveDate {
        (now - Duration::hours(i64::from(self.config.reset_hour_utc))).date_naive()
    }

    /// Advance the clock. Crossing into a new session day re-enables trading
    /// and zeroes the daily pnl.
    pub fn observe_time(&mut self, now: DateTime<Utc>) {
        let day = self.session_day_of(now);
        match self.session_day {
            None => self.session_day = Some(day),
            Some(current) if day > current => {
                info!(
                    from = %current,
                    to = %day,
                    previous_pnl = self.cumulative_daily_pnl,
                    was_enabled = self.trading_enabled(),
                    "session day boundary crossed, resetting daily loss breaker"
                );
                self.session_day = Some(day);
                self.cumulative_daily_pnl = 0.0;
                self.state = GovernorState::Enabled;
            }
            Some(_) => {}
        }
    }

    /// Record the realized pnl of a closed trade.
    pub fn report_closed_trade(&mut self, pnl: f64) {
        if !pnl.is_finite() {
            warn!(pnl, "ignoring non-finite closed trade pnl");
            return;
        }
        self.cumulative_daily_pnl += pnl;
        if self.state == GovernorState::Enabled
            && self.cumulative_daily_pnl <= -self.config.max_daily_loss
        {
            self.state = GovernorState::Disabled;
            warn!(
                cumulative_daily_pnl = self.cumulative_daily_pnl,
                max_daily_loss = self.config.max_daily_loss,
                "daily loss limit reached, trading disabled"
            );
        }
    }
}
