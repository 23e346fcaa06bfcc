//! Closed trade reconciliation port trait.

use chrono::{DateTime, Utc};

use crate::domain::error::TraderError;
use crate::domain::trade::ClosedTradeReport;

pub trait TradeReconciliationFeed {
    /// Trades closed at or after `since`.
    fn closed_trades(&self, since: DateTime<Utc>) -> Result<Vec<ClosedTradeReport>, TraderError>;
}
