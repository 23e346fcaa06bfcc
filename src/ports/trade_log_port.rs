//! Executed order log port trait.

use crate::domain::error::TraderError;
use crate::domain::trade::TradeRecord;

pub trait TradeLog {
    fn record(&self, trade: &TradeRecord) -> Result<(), TraderError>;
}
