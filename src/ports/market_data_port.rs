//! Market data port trait.

use crate::domain::bar::Bar;
use crate::domain::error::TraderError;
use crate::domain::order::Quote;

pub trait MarketDataFeed {
    /// Up to `count` of the most recent closed bars, oldest first.
    ///
    /// Returning fewer bars than requested is not an error.
    fn fetch_latest_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        count: usize,
    ) -> Result<Vec<Bar>, TraderError>;

    /// Current best bid and ask.
    fn quote(&self, symbol: &str) -> Result<Quote, TraderError>;
}
