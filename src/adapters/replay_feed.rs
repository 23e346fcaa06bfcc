//! Market data feed that releases recorded bars one at a time.
//!
//! Each symbol has a cursor; `advance` releases the next recorded bar and
//! `fetch_latest_bars` only ever sees bars up to the cursor, so an engine
//! polling this feed behaves exactly as it would against a live terminal
//! that closes one bar per poll.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::domain::bar::Bar;
use crate::domain::error::TraderError;
use crate::domain::order::Quote;
use crate::ports::market_data_port::MarketDataFeed;

pub struct ReplayFeed {
    series: HashMap<String, Vec<Bar>>,
    cursors: Mutex<HashMap<String, usize>>,
    spread: f64,
}

impl ReplayFeed {
    /// `spread` is added to the last close to form the ask.
    pub fn new(spread: f64) -> Self {
        Self {
            series: HashMap::new(),
            cursors: Mutex::new(HashMap::new()),
            spread,
        }
    }

    /// Register the recorded history for `symbol`. The first `preload` bars
    /// are released immediately.
    pub fn insert(&mut self, symbol: &str, bars: Vec<Bar>, preload: usize) {
        let symbol = symbol.to_uppercase();
        let released = preload.min(bars.len());
        self.cursors.lock().insert(symbol.clone(), released);
        self.series.insert(symbol, bars);
    }

    /// Release the next bar for `symbol`. `None` once the history is
    /// exhausted or the symbol is unknown.
    pub fn advance(&self, symbol: &str) -> Option<Bar> {
        let symbol = symbol.to_uppercase();
        let bars = self.series.get(&symbol)?;
        let mut cursors = self.cursors.lock();
        let cursor = cursors.entry(symbol).or_insert(0);
        let bar = bars.get(*cursor).copied()?;
        *cursor += 1;
        Some(bar)
    }

    /// Close time and symbol of every bar not yet released.
    pub fn pending(&self) -> Vec<(DateTime<Utc>, String)> {
        let cursors = self.cursors.lock();
        self.series
            .iter()
            .flat_map(|(symbol, bars)| {
                let cursor = cursors.get(symbol).copied().unwrap_or(0);
                bars.iter()
                    .skip(cursor)
                    .map(move |b| (b.timestamp, symbol.clone()))
            })
            .collect()
    }

    fn released(&self, symbol: &str) -> Result<&[Bar], TraderError> {
        let key = symbol.to_uppercase();
        let bars = self.series.get(&key).ok_or_else(|| TraderError::Feed {
            symbol: symbol.to_string(),
            reason: "no recorded history".to_string(),
        })?;
        let cursor = self.cursors.lock().get(&key).copied().unwrap_or(0);
        Ok(&bars[..cursor.min(bars.len())])
    }
}

impl MarketDataFeed for ReplayFeed {
    fn fetch_latest_bars(
        &self,
        symbol: &str,
        _timeframe: &str,
        count: usize,
    ) -> Result<Vec<Bar>, TraderError> {
        let released = self.released(symbol)?;
        Ok(released[released.len().saturating_sub(count)..].to_vec())
    }

    fn quote(&self, symbol: &str) -> Result<Quote, TraderError> {
        let last = self.released(symbol)?.last().ok_or_else(|| TraderError::Feed {
            symbol: symbol.to_string(),
            reason: "no bars released yet".to_string(),
        })?;
        Ok(Quote {
            bid: last.close,
            ask: last.close + self.spread,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::from_closes;

    fn feed() -> ReplayFeed {
        let mut feed = ReplayFeed::new(0.05);
        feed.insert("xauusd", from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0]), 2);
        feed
    }

    #[test]
    fn only_released_bars_are_visible() {
        let feed = feed();
        let bars = feed.fetch_latest_bars("XAUUSD", "M1", 10).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 2.0);

        assert_eq!(feed.advance("XAUUSD").map(|b| b.close), Some(3.0));
        let bars = feed.fetch_latest_bars("XAUUSD", "M1", 2).unwrap();
        assert_eq!(bars.iter().map(|b| b.close).collect::<Vec<_>>(), vec![2.0, 3.0]);
    }

    #[test]
    fn advance_stops_at_end() {
        let feed = feed();
        assert!(feed.advance("XAUUSD").is_some());
        assert!(feed.advance("XAUUSD").is_some());
        assert!(feed.advance("XAUUSD").is_some());
        assert!(feed.advance("XAUUSD").is_none());
        assert_eq!(feed.fetch_latest_bars("XAUUSD", "M1", 100).unwrap().len(), 5);
    }

    #[test]
    fn pending_lists_unreleased_bars() {
        let mut feed = feed();
        feed.insert("EURUSD", from_closes(&[1.0]), 0);
        let mut pending = feed.pending();
        pending.sort();
        let symbols: Vec<&str> = pending.iter().map(|(_, s)| s.as_str()).collect();
        assert_eq!(symbols, vec!["EURUSD", "XAUUSD", "XAUUSD", "XAUUSD"]);

        feed.advance("XAUUSD");
        assert_eq!(feed.pending().len(), 3);
    }

    #[test]
    fn quote_uses_last_close_and_spread() {
        let feed = feed();
        let quote = feed.quote("XAUUSD").unwrap();
        assert_eq!(quote.bid, 2.0);
        assert!((quote.ask - 2.05).abs() < 1e-12);
    }

    #[test]
    fn unknown_symbol_is_feed_error() {
        let feed = feed();
        assert!(matches!(
            feed.fetch_latest_bars("EURUSD", "M1", 10),
            Err(TraderError::Feed { .. })
        ));
        assert!(feed.advance("EURUSD").is_none());
    }

    #[test]
    fn quote_before_any_release_fails() {
        let mut feed = ReplayFeed::new(0.0);
        feed.insert("EURUSD", from_closes(&[1.0]), 0);
        assert!(feed.quote("EURUSD").is_err());
        feed.advance("EURUSD");
        assert!(feed.quote("EURUSD").is_ok());
    }
}
