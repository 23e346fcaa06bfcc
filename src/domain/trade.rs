//! Trade records and the per-engine trade book.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::governor::RiskGovernor;
use crate::domain::instrument::InstrumentSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// +1 for buys, -1 for sells.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Buy => 1.0,
            Direction::Sell => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub ticket: u64,
    pub symbol: String,
    pub direction: Direction,
    pub volume: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub open_time: DateTime<Utc>,
    pub close_time: Option<DateTime<Utc>>,
    pub realized_pnl: Option<f64>,
}

impl TradeRecord {
    pub fn is_open(&self) -> bool {
        self.close_time.is_none()
    }

    pub fn should_stop_loss(&self, price: f64) -> bool {
        match self.direction {
            Direction::Buy => price <= self.stop_loss,
            Direction::Sell => price >= self.stop_loss,
        }
    }

    pub fn should_take_profit(&self, price: f64) -> bool {
        match self.direction {
            Direction::Buy => price >= self.take_profit,
            Direction::Sell => price <= self.take_profit,
        }
    }

    /// Account-currency pnl if the trade were closed at `exit_price`.
    pub fn pnl_at(&self, exit_price: f64, spec: &InstrumentSpec) -> f64 {
        self.direction.sign() * spec.to_points(exit_price - self.entry_price)
            * spec.value_per_unit
            * self.volume
    }
}

/// A closed trade as reported by the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTradeReport {
    pub ticket: u64,
    pub pnl: f64,
    pub close_time: DateTime<Utc>,
}

/// Open trades of one engine. Closed trades leave the book once reconciled.
#[derive(Debug, Default)]
pub struct TradeBook {
    open: BTreeMap<u64, TradeRecord>,
}

impl TradeBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_open(&mut self, trade: TradeRecord) {
        self.open.insert(trade.ticket, trade);
    }

    pub fn has_open_position(&self, symbol: &str) -> bool {
        self.open.values().any(|t| t.symbol == symbol)
    }

    pub fn open_trades(&self) -> impl Iterator<Item = &TradeRecord> {
        self.open.values()
    }

    /// Close every known trade in `reports` and forward its pnl to the
    /// governor. Reports for tickets this book never opened are skipped.
    /// Returns the trades closed, stamped with close time and pnl.
    pub fn reconcile(
        &mut self,
        reports: &[ClosedTradeReport],
        governor: &mut RiskGovernor,
    ) -> Vec<TradeRecord> {
        let mut closed = Vec::new();
        for report in reports {
            let Some(mut trade) = self.open.remove(&report.ticket) else {
                debug!(ticket = report.ticket, "closed trade report for unknown ticket");
                continue;
            };
            trade.close_time = Some(report.close_time);
            trade.realized_pnl = Some(report.pnl);
            info!(
                ticket = trade.ticket,
                symbol = %trade.symbol,
                direction = %trade.direction,
                pnl = report.pnl,
                "trade closed"
            );
            governor.report_closed_trade(report.pnl);
            closed.push(trade);
        }
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::governor::GovernorConfig;
    use crate::domain::instrument::forex_spec;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn long_trade() -> TradeRecord {
        TradeRecord {
            ticket: 1,
            symbol: "XAUUSD".into(),
            direction: Direction::Buy,
            volume: 0.5,
            entry_price: 2000.0,
            stop_loss: 1995.0,
            take_profit: 2010.0,
            open_time: Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap(),
            close_time: None,
            realized_pnl: None,
        }
    }

    fn short_trade() -> TradeRecord {
        TradeRecord {
            ticket: 2,
            direction: Direction::Sell,
            stop_loss: 2005.0,
            take_profit: 1990.0,
            ..long_trade()
        }
    }

    #[test]
    fn stop_loss_long_triggered() {
        let t = long_trade();
        assert!(t.should_stop_loss(1994.0));
        assert!(t.should_stop_loss(1995.0));
        assert!(!t.should_stop_loss(1996.0));
    }

    #[test]
    fn stop_loss_short_triggered() {
        let t = short_trade();
        assert!(t.should_stop_loss(2006.0));
        assert!(t.should_stop_loss(2005.0));
        assert!(!t.should_stop_loss(2004.0));
    }

    #[test]
    fn take_profit_both_directions() {
        assert!(long_trade().should_take_profit(2010.0));
        assert!(!long_trade().should_take_profit(2009.0));
        assert!(short_trade().should_take_profit(1990.0));
        assert!(!short_trade().should_take_profit(1991.0));
    }

    #[test]
    fn pnl_in_points_times_value() {
        let spec = forex_spec("XAUUSD");
        // 10.0 price = 1000 points, * 1.0 value * 0.5 lots
        assert_relative_eq!(long_trade().pnl_at(2010.0, &spec), 500.0, epsilon = 1e-6);
        assert_relative_eq!(short_trade().pnl_at(2010.0, &spec), -500.0, epsilon = 1e-6);
    }

    #[test]
    fn one_position_per_symbol() {
        let mut book = TradeBook::new();
        assert!(!book.has_open_position("XAUUSD"));
        book.record_open(long_trade());
        assert!(book.has_open_position("XAUUSD"));
        assert!(!book.has_open_position("EURUSD"));
    }

    #[test]
    fn reconcile_closes_and_reports_pnl() {
        let mut book = TradeBook::new();
        book.record_open(long_trade());
        let mut governor = RiskGovernor::new(GovernorConfig::default());
        let close_time = Utc.with_ymd_and_hms(2024, 1, 2, 11, 0, 0).unwrap();
        let reports = vec![
            ClosedTradeReport {
                ticket: 1,
                pnl: -250.0,
                close_time,
            },
            ClosedTradeReport {
                ticket: 99,
                pnl: -1000.0,
                close_time,
            },
        ];
        let closed = book.reconcile(&reports, &mut governor);
        assert!(!book.has_open_position("XAUUSD"));
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].realized_pnl, Some(-250.0));
        assert_eq!(closed[0].close_time, Some(close_time));
        assert!(!closed[0].is_open());
        assert_eq!(governor.cumulative_daily_pnl(), -250.0);
        assert_eq!(book.open_trades().count(), 0);

        // a repeated report is not double counted
        assert!(book.reconcile(&reports, &mut governor).is_empty());
        assert_eq!(governor.cumulative_daily_pnl(), -250.0);
    }
}
