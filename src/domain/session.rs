//! Trading sessions.
//!
//! A session is an hour window in UTC that decides which strategy trades a
//! symbol. Without sessions the configured strategy trades around the clock.
//! With sessions, the first session covering the bar time and symbol wins and
//! a bar outside every session is not traded.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};

use crate::domain::bar::Bar;
use crate::domain::signal::{evaluate, evaluate_all, Signal};
use crate::domain::snapshot::IndicatorSnapshot;
use crate::domain::strategy::Strategy;

/// Hours `[start_hour, end_hour)` in UTC. A window whose end is not after its
/// start wraps past midnight, so `23..2` covers 23:00 to 01:59.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl HourWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour < self.end_hour {
            self.start_hour <= hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }

    pub fn contains_time(&self, at: DateTime<Utc>) -> bool {
        self.contains(at.hour())
    }

    /// Calendar day an occurrence of the window started on.
    pub fn occurrence_day(&self, at: DateTime<Utc>) -> NaiveDate {
        (at - Duration::hours(i64::from(self.start_hour))).date_naive()
    }
}

impl fmt::Display for HourWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:00-{:02}:00", self.start_hour, self.end_hour)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradingSession {
    pub name: String,
    pub hours: HourWindow,
    /// Symbols traded in this session. Empty means every symbol.
    pub symbols: Vec<String>,
    pub strategy: Strategy,
}

impl TradingSession {
    pub fn covers(&self, symbol: &str, at: DateTime<Utc>) -> bool {
        self.hours.contains_time(at)
            && (self.symbols.is_empty() || self.symbols.iter().any(|s| s.eq_ignore_ascii_case(symbol)))
    }
}

/// Strategy that trades `symbol` on the bar closing at `at`, or `None` when
/// the bar falls outside every session.
pub fn strategy_at<'a>(
    default: &'a Strategy,
    sessions: &'a [TradingSession],
    symbol: &str,
    at: DateTime<Utc>,
) -> Option<&'a Strategy> {
    if sessions.is_empty() {
        return Some(default);
    }
    sessions
        .iter()
        .find(|s| s.covers(symbol, at))
        .map(|s| &s.strategy)
}

/// Signals for a whole history, each bar judged by the strategy active at
/// its timestamp and paired with the snapshot it was judged on. The first
/// bar is always `Hold`.
pub fn evaluate_scheduled(
    default: &Strategy,
    sessions: &[TradingSession],
    symbol: &str,
    bars: &[Bar],
) -> Vec<(Signal, IndicatorSnapshot)> {
    if sessions.is_empty() {
        let snapshots = default.snapshots(bars);
        return evaluate_all(&snapshots, default).into_iter().zip(snapshots).collect();
    }
    let mut computed: Vec<(&Strategy, Vec<IndicatorSnapshot>)> = Vec::new();
    let mut out = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let strategy = strategy_at(default, sessions, symbol, bar.timestamp);
        let (Some(strategy), true) = (strategy, i > 0) else {
            let snapshot = IndicatorSnapshot::from_bar(i, bar);
            out.push((Signal::hold(&snapshot), snapshot));
            continue;
        };
        let pos = match computed.iter().position(|(s, _)| *s == strategy) {
            Some(pos) => pos,
            None => {
                computed.push((strategy, strategy.snapshots(bars)));
                computed.len() - 1
            }
        };
        let snapshots = &computed[pos].1;
        let signal = evaluate(&snapshots[i - 1], &snapshots[i], strategy);
        out.push((signal, snapshots[i].clone()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::SignalKind;
    use crate::domain::strategy::{SrBreakoutParams, StrategyKind};
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, hour, 30, 0).unwrap()
    }

    fn session(name: &str, start: u32, end: u32, symbols: &[&str], kind: StrategyKind) -> TradingSession {
        TradingSession {
            name: name.to_string(),
            hours: HourWindow::new(start, end),
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            strategy: kind.default_strategy(),
        }
    }

    #[test]
    fn plain_window_is_half_open() {
        let w = HourWindow::new(6, 12);
        assert!(w.contains(6));
        assert!(w.contains(11));
        assert!(!w.contains(12));
        assert!(!w.contains(5));
    }

    #[test]
    fn overnight_window_wraps() {
        let w = HourWindow::new(23, 2);
        assert!(w.contains(23));
        assert!(w.contains(0));
        assert!(w.contains(1));
        assert!(!w.contains(2));
        assert!(!w.contains(12));
        assert_eq!(w.to_string(), "23:00-02:00");
    }

    #[test]
    fn overnight_occurrence_belongs_to_start_day() {
        let w = HourWindow::new(23, 2);
        let late = Utc.with_ymd_and_hms(2024, 5, 6, 23, 10, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2024, 5, 7, 1, 10, 0).unwrap();
        assert_eq!(w.occurrence_day(late), w.occurrence_day(early));
    }

    #[test]
    fn no_sessions_always_uses_default() {
        let default = StrategyKind::SrBreakout.default_strategy();
        assert_eq!(strategy_at(&default, &[], "EURUSD", at(3)), Some(&default));
    }

    #[test]
    fn first_covering_session_wins() {
        let default = StrategyKind::SrBreakout.default_strategy();
        let sessions = vec![
            session("tokyo", 0, 6, &["USDJPY"], StrategyKind::RangeBreakout),
            session("london", 6, 12, &["EURUSD", "GBPUSD"], StrategyKind::MomentumScalp),
            session("late", 10, 18, &[], StrategyKind::VolatilityReversion),
        ];
        let kind = |symbol: &str, hour: u32| strategy_at(&default, &sessions, symbol, at(hour)).map(Strategy::kind);
        assert_eq!(kind("USDJPY", 3), Some(StrategyKind::RangeBreakout));
        assert_eq!(kind("eurusd", 7), Some(StrategyKind::MomentumScalp));
        assert_eq!(kind("EURUSD", 11), Some(StrategyKind::MomentumScalp));
        assert_eq!(kind("USDJPY", 11), Some(StrategyKind::VolatilityReversion));
        assert_eq!(kind("EURUSD", 3), None);
        assert_eq!(kind("EURUSD", 20), None);
    }

    #[test]
    fn all_day_session_matches_the_unscheduled_history() {
        let strategy = Strategy::SrBreakout(SrBreakoutParams {
            window: 5,
            touch_threshold: 2,
        });
        let bars = crate::domain::indicator::test_bars::wavy(60);
        let all_day = vec![TradingSession {
            name: "all".into(),
            hours: HourWindow::new(0, 0),
            symbols: Vec::new(),
            strategy: strategy.clone(),
        }];
        let default = StrategyKind::MomentumScalp.default_strategy();

        let (signals, judged): (Vec<_>, Vec<_>) =
            evaluate_scheduled(&default, &all_day, "XAUUSD", &bars).into_iter().unzip();
        let (expected, snapshots): (Vec<_>, Vec<_>) =
            evaluate_scheduled(&strategy, &[], "XAUUSD", &bars).into_iter().unzip();
        assert_eq!(signals, expected);
        assert_eq!(judged[1..], snapshots[1..]);
        assert_eq!(snapshots, strategy.snapshots(&bars));
    }

    #[test]
    fn bars_outside_every_session_hold() {
        let default = StrategyKind::SrBreakout.default_strategy();
        // test bars start at midnight, one per minute
        let bars = crate::domain::indicator::test_bars::wavy(90);
        let sessions = vec![session("dawn", 1, 2, &[], StrategyKind::SrBreakout)];
        let signals = evaluate_scheduled(&default, &sessions, "XAUUSD", &bars);
        assert_eq!(signals.len(), bars.len());
        assert!(signals[..60].iter().all(|(s, _)| s.kind == SignalKind::Hold));
        assert_eq!(signals[75].0.index, 75);
        assert_eq!(signals[75].1.index, 75);
    }
}
