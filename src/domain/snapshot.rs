//! Per-bar indicator snapshots consumed by the signal evaluator.
//!
//! A snapshot carries the bar's prices plus whichever indicator values the
//! active strategy asked for. Fields a strategy does not use, or that are
//! still warming up, are `None`.

use chrono::{DateTime, Utc};

use crate::domain::bar::Bar;
use crate::domain::indicator::levels::{
    find_fractals, session_range, touch_levels, Fractal, FractalLevels,
};
use crate::domain::indicator::{IndicatorSeries, IndicatorValue};
use crate::domain::session::HourWindow;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub sma_fast: Option<f64>,
    pub sma_slow: Option<f64>,
    pub sma_trend: Option<f64>,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub adx: Option<f64>,
    pub plus_di: Option<f64>,
    pub minus_di: Option<f64>,
    pub rsi: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub stochastic: Option<f64>,
    pub atr: Option<f64>,
    pub resistance: Option<f64>,
    pub support: Option<f64>,
    pub range_high: Option<f64>,
    pub range_low: Option<f64>,
}

impl IndicatorSnapshot {
    pub fn from_bar(index: usize, bar: &Bar) -> Self {
        Self {
            index,
            timestamp: bar.timestamp,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            sma_fast: None,
            sma_slow: None,
            sma_trend: None,
            ema_fast: None,
            ema_slow: None,
            adx: None,
            plus_di: None,
            minus_di: None,
            rsi: None,
            bb_upper: None,
            bb_middle: None,
            bb_lower: None,
            macd_line: None,
            macd_signal: None,
            macd_histogram: None,
            stochastic: None,
            atr: None,
            resistance: None,
            support: None,
            range_high: None,
            range_low: None,
        }
    }
}

/// Builds one snapshot per bar, filling fields indicator by indicator.
pub struct SnapshotBuilder<'a> {
    bars: &'a [Bar],
    snapshots: Vec<IndicatorSnapshot>,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(bars: &'a [Bar]) -> Self {
        let snapshots = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| IndicatorSnapshot::from_bar(i, bar))
            .collect();
        Self { bars, snapshots }
    }

    pub fn bars(&self) -> &'a [Bar] {
        self.bars
    }

    /// Copy every valid point of `series` into the snapshots via `set`.
    pub fn with_series(
        mut self,
        series: &IndicatorSeries,
        set: impl Fn(&mut IndicatorSnapshot, IndicatorValue),
    ) -> Self {
        for (snapshot, i) in self.snapshots.iter_mut().zip(0..) {
            if let Some(value) = series.value_at(i) {
                set(snapshot, value);
            }
        }
        self
    }

    /// Copy a single-valued series into one field.
    pub fn with_simple(
        self,
        series: &IndicatorSeries,
        set: impl Fn(&mut IndicatorSnapshot, f64),
    ) -> Self {
        self.with_series(series, |s, v| {
            if let IndicatorValue::Simple(x) = v {
                set(s, x);
            }
        })
    }

    /// Touch-count levels recorded for each bar.
    pub fn with_touch_levels(mut self, window: usize, touch_threshold: usize) -> Self {
        let levels = touch_levels(self.bars, window, touch_threshold);
        for (i, snapshot) in self.snapshots.iter_mut().enumerate() {
            snapshot.resistance = levels.resistance[i].map(|l| l.price);
            snapshot.support = levels.support[i].map(|l| l.price);
        }
        self
    }

    /// Active aggregated fractal levels as known at each bar.
    ///
    /// A fractal at index `j` is final once bar `j + 2` exists, so the level
    /// for bar `i` only aggregates fractals with `j + 2 <= i`.
    pub fn with_fractal_levels(mut self, tolerance: f64, touch_threshold: usize) -> Self {
        let fractals = find_fractals(self.bars);
        let mut known: Vec<&Fractal> = Vec::new();
        let mut pending = fractals.iter().peekable();
        let mut active: (Option<f64>, Option<f64>) = (None, None);

        for (i, snapshot) in self.snapshots.iter_mut().enumerate() {
            let before = known.len();
            while let Some(f) = pending.next_if(|f| f.index + 2 <= i) {
                known.push(f);
            }
            if known.len() != before {
                let levels = FractalLevels::from_fractals(known.iter().copied(), tolerance);
                active = (
                    levels.active_resistance(touch_threshold).map(|l| l.price),
                    levels.active_support(touch_threshold).map(|l| l.price),
                );
            }
            snapshot.resistance = active.0;
            snapshot.support = active.1;
        }
        self
    }

    /// High and low of the in-window bars among the `lookback` bars before each bar.
    pub fn with_session_range(mut self, hours: HourWindow, lookback: usize) -> Self {
        let range = session_range(self.bars, hours, lookback);
        for (i, snapshot) in self.snapshots.iter_mut().enumerate() {
            snapshot.range_high = range.high[i];
            snapshot.range_low = range.low[i];
        }
        self
    }

    pub fn build(self) -> Vec<IndicatorSnapshot> {
        self.snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::calculate_sma;
    use crate::domain::indicator::test_bars::{from_closes, from_hlc};

    #[test]
    fn builder_aligns_with_bars() {
        let bars = from_closes(&[1.0, 2.0, 3.0]);
        let snaps = SnapshotBuilder::new(&bars)
            .with_simple(&calculate_sma(&bars, 2), |s, v| s.sma_fast = Some(v))
            .build();
        assert_eq!(snaps.len(), 3);
        assert_eq!(snaps[0].sma_fast, None);
        assert_eq!(snaps[1].sma_fast, Some(1.5));
        assert_eq!(snaps[2].sma_fast, Some(2.5));
        assert_eq!(snaps[2].close, 3.0);
        assert_eq!(snaps[2].index, 2);
    }

    #[test]
    fn fractal_levels_appear_only_after_confirmation_bars() {
        let bars = from_hlc(&[
            (10.0, 5.0, 8.0),
            (11.0, 5.0, 9.0),
            (15.0, 5.0, 12.0),
            (12.0, 5.0, 10.0),
            (11.0, 5.0, 9.0),
            (10.0, 5.0, 9.0),
        ]);
        let snaps = SnapshotBuilder::new(&bars).with_fractal_levels(0.3, 1).build();
        assert_eq!(snaps[3].resistance, None);
        assert_eq!(snaps[4].resistance, Some(15.0));
        assert_eq!(snaps[5].resistance, Some(15.0));
        assert_eq!(snaps[5].support, None);
    }

    #[test]
    fn touch_levels_fill_snapshot_fields() {
        let bars = from_hlc(&[(100.0, 90.0, 95.0), (100.0, 90.0, 95.0), (99.0, 91.0, 95.0)]);
        let snaps = SnapshotBuilder::new(&bars).with_touch_levels(2, 2).build();
        assert_eq!(snaps[2].resistance, Some(100.0));
        assert_eq!(snaps[2].support, Some(90.0));
        assert_eq!(snaps[1].resistance, None);
    }
}
