//! Standard Deviation indicator.
//!
//! Population standard deviation over n closing prices.
//! STDDEV(n)[i] = sqrt(sum((C[i-j] - SMA(n)[i])^2 for j in 0..n-1) / n)
//! Warmup: first (n-1) bars are invalid.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_stddev(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Stddev(period));
    }

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let stats = window_stats(bars, i, period);
            IndicatorPoint {
                timestamp: bar.timestamp,
                valid: stats.is_some(),
                value: IndicatorValue::Simple(stats.map(|(_, sd)| sd).unwrap_or(0.0)),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Stddev(period),
        values,
    }
}

/// (mean, population stddev) of closes over the `period` bars ending at `index`.
pub(crate) fn window_stats(bars: &[Bar], index: usize, period: usize) -> Option<(f64, f64)> {
    if period == 0 || index + 1 < period || index >= bars.len() {
        return None;
    }
    let window = &bars[index + 1 - period..=index];
    let mean = window.iter().map(|b| b.close).sum::<f64>() / period as f64;
    let variance = window
        .iter()
        .map(|b| {
            let diff = b.close - mean;
            diff * diff
        })
        .sum::<f64>()
        / period as f64;
    Some((mean, variance.sqrt()))
}
