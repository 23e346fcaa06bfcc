//! Average True Range with Wilder smoothing.
//!
//! TR[0] = H[0] - L[0]; TR[i] = max(H-L, |H-C[i-1]|, |L-C[i-1]|)
//! ATR seed = mean(TR[0..n]), then ATR[i] = (ATR[i-1]*(n-1) + TR[i]) / n
//! Warmup: first (n-1) bars are invalid.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_atr(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Atr(period));
    }

    let tr_values = true_ranges(bars);
    let values = wilder_smooth(&tr_values, period)
        .into_iter()
        .zip(bars)
        .map(|(atr, bar)| IndicatorPoint {
            timestamp: bar.timestamp,
            valid: atr.is_some(),
            value: IndicatorValue::Simple(atr.unwrap_or(0.0)),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    }
}

/// Consecutive-bar count of ATR running above `factor` times its trailing mean.
///
/// The trailing mean covers up to `window` valid ATR values ending at the
/// current bar. The count resets to zero on any bar that does not qualify.
pub fn calculate_atr_expansion(
    bars: &[Bar],
    period: usize,
    window: usize,
    factor: f64,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::AtrExpansion {
        period,
        window,
        factor_x100: (factor * 100.0).round().max(0.0) as u32,
    };
    if period == 0 || window == 0 {
        return IndicatorSeries::empty(indicator_type);
    }

    let atr = calculate_atr(bars, period);
    let mut history: Vec<f64> = Vec::with_capacity(bars.len());
    let mut count = 0usize;
    let mut values = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        let Some(current) = atr.simple_at(i) else {
            values.push(IndicatorPoint {
                timestamp: bar.timestamp,
                valid: false,
                value: IndicatorValue::Simple(0.0),
            });
            continue;
        };

        history.push(current);
        let start = history.len().saturating_sub(window);
        let trailing = &history[start..];
        let mean = trailing.iter().sum::<f64>() / trailing.len() as f64;

        count = if current > factor * mean { count + 1 } else { 0 };
        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid: true,
            value: IndicatorValue::Simple(count as f64),
        });
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}

pub(crate) fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect()
}

/// Wilder's running average: mean of the first `period` inputs, then
/// `(prev*(n-1) + x) / n`. `None` until the seed is available.
pub(crate) fn wilder_smooth(input: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(input.len());
    if period == 0 {
        out.resize(input.len(), None);
        return out;
    }

    let mut avg = 0.0;
    for (i, &x) in input.iter().enumerate() {
        if i + 1 < period {
            out.push(None);
        } else if i + 1 == period {
            avg = input[..period].iter().sum::<f64>() / period as f64;
            out.push(Some(avg));
        } else {
            avg = (avg * (period - 1) as f64 + x) / period as f64;
            out.push(Some(avg));
        }
    }
    out
}
