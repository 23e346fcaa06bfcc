//! Stochastic oscillator %K.
//!
//! %K = 100 * (C - LL(n)) / (HH(n) - LL(n)), where HH/LL are the highest high
//! and lowest low over the trailing n bars. Undefined when HH == LL.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_stochastic(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Stochastic(period));
    }

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let k = if i + 1 >= period {
                let window = &bars[i + 1 - period..=i];
                let highest = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
                let lowest = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
                let range = highest - lowest;
                if range > 0.0 {
                    Some(100.0 * (bar.close - lowest) / range)
                } else {
                    None
                }
            } else {
                None
            };
            IndicatorPoint {
                timestamp: bar.timestamp,
                valid: k.is_some(),
                value: IndicatorValue::Simple(k.unwrap_or(0.0)),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Stochastic(period),
        values,
    }
}
