//! Simple Moving Average of closing prices.
//!
//! SMA(n)[i] = sum(C[i-n+1..=i]) / n
//! Warmup: first (n-1) bars are invalid.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_sma(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Sma(period));
    }

    let mut values = Vec::with_capacity(bars.len());
    let mut sum = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        sum += bar.close;
        if i >= period {
            sum -= bars[i - period].close;
        }

        let valid = i + 1 >= period;
        let value = if valid {
            // re-sum the window periodically to keep rounding drift out of long series
            if i % 256 == 255 {
                sum = bars[i + 1 - period..=i].iter().map(|b| b.close).sum();
            }
            sum / period as f64
        } else {
            0.0
        };

        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid,
            value: IndicatorValue::Simple(value),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::{from_closes, wavy};
    use approx::assert_relative_eq;

    #[test]
    fn sma_warmup() {
        let bars = from_closes(&[10.0, 20.0, 30.0, 40.0]);
        let series = calculate_sma(&bars, 3);
        assert_eq!(series.values.len(), 4);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert!(series.values[3].valid);
    }

    #[test]
    fn sma_values() {
        let bars = from_closes(&[10.0, 20.0, 30.0, 40.0]);
        let series = calculate_sma(&bars, 3);
        assert_relative_eq!(series.simple_at(2).unwrap(), 20.0);
        assert_relative_eq!(series.simple_at(3).unwrap(), 30.0);
    }

    #[test]
    fn sma_matches_closed_form_on_long_series() {
        let bars = wavy(600);
        let period = 20;
        let series = calculate_sma(&bars, period);
        for i in period - 1..bars.len() {
            let expected: f64 =
                bars[i + 1 - period..=i].iter().map(|b| b.close).sum::<f64>() / period as f64;
            assert_relative_eq!(series.simple_at(i).unwrap(), expected, max_relative = 1e-9);
        }
    }

    #[test]
    fn sma_insufficient_history() {
        let bars = from_closes(&[10.0, 20.0]);
        let series = calculate_sma(&bars, 5);
        assert_eq!(series.values.len(), 2);
        assert!(series.first_valid().is_none());
    }

    #[test]
    fn sma_period_0() {
        let bars = from_closes(&[10.0, 20.0]);
        let series = calculate_sma(&bars, 0);
        assert!(series.values.is_empty());
        assert_eq!(series.indicator_type, IndicatorType::Sma(0));
    }
}
