//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) bars are invalid.

use crate::domain::bar::Bar;
use crate::domain::indicator::stddev::window_stats;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

pub fn calculate_bollinger(bars: &[Bar], period: usize, multiplier: f64) -> IndicatorSeries {
    let indicator_type = IndicatorType::Bollinger {
        period,
        stddev_mult_x100: (multiplier * 100.0).round().max(0.0) as u32,
    };

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let bands = window_stats(bars, i, period).map(|(middle, sd)| (
                middle + multiplier * sd,
                middle,
                middle - multiplier * sd,
            ));
            let (upper, middle, lower) = bands.unwrap_or((0.0, 0.0, 0.0));
            IndicatorPoint {
                timestamp: bar.timestamp,
                valid: bands.is_some(),
                value: IndicatorValue::Bollinger {
                    upper,
                    middle,
                    lower,
                },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::{from_closes, wavy};
    use approx::assert_relative_eq;

    fn bands(series: &IndicatorSeries, i: usize) -> (f64, f64, f64) {
        match series.value_at(i) {
            Some(IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            }) => (upper, middle, lower),
            other => panic!("expected Bollinger value, got {:?}", other),
        }
    }

    #[test]
    fn bollinger_warmup() {
        let bars = from_closes(&[1.0, 2.0, 3.0, 4.0]);
        let series = calculate_bollinger(&bars, 3, 2.0);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert!(series.values[3].valid);
    }

    #[test]
    fn bollinger_constant_prices_collapse() {
        let bars = from_closes(&[50.0; 5]);
        let series = calculate_bollinger(&bars, 3, 2.0);
        let (upper, middle, lower) = bands(&series, 4);
        assert_relative_eq!(upper, 50.0);
        assert_relative_eq!(middle, 50.0);
        assert_relative_eq!(lower, 50.0);
    }

    #[test]
    fn bollinger_known_values() {
        let bars = from_closes(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let series = calculate_bollinger(&bars, 8, 2.0);
        // mean 5, population stddev 2
        let (upper, middle, lower) = bands(&series, 7);
        assert_relative_eq!(middle, 5.0, max_relative = 1e-9);
        assert_relative_eq!(upper, 9.0, max_relative = 1e-9);
        assert_relative_eq!(lower, 1.0, max_relative = 1e-9);
    }

    #[test]
    fn bollinger_bands_are_symmetric() {
        let bars = wavy(60);
        let series = calculate_bollinger(&bars, DEFAULT_PERIOD, DEFAULT_MULTIPLIER);
        for i in DEFAULT_PERIOD - 1..bars.len() {
            let (upper, middle, lower) = bands(&series, i);
            assert!(upper >= middle && middle >= lower);
            assert_relative_eq!(upper - middle, middle - lower, max_relative = 1e-9);
        }
    }

    #[test]
    fn bollinger_indicator_type() {
        let series = calculate_bollinger(&[], 20, 2.5);
        assert_eq!(
            series.indicator_type,
            IndicatorType::Bollinger {
                period: 20,
                stddev_mult_x100: 250
            }
        );
    }

    #[test]
    fn bollinger_period_0_is_never_valid() {
        let bars = from_closes(&[1.0, 2.0]);
        let series = calculate_bollinger(&bars, 0, 2.0);
        assert!(series.first_valid().is_none());
    }
}
