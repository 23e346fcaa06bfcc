//! RSI (Relative Strength Index) indicator.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over first n price changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n bars are invalid (need n price changes to compute initial average).

use crate::domain::bar::Bar;
use crate::domain::indicator::atr::wilder_smooth;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_rsi(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        let values = bars
            .iter()
            .map(|b| IndicatorPoint {
                timestamp: b.timestamp,
                valid: false,
                value: IndicatorValue::Simple(0.0),
            })
            .collect();
        return IndicatorSeries {
            indicator_type: IndicatorType::Rsi(period),
            values,
        };
    }

    let mut gains = Vec::with_capacity(bars.len().saturating_sub(1));
    let mut losses = Vec::with_capacity(bars.len().saturating_sub(1));
    for pair in bars.windows(2) {
        let change = pair[1].close - pair[0].close;
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let avg_gain = wilder_smooth(&gains, period);
    let avg_loss = wilder_smooth(&losses, period);

    let mut values = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let rsi = if i == 0 {
            None
        } else {
            match (avg_gain[i - 1], avg_loss[i - 1]) {
                (Some(gain), Some(loss)) => Some(rsi_from_averages(gain, loss)),
                _ => None,
            }
        };
        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid: rsi.is_some(),
            value: IndicatorValue::Simple(rsi.unwrap_or(0.0)),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::{from_closes, wavy};
    use approx::assert_relative_eq;

    #[test]
    fn rsi_empty_bars() {
        let series = calculate_rsi(&[], 14);
        assert_eq!(series.values.len(), 0);
    }

    #[test]
    fn rsi_single_bar() {
        let bars = from_closes(&[100.0]);
        let series = calculate_rsi(&bars, 14);
        assert_eq!(series.values.len(), 1);
        assert!(!series.values[0].valid);
    }

    #[test]
    fn rsi_warmup_period() {
        let closes: Vec<f64> = (1..=15).map(|i| 100.0 + (i as f64 % 5.0) * 2.0).collect();
        let series = calculate_rsi(&from_closes(&closes), 14);

        assert_eq!(series.values.len(), 15);
        for i in 0..14 {
            assert!(!series.values[i].valid, "Bar {} should be invalid", i);
        }
        assert!(series.values[14].valid, "Bar 14 should be valid");
    }

    #[test]
    fn rsi_all_gains_saturates_at_100() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let series = calculate_rsi(&from_closes(&closes), 14);
        assert_relative_eq!(series.simple_at(14).unwrap(), 100.0);
    }

    #[test]
    fn rsi_flat_prices_saturate_at_100() {
        let series = calculate_rsi(&from_closes(&[50.0; 10]), 3);
        assert_relative_eq!(series.simple_at(9).unwrap(), 100.0);
    }

    #[test]
    fn rsi_all_losses_no_gains() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        let series = calculate_rsi(&from_closes(&closes), 14);
        assert_relative_eq!(series.simple_at(14).unwrap(), 0.0);
    }

    #[test]
    fn rsi_in_range() {
        let series = calculate_rsi(&wavy(60), 14);
        for point in series.values.iter().filter(|p| p.valid) {
            if let IndicatorValue::Simple(rsi) = point.value {
                assert!((0.0..=100.0).contains(&rsi), "RSI {} out of range", rsi);
            }
        }
    }

    #[test]
    fn rsi_matches_closed_form() {
        let bars = wavy(50);
        let n = 9;
        let series = calculate_rsi(&bars, n);

        let changes: Vec<f64> = bars.windows(2).map(|w| w[1].close - w[0].close).collect();
        let mut g = changes[..n].iter().map(|c| c.max(0.0)).sum::<f64>() / n as f64;
        let mut l = changes[..n].iter().map(|c| (-c).max(0.0)).sum::<f64>() / n as f64;
        assert_relative_eq!(
            series.simple_at(n).unwrap(),
            100.0 - 100.0 / (1.0 + g / l),
            max_relative = 1e-9
        );
        for i in (n + 1)..bars.len() {
            let c = changes[i - 1];
            g = (g * (n - 1) as f64 + c.max(0.0)) / n as f64;
            l = (l * (n - 1) as f64 + (-c).max(0.0)) / n as f64;
            assert_relative_eq!(
                series.simple_at(i).unwrap(),
                100.0 - 100.0 / (1.0 + g / l),
                max_relative = 1e-9
            );
        }
    }

    #[test]
    fn rsi_zero_period() {
        let series = calculate_rsi(&from_closes(&[100.0, 101.0]), 0);
        assert_eq!(series.values.len(), 2);
        assert!(series.values.iter().all(|p| !p.valid));
    }
}
