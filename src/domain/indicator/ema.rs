//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are invalid.

use crate::domain::bar::Bar;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_ema(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries::empty(IndicatorType::Ema(period));
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let values = ema_values(&closes, period)
        .into_iter()
        .zip(bars)
        .map(|(ema, bar)| IndicatorPoint {
            timestamp: bar.timestamp,
            valid: ema.is_some(),
            value: IndicatorValue::Simple(ema.unwrap_or(0.0)),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}

/// EMA over an arbitrary value sequence, `None` during warmup.
pub(crate) fn ema_values(input: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(input.len());
    if period == 0 {
        out.resize(input.len(), None);
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, &value) in input.iter().enumerate() {
        if i < period - 1 {
            sum += value;
            out.push(None);
        } else if i == period - 1 {
            sum += value;
            ema = sum / period as f64;
            out.push(Some(ema));
        } else {
            ema = value * k + ema * (1.0 - k);
            out.push(Some(ema));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::{from_closes, wavy};
    use approx::assert_relative_eq;

    #[test]
    fn ema_warmup() {
        let bars = from_closes(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let series = calculate_ema(&bars, 3);

        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert!(series.values[3].valid);
        assert!(series.values[4].valid);
    }

    #[test]
    fn ema_period_1_tracks_close() {
        let bars = from_closes(&[10.0, 20.0, 30.0]);
        let series = calculate_ema(&bars, 1);
        assert_relative_eq!(series.simple_at(0).unwrap(), 10.0);
        assert_relative_eq!(series.simple_at(1).unwrap(), 20.0);
        assert_relative_eq!(series.simple_at(2).unwrap(), 30.0);
    }

    #[test]
    fn ema_seed_is_sma() {
        let bars = from_closes(&[10.0, 20.0, 30.0]);
        let series = calculate_ema(&bars, 3);
        assert_relative_eq!(series.simple_at(2).unwrap(), 20.0);
    }

    #[test]
    fn ema_recursive_calculation() {
        let bars = from_closes(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let series = calculate_ema(&bars, 3);

        let k = 2.0 / 4.0;
        let sma = 20.0;
        let ema_3 = 40.0 * k + sma * (1.0 - k);
        let ema_4 = 50.0 * k + ema_3 * (1.0 - k);

        assert_relative_eq!(series.simple_at(3).unwrap(), ema_3);
        assert_relative_eq!(series.simple_at(4).unwrap(), ema_4);
    }

    #[test]
    fn ema_matches_closed_form_weights() {
        // EMA[n-1+m] = (1-k)^m * seed + sum_{j=0}^{m-1} k (1-k)^j C[n-1+m-j]
        let bars = wavy(60);
        let period = 10;
        let series = calculate_ema(&bars, period);
        let k = 2.0 / (period as f64 + 1.0);
        let seed: f64 = bars[..period].iter().map(|b| b.close).sum::<f64>() / period as f64;

        for m in 0..(bars.len() - period + 1) {
            let idx = period - 1 + m;
            let mut expected = (1.0 - k).powi(m as i32) * seed;
            for j in 0..m {
                expected += k * (1.0 - k).powi(j as i32) * bars[idx - j].close;
            }
            assert_relative_eq!(series.simple_at(idx).unwrap(), expected, max_relative = 1e-9);
        }
    }

    #[test]
    fn ema_equal_prices() {
        let bars = from_closes(&[100.0; 5]);
        let series = calculate_ema(&bars, 3);
        for i in 2..5 {
            assert_relative_eq!(series.simple_at(i).unwrap(), 100.0);
        }
    }

    #[test]
    fn ema_empty_bars() {
        let series = calculate_ema(&[], 3);
        assert!(series.values.is_empty());
    }

    #[test]
    fn ema_period_0() {
        let bars = from_closes(&[10.0, 20.0]);
        let series = calculate_ema(&bars, 0);
        assert!(series.values.is_empty());
    }

    #[test]
    fn ema_values_marks_warmup_as_none() {
        let out = ema_values(&[1.0, 2.0, 3.0], 2);
        assert_eq!(out[0], None);
        assert_eq!(out[1], Some(1.5));
        assert!(out[2].is_some());
    }
}
