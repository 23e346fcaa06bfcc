//! Average Directional Index with +DI / -DI.
//!
//! For i >= 1:
//! - up = H[i] - H[i-1], down = L[i-1] - L[i]
//! - +DM = up if up > down and up > 0, else 0
//! - -DM = down if down > up and down > 0, else 0 (ties zero both)
//!
//! +DI = 100 * Wilder(+DM) / Wilder(TR), -DI likewise, DX = 100 * |+DI - -DI| / (+DI + -DI).
//! ADX is the simple mean of the last n DX values.
//!
//! A bar whose DI sum (or smoothed TR) is zero has no DX; any ADX window
//! containing such a bar is invalid. Warmup: first (2n-1) bars are invalid.

use crate::domain::bar::Bar;
use crate::domain::indicator::atr::wilder_smooth;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_adx(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Adx(period));
    }

    let moves = bars.len().saturating_sub(1);
    let mut plus_dm = Vec::with_capacity(moves);
    let mut minus_dm = Vec::with_capacity(moves);
    let mut tr = Vec::with_capacity(moves);

    for i in 1..bars.len() {
        let up = bars[i].high - bars[i - 1].high;
        let down = bars[i - 1].low - bars[i].low;
        plus_dm.push(if up > down && up > 0.0 { up } else { 0.0 });
        minus_dm.push(if down > up && down > 0.0 { down } else { 0.0 });
        tr.push(bars[i].true_range(bars[i - 1].close));
    }

    let smooth_tr = wilder_smooth(&tr, period);
    let smooth_plus = wilder_smooth(&plus_dm, period);
    let smooth_minus = wilder_smooth(&minus_dm, period);

    // di[j] / dx[j] belong to bar j + 1
    let mut di: Vec<Option<(f64, f64)>> = Vec::with_capacity(moves);
    let mut dx: Vec<Option<f64>> = Vec::with_capacity(moves);
    for j in 0..moves {
        let pair = match (smooth_tr[j], smooth_plus[j], smooth_minus[j]) {
            (Some(atr), Some(p), Some(m)) if atr > 0.0 => Some((100.0 * p / atr, 100.0 * m / atr)),
            _ => None,
        };
        di.push(pair);
        dx.push(pair.and_then(|(p, m)| {
            let sum = p + m;
            if sum > 0.0 {
                Some(100.0 * (p - m).abs() / sum)
            } else {
                None
            }
        }));
    }

    let mut values = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let point = if i == 0 {
            None
        } else {
            let j = i - 1;
            let adx = if j + 1 >= period {
                dx[j + 1 - period..=j]
                    .iter()
                    .try_fold(0.0, |acc, v| v.map(|x| acc + x))
                    .map(|sum| sum / period as f64)
            } else {
                None
            };
            match (adx, di[j]) {
                (Some(adx), Some((plus_di, minus_di))) => Some(IndicatorValue::Adx {
                    adx,
                    plus_di,
                    minus_di,
                }),
                _ => None,
            }
        };

        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid: point.is_some(),
            value: point.unwrap_or(IndicatorValue::Adx {
                adx: 0.0,
                plus_di: 0.0,
                minus_di: 0.0,
            }),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Adx(period),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::{from_hlc, wavy};
    use approx::assert_relative_eq;

    fn adx_parts(series: &IndicatorSeries, i: usize) -> Option<(f64, f64, f64)> {
        match series.value_at(i)? {
            IndicatorValue::Adx {
                adx,
                plus_di,
                minus_di,
            } => Some((adx, plus_di, minus_di)),
            _ => None,
        }
    }

    #[test]
    fn adx_warmup() {
        let bars = wavy(40);
        let series = calculate_adx(&bars, 5);
        assert_eq!(series.values.len(), 40);
        assert_eq!(series.first_valid(), Some(9));
    }

    #[test]
    fn adx_steady_uptrend_is_one_sided() {
        let rows: Vec<(f64, f64, f64)> = (0..20)
            .map(|i| {
                let base = 100.0 + i as f64;
                (base + 1.0, base - 1.0, base)
            })
            .collect();
        let bars = from_hlc(&rows);
        let series = calculate_adx(&bars, 5);
        let (adx, plus_di, minus_di) = adx_parts(&series, 19).unwrap();
        assert_relative_eq!(adx, 100.0, max_relative = 1e-9);
        assert!(plus_di > 0.0);
        assert_relative_eq!(minus_di, 0.0);
    }

    #[test]
    fn adx_flat_market_is_undefined_not_a_crash() {
        let bars = from_hlc(&[(100.0, 100.0, 100.0); 30]);
        let series = calculate_adx(&bars, 5);
        assert_eq!(series.values.len(), 30);
        assert!(series.first_valid().is_none());
    }

    #[test]
    fn adx_equal_moves_count_for_neither_side() {
        // outside bar: high up by 2, low down by 2 → +DM = -DM = 0
        let bars = from_hlc(&[(101.0, 99.0, 100.0), (103.0, 97.0, 100.0)]);
        let series = calculate_adx(&bars, 1);
        // DI sum is zero, so DX (and ADX) is undefined for bar 1
        assert!(series.value_at(1).is_none());
    }

    #[test]
    fn adx_matches_closed_form() {
        let bars = wavy(80);
        let n = 7;
        let series = calculate_adx(&bars, n);

        let mut tr = Vec::new();
        let mut pdm = Vec::new();
        let mut mdm = Vec::new();
        for i in 1..bars.len() {
            let up = bars[i].high - bars[i - 1].high;
            let down = bars[i - 1].low - bars[i].low;
            pdm.push(if up > down && up > 0.0 { up } else { 0.0 });
            mdm.push(if down > up && down > 0.0 { down } else { 0.0 });
            tr.push(bars[i].true_range(bars[i - 1].close));
        }
        let wilder = |xs: &[f64]| -> Vec<f64> {
            let mut out = vec![f64::NAN; xs.len()];
            let mut avg = xs[..n].iter().sum::<f64>() / n as f64;
            out[n - 1] = avg;
            for j in n..xs.len() {
                avg = (avg * (n - 1) as f64 + xs[j]) / n as f64;
                out[j] = avg;
            }
            out
        };
        let (str_, sp, sm) = (wilder(&tr), wilder(&pdm), wilder(&mdm));
        let dx: Vec<f64> = (0..tr.len())
            .map(|j| {
                let p = 100.0 * sp[j] / str_[j];
                let m = 100.0 * sm[j] / str_[j];
                100.0 * (p - m).abs() / (p + m)
            })
            .collect();

        for i in (2 * n - 1)..bars.len() {
            let j = i - 1;
            let expected = dx[j + 1 - n..=j].iter().sum::<f64>() / n as f64;
            let (adx, plus_di, _) = adx_parts(&series, i).unwrap();
            assert_relative_eq!(adx, expected, max_relative = 1e-9);
            assert_relative_eq!(plus_di, 100.0 * sp[j] / str_[j], max_relative = 1e-9);
        }
    }

    #[test]
    fn adx_period_0() {
        let bars = wavy(5);
        assert!(calculate_adx(&bars, 0).values.is_empty());
    }
}
