//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters
//! - `IndicatorSeries`: A time series of indicator values, one point per bar
//!
//! Every calculation is a batch pass over a bar slice. A point at index `i`
//! only depends on bars `0..=i`; points without enough history are marked
//! invalid rather than omitted, so series indices line up with bar indices.
//! Structural support/resistance levels live in [`levels`].

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod levels;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod stochastic;

pub use adx::calculate_adx;
pub use atr::{calculate_atr, calculate_atr_expansion};
pub use bollinger::calculate_bollinger;
pub use ema::calculate_ema;
pub use macd::calculate_macd;
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;
pub use stddev::calculate_stddev;
pub use stochastic::calculate_stochastic;

use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub timestamp: DateTime<Utc>,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
    Adx {
        adx: f64,
        plus_di: f64,
        minus_di: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Adx(usize),
    Stddev(usize),
    Stochastic(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
    AtrExpansion {
        period: usize,
        window: usize,
        factor_x100: u32,
    },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub(crate) fn empty(indicator_type: IndicatorType) -> Self {
        Self {
            indicator_type,
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `index`, or `None` when the point is missing or still warming up.
    pub fn value_at(&self, index: usize) -> Option<IndicatorValue> {
        self.values
            .get(index)
            .filter(|p| p.valid)
            .map(|p| p.value)
    }

    /// Scalar value at `index` for single-valued indicators.
    pub fn simple_at(&self, index: usize) -> Option<f64> {
        match self.value_at(index)? {
            IndicatorValue::Simple(v) => Some(v),
            _ => None,
        }
    }

    pub fn latest(&self) -> Option<IndicatorValue> {
        self.values.len().checked_sub(1).and_then(|i| self.value_at(i))
    }

    /// Index of the first valid point.
    pub fn first_valid(&self) -> Option<usize> {
        self.values.iter().position(|p| p.valid)
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Adx(period) => write!(f, "ADX({})", period),
            IndicatorType::Stddev(period) => write!(f, "STDDEV({})", period),
            IndicatorType::Stochastic(period) => write!(f, "STOCHASTIC({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
            IndicatorType::AtrExpansion {
                period,
                window,
                factor_x100,
            } => {
                let factor = *factor_x100 as f64 / 100.0;
                write!(f, "ATR_EXPANSION({},{},{})", period, window, factor)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_type_display_sma() {
        assert_eq!(IndicatorType::Sma(20).to_string(), "SMA(20)");
    }

    #[test]
    fn indicator_type_display_macd() {
        let macd = IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        };
        assert_eq!(macd.to_string(), "MACD(12,26,9)");
    }

    #[test]
    fn indicator_type_display_bollinger() {
        let boll = IndicatorType::Bollinger {
            period: 20,
            stddev_mult_x100: 200,
        };
        assert_eq!(boll.to_string(), "BOLLINGER(20,2)");
    }

    #[test]
    fn indicator_type_display_atr_expansion() {
        let exp = IndicatorType::AtrExpansion {
            period: 14,
            window: 14,
            factor_x100: 150,
        };
        assert_eq!(exp.to_string(), "ATR_EXPANSION(14,14,1.5)");
    }

    #[test]
    fn series_accessors_respect_validity() {
        let bars = test_bars::from_closes(&[1.0, 2.0, 3.0]);
        let series = calculate_sma(&bars, 2);
        assert_eq!(series.simple_at(0), None);
        assert_eq!(series.simple_at(1), Some(1.5));
        assert_eq!(series.simple_at(7), None);
        assert_eq!(series.first_valid(), Some(1));
        assert_eq!(series.latest(), Some(IndicatorValue::Simple(2.5)));
    }

    #[test]
    fn indicator_type_hash_eq() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(IndicatorType::Sma(20), "sma20");
        map.insert(IndicatorType::Adx(14), "adx14");

        assert_eq!(map.get(&IndicatorType::Sma(20)), Some(&"sma20"));
        assert_eq!(map.get(&IndicatorType::Adx(14)), Some(&"adx14"));
        assert_eq!(map.get(&IndicatorType::Sma(50)), None);
    }
}
