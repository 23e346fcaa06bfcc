//! Signal evaluation.
//!
//! `evaluate` is a pure function of the previous and current bar snapshots and
//! the strategy. Both snapshots must carry every field the strategy reads,
//! otherwise the result is `Hold`. Breakouts are measured against the level in
//! force on the previous bar, and must close strictly through it.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::snapshot::IndicatorSnapshot;
use crate::domain::strategy::Strategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Buy,
    Sell,
    Hold,
}

impl SignalKind {
    pub fn is_actionable(&self) -> bool {
        !matches!(self, SignalKind::Hold)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Buy => write!(f, "BUY"),
            SignalKind::Sell => write!(f, "SELL"),
            SignalKind::Hold => write!(f, "HOLD"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub kind: SignalKind,
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    /// Close of the bar the signal was evaluated on.
    pub close: f64,
    /// Indicators whose conditions produced the signal. Empty for `Hold`.
    pub triggers: Vec<&'static str>,
    /// Set when buy and sell conditions held together and were discarded.
    pub contradiction: bool,
}

impl Signal {
    pub fn hold(snapshot: &IndicatorSnapshot) -> Self {
        Self {
            kind: SignalKind::Hold,
            index: snapshot.index,
            timestamp: snapshot.timestamp,
            close: snapshot.close,
            triggers: Vec::new(),
            contradiction: false,
        }
    }
}

/// Buy and sell conditions for one bar pair.
#[derive(Debug, Clone, Copy, Default)]
struct Sides {
    buy: bool,
    sell: bool,
}

pub fn evaluate(prev: &IndicatorSnapshot, curr: &IndicatorSnapshot, strategy: &Strategy) -> Signal {
    let Some(sides) = (populated(prev, strategy) && populated(curr, strategy))
        .then(|| rules(prev, curr, strategy))
        .flatten()
    else {
        return Signal::hold(curr);
    };

    resolve(sides, curr, strategy)
}

fn resolve(sides: Sides, curr: &IndicatorSnapshot, strategy: &Strategy) -> Signal {
    let mut signal = Signal::hold(curr);
    match (sides.buy, sides.sell) {
        (true, true) => {
            warn!(
                strategy = strategy.kind().as_str(),
                index = curr.index,
                timestamp = %curr.timestamp,
                "buy and sell conditions both hold, emitting hold"
            );
            signal.contradiction = true;
        }
        (true, false) => {
            signal.kind = SignalKind::Buy;
            signal.triggers = triggers(strategy).to_vec();
        }
        (false, true) => {
            signal.kind = SignalKind::Sell;
            signal.triggers = triggers(strategy).to_vec();
        }
        (false, false) => {}
    }
    signal
}

/// Evaluate every pair of consecutive snapshots. The first bar is always `Hold`.
pub fn evaluate_all(snapshots: &[IndicatorSnapshot], strategy: &Strategy) -> Vec<Signal> {
    let Some(first) = snapshots.first() else {
        return Vec::new();
    };
    std::iter::once(Signal::hold(first))
        .chain(
            snapshots
                .windows(2)
                .map(|pair| evaluate(&pair[0], &pair[1], strategy)),
        )
        .collect()
}

fn populated(s: &IndicatorSnapshot, strategy: &Strategy) -> bool {
    let fields: &[Option<f64>] = match strategy {
        Strategy::SrBreakout(_) => return s.resistance.is_some() || s.support.is_some(),
        Strategy::FractalBreakout(_) => {
            return s.sma_trend.is_some() && (s.resistance.is_some() || s.support.is_some());
        }
        Strategy::DirectionalTrend(_) => {
            if s.resistance.is_none() && s.support.is_none() {
                return false;
            }
            &[s.adx, s.plus_di, s.minus_di]
        }
        Strategy::TrendCrossover(_) => {
            if s.resistance.is_none() && s.support.is_none() {
                return false;
            }
            &[s.sma_fast, s.sma_slow, s.adx]
        }
        Strategy::MeanReversion(_) => &[s.bb_upper, s.bb_lower, s.rsi, s.macd_histogram],
        Strategy::MomentumScalp(_) => &[s.ema_fast, s.ema_slow, s.rsi, s.stochastic],
        Strategy::VolatilityReversion(_) => &[s.bb_upper, s.bb_lower, s.macd_line, s.macd_signal],
        Strategy::RangeBreakout(_) => &[s.range_high, s.range_low, s.atr],
        Strategy::BandPullback(_) => &[s.ema_fast, s.ema_slow, s.rsi, s.bb_upper, s.bb_lower],
    };
    fields.iter().all(Option::is_some)
}

fn triggers(strategy: &Strategy) -> &'static [&'static str] {
    match strategy {
        Strategy::SrBreakout(_) => &["close", "touch_level"],
        Strategy::TrendCrossover(_) => &["sma_fast", "sma_slow", "adx", "touch_level"],
        Strategy::MeanReversion(_) => &["bollinger", "rsi", "macd_histogram"],
        Strategy::FractalBreakout(_) => &["fractal_level", "sma_trend"],
        Strategy::DirectionalTrend(_) => &["adx", "di", "touch_level"],
        Strategy::MomentumScalp(_) => &["ema_fast", "ema_slow", "rsi", "stochastic"],
        Strategy::VolatilityReversion(_) => &["bollinger", "macd"],
        Strategy::RangeBreakout(_) => &["session_range", "atr"],
        Strategy::BandPullback(_) => &["ema_fast", "ema_slow", "rsi", "bollinger"],
    }
}

/// Previous close below `level`, current close strictly above it.
fn breaks_up(prev_close: f64, curr_close: f64, level: Option<f64>) -> bool {
    level.is_some_and(|l| prev_close < l && curr_close > l)
}

fn breaks_down(prev_close: f64, curr_close: f64, level: Option<f64>) -> bool {
    level.is_some_and(|l| prev_close > l && curr_close < l)
}

fn rules(prev: &IndicatorSnapshot, curr: &IndicatorSnapshot, strategy: &Strategy) -> Option<Sides> {
    let sides = match strategy {
        Strategy::SrBreakout(_) => Sides {
            buy: breaks_up(prev.close, curr.close, prev.resistance),
            sell: breaks_down(prev.close, curr.close, prev.support),
        },
        Strategy::TrendCrossover(p) => {
            let (pf, ps) = (prev.sma_fast?, prev.sma_slow?);
            let (cf, cs) = (curr.sma_fast?, curr.sma_slow?);
            let trending = curr.adx? > p.adx_threshold;
            Sides {
                buy: trending && pf <= ps && cf > cs && breaks_up(prev.close, curr.close, prev.resistance),
                sell: trending && pf >= ps && cf < cs && breaks_down(prev.close, curr.close, prev.support),
            }
        }
        Strategy::MeanReversion(p) => {
            let (prev_hist, hist) = (prev.macd_histogram?, curr.macd_histogram?);
            let rsi = curr.rsi?;
            Sides {
                buy: curr.close <= curr.bb_lower?
                    && rsi < p.rsi_oversold
                    && prev_hist <= 0.0
                    && hist > 0.0,
                sell: curr.close >= curr.bb_upper?
                    && rsi > p.rsi_overbought
                    && prev_hist >= 0.0
                    && hist < 0.0,
            }
        }
        Strategy::FractalBreakout(_) => {
            let trend = curr.sma_trend?;
            Sides {
                buy: prev.resistance
                    .is_some_and(|r| prev.close <= r && curr.close > r && curr.close > trend),
                sell: prev.support
                    .is_some_and(|s| prev.close >= s && curr.close < s && curr.close < trend),
            }
        }
        Strategy::DirectionalTrend(p) => {
            let trending = curr.adx? > p.adx_threshold;
            let up = curr.plus_di? > curr.minus_di?;
            Sides {
                buy: trending
                    && up
                    && prev.resistance.is_some_and(|r| prev.close > r && curr.close > r),
                sell: trending
                    && !up
                    && prev.support.is_some_and(|s| prev.close < s && curr.close < s),
            }
        }
        Strategy::MomentumScalp(p) => {
            let (prev_rsi, rsi) = (prev.rsi?, curr.rsi?);
            let (fast, slow) = (curr.ema_fast?, curr.ema_slow?);
            let stoch = curr.stochastic?;
            Sides {
                buy: fast > slow
                    && prev_rsi < p.rsi_oversold
                    && rsi > p.rsi_recovery
                    && stoch < p.stoch_low,
                sell: fast < slow
                    && prev_rsi > p.rsi_overbought
                    && rsi < p.rsi_relapse
                    && stoch > p.stoch_high,
            }
        }
        Strategy::VolatilityReversion(_) => {
            let (line, signal) = (curr.macd_line?, curr.macd_signal?);
            Sides {
                buy: curr.close < curr.bb_lower? && line > signal,
                sell: curr.close > curr.bb_upper? && line < signal,
            }
        }
        // Extreme of the current bar past the range, no crossing needed.
        Strategy::RangeBreakout(p) => {
            let margin = curr.atr? * p.entry_threshold;
            Sides {
                buy: curr.high > curr.range_high? + margin,
                sell: curr.low < curr.range_low? - margin,
            }
        }
        Strategy::BandPullback(p) => {
            let (fast, slow, rsi) = (curr.ema_fast?, curr.ema_slow?, curr.rsi?);
            Sides {
                buy: curr.close > fast
                    && curr.close > slow
                    && rsi > p.rsi_buy_min
                    && rsi <= p.rsi_buy_max
                    && curr.low <= curr.bb_lower?,
                sell: curr.close < fast
                    && curr.close < slow
                    && rsi >= p.rsi_sell_min
                    && rsi < p.rsi_sell_max
                    && curr.high >= curr.bb_upper?,
            }
        }
    };
    Some(sides)
}
