//! Strategy kinds and their parameters.
//!
//! Each strategy is a variant holding its own parameter struct. A strategy
//! decides which indicators go into the per-bar snapshots; the signal
//! evaluator in [`crate::domain::signal`] applies its rules.

use std::fmt;
use std::str::FromStr;

use crate::domain::bar::Bar;
use crate::domain::indicator::{
    calculate_adx, calculate_atr, calculate_bollinger, calculate_ema, calculate_macd,
    calculate_rsi, calculate_sma, calculate_stochastic, IndicatorValue,
};
use crate::domain::indicator::macd;
use crate::domain::session::HourWindow;
use crate::domain::snapshot::{IndicatorSnapshot, SnapshotBuilder};

/// Touch-count support/resistance breakout.
#[derive(Debug, Clone, PartialEq)]
pub struct SrBreakoutParams {
    pub window: usize,
    pub touch_threshold: usize,
}

impl Default for SrBreakoutParams {
    fn default() -> Self {
        Self {
            window: 20,
            touch_threshold: 2,
        }
    }
}

/// SMA crossover gated by ADX and a breakout through a touch-count level.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendCrossoverParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub adx_period: usize,
    pub adx_threshold: f64,
    pub window: usize,
    pub touch_threshold: usize,
}

impl Default for TrendCrossoverParams {
    fn default() -> Self {
        Self {
            fast_period: 20,
            slow_period: 50,
            adx_period: 14,
            adx_threshold: 25.0,
            window: 50,
            touch_threshold: 2,
        }
    }
}

/// Bollinger band touch with RSI extreme and MACD histogram sign flip.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanReversionParams {
    pub bb_period: usize,
    pub bb_multiplier: f64,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl Default for MeanReversionParams {
    fn default() -> Self {
        Self {
            bb_period: 20,
            bb_multiplier: 2.0,
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            macd_fast: macd::DEFAULT_FAST,
            macd_slow: macd::DEFAULT_SLOW,
            macd_signal: macd::DEFAULT_SIGNAL,
        }
    }
}

/// Breakout through the latest aggregated fractal level with an SMA filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FractalBreakoutParams {
    pub tolerance: f64,
    pub touch_threshold: usize,
    pub trend_period: usize,
}

impl Default for FractalBreakoutParams {
    fn default() -> Self {
        Self {
            tolerance: 0.3,
            touch_threshold: 1,
            trend_period: 50,
        }
    }
}

/// ADX/DI trend direction with closes held beyond a touch-count level.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalTrendParams {
    pub adx_period: usize,
    pub adx_threshold: f64,
    pub window: usize,
    pub touch_threshold: usize,
}

impl Default for DirectionalTrendParams {
    fn default() -> Self {
        Self {
            adx_period: 14,
            adx_threshold: 25.0,
            window: 20,
            touch_threshold: 2,
        }
    }
}

/// EMA alignment, RSI recovering from an extreme, stochastic at an extreme.
#[derive(Debug, Clone, PartialEq)]
pub struct MomentumScalpParams {
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub rsi_period: usize,
    pub stoch_period: usize,
    pub rsi_oversold: f64,
    pub rsi_recovery: f64,
    pub rsi_overbought: f64,
    pub rsi_relapse: f64,
    pub stoch_low: f64,
    pub stoch_high: f64,
}

impl Default for MomentumScalpParams {
    fn default() -> Self {
        Self {
            ema_fast: 8,
            ema_slow: 21,
            rsi_period: 9,
            stoch_period: 14,
            rsi_oversold: 35.0,
            rsi_recovery: 40.0,
            rsi_overbought: 65.0,
            rsi_relapse: 60.0,
            stoch_low: 20.0,
            stoch_high: 80.0,
        }
    }
}

/// Close outside a Bollinger band with MACD already turning back.
#[derive(Debug, Clone, PartialEq)]
pub struct VolatilityReversionParams {
    pub bb_period: usize,
    pub bb_multiplier: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl Default for VolatilityReversionParams {
    fn default() -> Self {
        Self {
            bb_period: 20,
            bb_multiplier: 2.0,
            macd_fast: macd::DEFAULT_FAST,
            macd_slow: macd::DEFAULT_SLOW,
            macd_signal: macd::DEFAULT_SIGNAL,
        }
    }
}

/// Break of the overnight range by more than a fraction of ATR.
///
/// The range is the high and low of the bars inside the range hours among
/// the `range_period` bars before the current one.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeBreakoutParams {
    pub range_hours: HourWindow,
    pub range_period: usize,
    pub atr_period: usize,
    pub entry_threshold: f64,
}

impl Default for RangeBreakoutParams {
    fn default() -> Self {
        Self {
            range_hours: HourWindow::new(0, 6),
            range_period: 30,
            atr_period: 14,
            entry_threshold: 0.7,
        }
    }
}

/// Pullback to a Bollinger band inside an EMA trend with RSI in a mid band.
#[derive(Debug, Clone, PartialEq)]
pub struct BandPullbackParams {
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub rsi_period: usize,
    pub bb_period: usize,
    pub bb_multiplier: f64,
    pub rsi_buy_min: f64,
    pub rsi_buy_max: f64,
    pub rsi_sell_min: f64,
    pub rsi_sell_max: f64,
}

impl Default for BandPullbackParams {
    fn default() -> Self {
        Self {
            ema_fast: 9,
            ema_slow: 21,
            rsi_period: 7,
            bb_period: 20,
            bb_multiplier: 2.0,
            rsi_buy_min: 50.0,
            rsi_buy_max: 65.0,
            rsi_sell_min: 35.0,
            rsi_sell_max: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    SrBreakout(SrBreakoutParams),
    TrendCrossover(TrendCrossoverParams),
    MeanReversion(MeanReversionParams),
    FractalBreakout(FractalBreakoutParams),
    DirectionalTrend(DirectionalTrendParams),
    MomentumScalp(MomentumScalpParams),
    VolatilityReversion(VolatilityReversionParams),
    RangeBreakout(RangeBreakoutParams),
    BandPullback(BandPullbackParams),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    SrBreakout,
    TrendCrossover,
    MeanReversion,
    FractalBreakout,
    DirectionalTrend,
    MomentumScalp,
    VolatilityReversion,
    RangeBreakout,
    BandPullback,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 9] = [
        StrategyKind::SrBreakout,
        StrategyKind::TrendCrossover,
        StrategyKind::MeanReversion,
        StrategyKind::FractalBreakout,
        StrategyKind::DirectionalTrend,
        StrategyKind::MomentumScalp,
        StrategyKind::VolatilityReversion,
        StrategyKind::RangeBreakout,
        StrategyKind::BandPullback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::SrBreakout => "sr_breakout",
            StrategyKind::TrendCrossover => "trend_crossover",
            StrategyKind::MeanReversion => "mean_reversion",
            StrategyKind::FractalBreakout => "fractal_breakout",
            StrategyKind::DirectionalTrend => "directional_trend",
            StrategyKind::MomentumScalp => "momentum_scalp",
            StrategyKind::VolatilityReversion => "volatility_reversion",
            StrategyKind::RangeBreakout => "range_breakout",
            StrategyKind::BandPullback => "band_pullback",
        }
    }

    /// The strategy with every parameter at its default.
    pub fn default_strategy(&self) -> Strategy {
        match self {
            StrategyKind::SrBreakout => Strategy::SrBreakout(Default::default()),
            StrategyKind::TrendCrossover => Strategy::TrendCrossover(Default::default()),
            StrategyKind::MeanReversion => Strategy::MeanReversion(Default::default()),
            StrategyKind::FractalBreakout => Strategy::FractalBreakout(Default::default()),
            StrategyKind::DirectionalTrend => Strategy::DirectionalTrend(Default::default()),
            StrategyKind::MomentumScalp => Strategy::MomentumScalp(Default::default()),
            StrategyKind::VolatilityReversion => {
                Strategy::VolatilityReversion(Default::default())
            }
            StrategyKind::RangeBreakout => Strategy::RangeBreakout(Default::default()),
            StrategyKind::BandPullback => Strategy::BandPullback(Default::default()),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| format!("unknown strategy kind '{}'", s.trim()))
    }
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::SrBreakout(_) => StrategyKind::SrBreakout,
            Strategy::TrendCrossover(_) => StrategyKind::TrendCrossover,
            Strategy::MeanReversion(_) => StrategyKind::MeanReversion,
            Strategy::FractalBreakout(_) => StrategyKind::FractalBreakout,
            Strategy::DirectionalTrend(_) => StrategyKind::DirectionalTrend,
            Strategy::MomentumScalp(_) => StrategyKind::MomentumScalp,
            Strategy::VolatilityReversion(_) => StrategyKind::VolatilityReversion,
            Strategy::RangeBreakout(_) => StrategyKind::RangeBreakout,
            Strategy::BandPullback(_) => StrategyKind::BandPullback,
        }
    }

    /// Bars needed before two consecutive fully-populated snapshots can exist.
    pub fn warmup_bars(&self) -> usize {
        let needed = match self {
            Strategy::SrBreakout(p) => p.window + 1,
            Strategy::TrendCrossover(p) => p
                .slow_period
                .max(p.fast_period)
                .max(2 * p.adx_period)
                .max(p.window + 1),
            Strategy::MeanReversion(p) => p
                .bb_period
                .max(p.rsi_period + 1)
                .max(p.macd_slow.max(p.macd_fast) + p.macd_signal - 1),
            Strategy::FractalBreakout(p) => p.trend_period.max(5),
            Strategy::DirectionalTrend(p) => (2 * p.adx_period).max(p.window + 1),
            Strategy::MomentumScalp(p) => p
                .ema_slow
                .max(p.ema_fast)
                .max(p.rsi_period + 1)
                .max(p.stoch_period),
            Strategy::VolatilityReversion(p) => p
                .bb_period
                .max(p.macd_slow.max(p.macd_fast) + p.macd_signal - 1),
            Strategy::RangeBreakout(p) => p.atr_period.max(p.range_period),
            Strategy::BandPullback(p) => p
                .ema_slow
                .max(p.ema_fast)
                .max(p.rsi_period + 1)
                .max(p.bb_period),
        };
        needed + 1
    }

    /// One snapshot per bar carrying the indicators this strategy reads.
    pub fn snapshots(&self, bars: &[Bar]) -> Vec<IndicatorSnapshot> {
        let builder = SnapshotBuilder::new(bars);
        match self {
            Strategy::SrBreakout(p) => builder.with_touch_levels(p.window, p.touch_threshold),
            Strategy::TrendCrossover(p) => builder
                .with_simple(&calculate_sma(bars, p.fast_period), |s, v| s.sma_fast = Some(v))
                .with_simple(&calculate_sma(bars, p.slow_period), |s, v| s.sma_slow = Some(v))
                .with_series(&calculate_adx(bars, p.adx_period), set_adx)
                .with_touch_levels(p.window, p.touch_threshold),
            Strategy::MeanReversion(p) => builder
                .with_series(&calculate_bollinger(bars, p.bb_period, p.bb_multiplier), set_bands)
                .with_simple(&calculate_rsi(bars, p.rsi_period), |s, v| s.rsi = Some(v))
                .with_series(
                    &calculate_macd(bars, p.macd_fast, p.macd_slow, p.macd_signal),
                    set_macd,
                ),
            Strategy::FractalBreakout(p) => builder
                .with_simple(&calculate_sma(bars, p.trend_period), |s, v| s.sma_trend = Some(v))
                .with_fractal_levels(p.tolerance, p.touch_threshold),
            Strategy::DirectionalTrend(p) => builder
                .with_series(&calculate_adx(bars, p.adx_period), set_adx)
                .with_touch_levels(p.window, p.touch_threshold),
            Strategy::MomentumScalp(p) => builder
                .with_simple(&calculate_ema(bars, p.ema_fast), |s, v| s.ema_fast = Some(v))
                .with_simple(&calculate_ema(bars, p.ema_slow), |s, v| s.ema_slow = Some(v))
                .with_simple(&calculate_rsi(bars, p.rsi_period), |s, v| s.rsi = Some(v))
                .with_simple(&calculate_stochastic(bars, p.stoch_period), |s, v| {
                    s.stochastic = Some(v)
                }),
            Strategy::VolatilityReversion(p) => builder
                .with_series(&calculate_bollinger(bars, p.bb_period, p.bb_multiplier), set_bands)
                .with_series(
                    &calculate_macd(bars, p.macd_fast, p.macd_slow, p.macd_signal),
                    set_macd,
                ),
            Strategy::RangeBreakout(p) => builder
                .with_simple(&calculate_atr(bars, p.atr_period), |s, v| s.atr = Some(v))
                .with_session_range(p.range_hours, p.range_period),
            Strategy::BandPullback(p) => builder
                .with_simple(&calculate_ema(bars, p.ema_fast), |s, v| s.ema_fast = Some(v))
                .with_simple(&calculate_ema(bars, p.ema_slow), |s, v| s.ema_slow = Some(v))
                .with_simple(&calculate_rsi(bars, p.rsi_period), |s, v| s.rsi = Some(v))
                .with_series(&calculate_bollinger(bars, p.bb_period, p.bb_multiplier), set_bands),
        }
        .build()
    }
}

fn set_adx(s: &mut IndicatorSnapshot, value: IndicatorValue) {
    if let IndicatorValue::Adx {
        adx,
        plus_di,
        minus_di,
    } = value
    {
        s.adx = Some(adx);
        s.plus_di = Some(plus_di);
        s.minus_di = Some(minus_di);
    }
}

fn set_bands(s: &mut IndicatorSnapshot, value: IndicatorValue) {
    if let IndicatorValue::Bollinger {
        upper,
        middle,
        lower,
    } = value
    {
        s.bb_upper = Some(upper);
        s.bb_middle = Some(middle);
        s.bb_lower = Some(lower);
    }
}

fn set_macd(s: &mut IndicatorSnapshot, value: IndicatorValue) {
    if let IndicatorValue::Macd {
        line,
        signal,
        histogram,
    } = value
    {
        s.macd_line = Some(line);
        s.macd_signal = Some(signal);
        s.macd_histogram = Some(histogram);
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::SrBreakout(p) => {
                write!(f, "sr_breakout(window={}, touches={})", p.window, p.touch_threshold)
            }
            Strategy::TrendCrossover(p) => write!(
                f,
                "trend_crossover(SMA {}/{}, ADX({})>{}, window={})",
                p.fast_period, p.slow_period, p.adx_period, p.adx_threshold, p.window
            ),
            Strategy::MeanReversion(p) => write!(
                f,
                "mean_reversion(BB({},{}), RSI({}) {}/{}, MACD({},{},{}))",
                p.bb_period,
                p.bb_multiplier,
                p.rsi_period,
                p.rsi_oversold,
                p.rsi_overbought,
                p.macd_fast,
                p.macd_slow,
                p.macd_signal
            ),
            Strategy::FractalBreakout(p) => write!(
                f,
                "fractal_breakout(tolerance={}, SMA({}))",
                p.tolerance, p.trend_period
            ),
            Strategy::DirectionalTrend(p) => write!(
                f,
                "directional_trend(ADX({})>{}, window={})",
                p.adx_period, p.adx_threshold, p.window
            ),
            Strategy::MomentumScalp(p) => write!(
                f,
                "momentum_scalp(EMA {}/{}, RSI({}), STOCH({}))",
                p.ema_fast, p.ema_slow, p.rsi_period, p.stoch_period
            ),
            Strategy::VolatilityReversion(p) => write!(
                f,
                "volatility_reversion(BB({},{}), MACD({},{},{}))",
                p.bb_period, p.bb_multiplier, p.macd_fast, p.macd_slow, p.macd_signal
            ),
            Strategy::RangeBreakout(p) => write!(
                f,
                "range_breakout(range {} over {} bars, ATR({})x{})",
                p.range_hours, p.range_period, p.atr_period, p.entry_threshold
            ),
            Strategy::BandPullback(p) => write!(
                f,
                "band_pullback(EMA {}/{}, RSI({}), BB({},{}))",
                p.ema_fast, p.ema_slow, p.rsi_period, p.bb_period, p.bb_multiplier
            ),
        }
    }
}
