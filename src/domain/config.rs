//! Typed engine configuration assembled from a [`ConfigPort`].
//!
//! Sections: `[engine]`, `[strategy]`, `[risk]`, `[governor]`, one
//! `[instrument.<symbol>]` per traded symbol and any number of
//! `[session.<name>]` trading sessions. Section names and keys are lowercase.
//! A key that is present but does not parse is an error, never a default.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::error::TraderError;
use crate::domain::governor::GovernorConfig;
use crate::domain::instrument::InstrumentSpec;
use crate::domain::order::{RiskParameters, StopPolicy, TakeProfitPolicy};
use crate::domain::session::{strategy_at, HourWindow, TradingSession};
use crate::domain::strategy::{
    BandPullbackParams, DirectionalTrendParams, FractalBreakoutParams, MeanReversionParams,
    MomentumScalpParams, RangeBreakoutParams, SrBreakoutParams, Strategy, StrategyKind,
    TrendCrossoverParams, VolatilityReversionParams,
};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_TIMEFRAME: &str = "M1";
pub const DEFAULT_WINDOW_CAPACITY: usize = 500;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_COMMENT: &str = "scalptrader";
pub const SESSION_PREFIX: &str = "session.";

/// Settings shared by every per-instrument engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub timeframe: String,
    pub window_capacity: usize,
    pub history_bars: usize,
    pub poll_interval: Duration,
    /// Trades around the clock when `sessions` is empty.
    pub strategy: Strategy,
    /// Ordered by start hour then name; the first covering session wins.
    pub sessions: Vec<TradingSession>,
    pub risk: RiskParameters,
    pub comment: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeframe: DEFAULT_TIMEFRAME.to_string(),
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            history_bars: DEFAULT_WINDOW_CAPACITY,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            strategy: StrategyKind::SrBreakout.default_strategy(),
            sessions: Vec::new(),
            risk: RiskParameters::default(),
            comment: DEFAULT_COMMENT.to_string(),
        }
    }
}

impl EngineConfig {
    /// Strategy trading `symbol` for a bar at `at`; `None` outside every session.
    pub fn strategy_for(&self, symbol: &str, at: DateTime<Utc>) -> Option<&Strategy> {
        strategy_at(&self.strategy, &self.sessions, symbol, at)
    }

    /// Largest warmup over every strategy this configuration can select.
    pub fn warmup_bars(&self) -> usize {
        self.sessions
            .iter()
            .map(|s| s.strategy.warmup_bars())
            .fold(self.strategy.warmup_bars(), usize::max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub symbols: Vec<String>,
    pub engine: EngineConfig,
    pub governor: GovernorConfig,
}

/// Validate every section, then assemble the typed configuration.
pub fn load_app_config(config: &dyn ConfigPort) -> Result<AppConfig, TraderError> {
    crate::domain::config_validation::validate_app_config(config)?;
    Ok(AppConfig {
        symbols: symbols_from_config(config)?,
        engine: engine_from_config(config)?,
        governor: governor_from_config(config)?,
    })
}

pub fn symbols_from_config(config: &dyn ConfigPort) -> Result<Vec<String>, TraderError> {
    let raw = config
        .get_string("engine", "symbols")
        .ok_or_else(|| TraderError::missing("engine", "symbols"))?;
    let symbols = symbol_list(&raw);
    if symbols.is_empty() {
        return Err(TraderError::invalid("engine", "symbols", "no symbols listed"));
    }
    Ok(symbols)
}

/// Comma separated symbols, trimmed, uppercased and deduplicated in order.
fn symbol_list(raw: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for symbol in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let symbol = symbol.to_uppercase();
        if !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    symbols
}

pub fn engine_from_config(config: &dyn ConfigPort) -> Result<EngineConfig, TraderError> {
    let window_capacity = get_usize(config, "engine", "window_capacity", DEFAULT_WINDOW_CAPACITY)?;
    let history_bars = get_usize(config, "engine", "history_bars", window_capacity)?;
    let poll_secs = get_usize(
        config,
        "engine",
        "poll_interval_secs",
        DEFAULT_POLL_INTERVAL_SECS as usize,
    )?;
    Ok(EngineConfig {
        timeframe: config
            .get_string("engine", "timeframe")
            .map(|t| t.trim().to_uppercase())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TIMEFRAME.to_string()),
        window_capacity,
        history_bars,
        poll_interval: Duration::from_secs(poll_secs as u64),
        strategy: strategy_from_config(config)?,
        sessions: sessions_from_config(config)?,
        risk: risk_from_config(config)?,
        comment: config
            .get_string("strategy", "comment")
            .unwrap_or_else(|| DEFAULT_COMMENT.to_string()),
    })
}

pub fn strategy_kind_from_config(config: &dyn ConfigPort) -> Result<StrategyKind, TraderError> {
    strategy_kind_in_section(config, "strategy")
}

pub(crate) fn strategy_kind_in_section(
    config: &dyn ConfigPort,
    section: &str,
) -> Result<StrategyKind, TraderError> {
    let kind = config
        .get_string(section, "kind")
        .ok_or_else(|| TraderError::missing(section, "kind"))?;
    kind.parse::<StrategyKind>()
        .map_err(|reason: String| TraderError::invalid(section, "kind", reason))
}

/// Parameters for the configured strategy kind; absent keys keep their defaults.
pub fn strategy_from_config(config: &dyn ConfigPort) -> Result<Strategy, TraderError> {
    strategy_in_section(config, "strategy")
}

/// Strategy described by the `kind` and parameter keys of `section`.
pub fn strategy_in_section(config: &dyn ConfigPort, section: &str) -> Result<Strategy, TraderError> {
    let c = config;
    let s = section;
    let strategy = match strategy_kind_in_section(config, section)? {
        StrategyKind::SrBreakout => {
            let d = SrBreakoutParams::default();
            Strategy::SrBreakout(SrBreakoutParams {
                window: get_usize(c, s, "window", d.window)?,
                touch_threshold: get_usize(c, s, "touch_threshold", d.touch_threshold)?,
            })
        }
        StrategyKind::TrendCrossover => {
            let d = TrendCrossoverParams::default();
            Strategy::TrendCrossover(TrendCrossoverParams {
                fast_period: get_usize(c, s, "fast_period", d.fast_period)?,
                slow_period: get_usize(c, s, "slow_period", d.slow_period)?,
                adx_period: get_usize(c, s, "adx_period", d.adx_period)?,
                adx_threshold: c.get_double(s, "adx_threshold", d.adx_threshold)?,
                window: get_usize(c, s, "window", d.window)?,
                touch_threshold: get_usize(c, s, "touch_threshold", d.touch_threshold)?,
            })
        }
        StrategyKind::MeanReversion => {
            let d = MeanReversionParams::default();
            Strategy::MeanReversion(MeanReversionParams {
                bb_period: get_usize(c, s, "bb_period", d.bb_period)?,
                bb_multiplier: c.get_double(s, "bb_multiplier", d.bb_multiplier)?,
                rsi_period: get_usize(c, s, "rsi_period", d.rsi_period)?,
                rsi_oversold: c.get_double(s, "rsi_oversold", d.rsi_oversold)?,
                rsi_overbought: c.get_double(s, "rsi_overbought", d.rsi_overbought)?,
                macd_fast: get_usize(c, s, "macd_fast", d.macd_fast)?,
                macd_slow: get_usize(c, s, "macd_slow", d.macd_slow)?,
                macd_signal: get_usize(c, s, "macd_signal", d.macd_signal)?,
            })
        }
        StrategyKind::FractalBreakout => {
            let d = FractalBreakoutParams::default();
            Strategy::FractalBreakout(FractalBreakoutParams {
                tolerance: c.get_double(s, "tolerance", d.tolerance)?,
                touch_threshold: get_usize(c, s, "touch_threshold", d.touch_threshold)?,
                trend_period: get_usize(c, s, "trend_period", d.trend_period)?,
            })
        }
        StrategyKind::DirectionalTrend => {
            let d = DirectionalTrendParams::default();
            Strategy::DirectionalTrend(DirectionalTrendParams {
                adx_period: get_usize(c, s, "adx_period", d.adx_period)?,
                adx_threshold: c.get_double(s, "adx_threshold", d.adx_threshold)?,
                window: get_usize(c, s, "window", d.window)?,
                touch_threshold: get_usize(c, s, "touch_threshold", d.touch_threshold)?,
            })
        }
        StrategyKind::MomentumScalp => {
            let d = MomentumScalpParams::default();
            Strategy::MomentumScalp(MomentumScalpParams {
                ema_fast: get_usize(c, s, "ema_fast", d.ema_fast)?,
                ema_slow: get_usize(c, s, "ema_slow", d.ema_slow)?,
                rsi_period: get_usize(c, s, "rsi_period", d.rsi_period)?,
                stoch_period: get_usize(c, s, "stoch_period", d.stoch_period)?,
                rsi_oversold: c.get_double(s, "rsi_oversold", d.rsi_oversold)?,
                rsi_recovery: c.get_double(s, "rsi_recovery", d.rsi_recovery)?,
                rsi_overbought: c.get_double(s, "rsi_overbought", d.rsi_overbought)?,
                rsi_relapse: c.get_double(s, "rsi_relapse", d.rsi_relapse)?,
                stoch_low: c.get_double(s, "stoch_low", d.stoch_low)?,
                stoch_high: c.get_double(s, "stoch_high", d.stoch_high)?,
            })
        }
        StrategyKind::VolatilityReversion => {
            let d = VolatilityReversionParams::default();
            Strategy::VolatilityReversion(VolatilityReversionParams {
                bb_period: get_usize(c, s, "bb_period", d.bb_period)?,
                bb_multiplier: c.get_double(s, "bb_multiplier", d.bb_multiplier)?,
                macd_fast: get_usize(c, s, "macd_fast", d.macd_fast)?,
                macd_slow: get_usize(c, s, "macd_slow", d.macd_slow)?,
                macd_signal: get_usize(c, s, "macd_signal", d.macd_signal)?,
            })
        }
        StrategyKind::RangeBreakout => {
            let d = RangeBreakoutParams::default();
            Strategy::RangeBreakout(RangeBreakoutParams {
                range_hours: HourWindow::new(
                    get_hour(c, s, "range_start_hour", d.range_hours.start_hour)?,
                    get_hour(c, s, "range_end_hour", d.range_hours.end_hour)?,
                ),
                range_period: get_usize(c, s, "range_period", d.range_period)?,
                atr_period: get_usize(c, s, "atr_period", d.atr_period)?,
                entry_threshold: c.get_double(s, "entry_threshold", d.entry_threshold)?,
            })
        }
        StrategyKind::BandPullback => {
            let d = BandPullbackParams::default();
            Strategy::BandPullback(BandPullbackParams {
                ema_fast: get_usize(c, s, "ema_fast", d.ema_fast)?,
                ema_slow: get_usize(c, s, "ema_slow", d.ema_slow)?,
                rsi_period: get_usize(c, s, "rsi_period", d.rsi_period)?,
                bb_period: get_usize(c, s, "bb_period", d.bb_period)?,
                bb_multiplier: c.get_double(s, "bb_multiplier", d.bb_multiplier)?,
                rsi_buy_min: c.get_double(s, "rsi_buy_min", d.rsi_buy_min)?,
                rsi_buy_max: c.get_double(s, "rsi_buy_max", d.rsi_buy_max)?,
                rsi_sell_min: c.get_double(s, "rsi_sell_min", d.rsi_sell_min)?,
                rsi_sell_max: c.get_double(s, "rsi_sell_max", d.rsi_sell_max)?,
            })
        }
    };
    Ok(strategy)
}

/// Every `[session.<name>]` section, ordered by start hour then name.
pub fn sessions_from_config(config: &dyn ConfigPort) -> Result<Vec<TradingSession>, TraderError> {
    let mut sessions = Vec::new();
    for section in session_sections(config) {
        sessions.push(session_from_config(config, &section)?);
    }
    sessions.sort_by(|a, b| {
        (a.hours.start_hour, &a.name).cmp(&(b.hours.start_hour, &b.name))
    });
    Ok(sessions)
}

pub(crate) fn session_sections(config: &dyn ConfigPort) -> Vec<String> {
    config
        .sections()
        .into_iter()
        .filter(|s| s.starts_with(SESSION_PREFIX))
        .collect()
}

pub fn session_from_config(
    config: &dyn ConfigPort,
    section: &str,
) -> Result<TradingSession, TraderError> {
    let name = section.trim_start_matches(SESSION_PREFIX).to_string();
    let start_hour = required_hour(config, section, "start_hour")?;
    let end_hour = required_hour(config, section, "end_hour")?;
    if start_hour == end_hour {
        return Err(TraderError::invalid(
            section,
            "end_hour",
            "must differ from start_hour",
        ));
    }
    Ok(TradingSession {
        name,
        hours: HourWindow::new(start_hour, end_hour),
        symbols: config
            .get_string(section, "symbols")
            .map(|raw| symbol_list(&raw))
            .unwrap_or_default(),
        strategy: strategy_in_section(config, section)?,
    })
}

pub fn risk_from_config(config: &dyn ConfigPort) -> Result<RiskParameters, TraderError> {
    let d = RiskParameters::default();
    let stop = match policy(config, "sl_policy", "atr").as_str() {
        "atr" => StopPolicy::AtrMultiple(config.get_double("risk", "sl_atr_factor", 2.0)?),
        "fixed" => StopPolicy::Fixed(required_double(config, "risk", "sl_fixed_distance")?),
        other => {
            return Err(TraderError::invalid(
                "risk",
                "sl_policy",
                format!("unknown stop policy '{other}', expected atr or fixed"),
            ))
        }
    };
    let take_profit = match policy(config, "tp_policy", "reward_ratio").as_str() {
        "reward_ratio" => {
            TakeProfitPolicy::RewardRatio(config.get_double("risk", "tp_reward_ratio", 2.0)?)
        }
        "atr" => TakeProfitPolicy::AtrMultiple(config.get_double("risk", "tp_atr_factor", 4.0)?),
        "fixed" => {
            TakeProfitPolicy::Fixed(required_double(config, "risk", "tp_fixed_distance")?)
        }
        other => {
            return Err(TraderError::invalid(
                "risk",
                "tp_policy",
                format!("unknown take-profit policy '{other}', expected reward_ratio, atr or fixed"),
            ))
        }
    };
    Ok(RiskParameters {
        risk_percent: config.get_double("risk", "risk_percent", d.risk_percent)?,
        max_spread: config.get_double("risk", "max_spread", d.max_spread)?,
        stop,
        take_profit,
        atr_period: get_usize(config, "risk", "atr_period", d.atr_period)?,
        use_balance: config.get_bool("risk", "use_balance", d.use_balance)?,
    })
}

pub fn governor_from_config(config: &dyn ConfigPort) -> Result<GovernorConfig, TraderError> {
    let d = GovernorConfig::default();
    Ok(GovernorConfig {
        max_daily_loss: config.get_double("governor", "max_daily_loss", d.max_daily_loss)?,
        reset_hour_utc: get_hour(config, "governor", "reset_hour_utc", d.reset_hour_utc)?,
    })
}

pub fn instrument_section(symbol: &str) -> String {
    format!("instrument.{}", symbol.trim().to_lowercase())
}

/// Instrument metadata from `[instrument.<symbol>]`.
pub fn instrument_from_config(
    config: &dyn ConfigPort,
    symbol: &str,
) -> Result<InstrumentSpec, TraderError> {
    let section = instrument_section(symbol);
    if !config.has_section(&section) {
        return Err(TraderError::InstrumentNotFound {
            symbol: symbol.to_string(),
        });
    }
    Ok(InstrumentSpec {
        symbol: symbol.to_uppercase(),
        min_lot: required_double(config, &section, "min_lot")?,
        max_lot: required_double(config, &section, "max_lot")?,
        lot_step: required_double(config, &section, "lot_step")?,
        value_per_unit: required_double(config, &section, "value_per_unit")?,
        point: required_double(config, &section, "point")?,
    })
}

fn policy(config: &dyn ConfigPort, key: &str, default: &str) -> String {
    config
        .get_string("risk", key)
        .map(|p| p.trim().to_lowercase())
        .unwrap_or_else(|| default.to_string())
}

pub(crate) fn get_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, TraderError> {
    let value = config.get_int(section, key, default as i64)?;
    usize::try_from(value)
        .map_err(|_| TraderError::invalid(section, key, format!("{value} must be non-negative")))
}

/// An hour of the day, 0 to 23.
pub(crate) fn get_hour(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: u32,
) -> Result<u32, TraderError> {
    let value = config.get_int(section, key, i64::from(default))?;
    u32::try_from(value)
        .ok()
        .filter(|h| *h < 24)
        .ok_or_else(|| TraderError::invalid(section, key, format!("{value} is not an hour in 0-23")))
}

fn required_hour(config: &dyn ConfigPort, section: &str, key: &str) -> Result<u32, TraderError> {
    if config.get_string(section, key).is_none() {
        return Err(TraderError::missing(section, key));
    }
    get_hour(config, section, key, 0)
}

pub(crate) fn required_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<f64, TraderError> {
    let raw = config
        .get_string(section, key)
        .ok_or_else(|| TraderError::missing(section, key))?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| TraderError::invalid(section, key, format!("'{}' is not a number", raw.trim())))
}
