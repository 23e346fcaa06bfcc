//! Configuration validation.
//!
//! Runs once at startup. Every failure is a configuration error and fatal.

use crate::domain::config::{
    engine_from_config, get_hour, get_usize, instrument_from_config, risk_from_config,
    session_from_config, session_sections, strategy_from_config, symbols_from_config,
};
use crate::domain::error::TraderError;
use crate::domain::instrument::InstrumentSpec;
use crate::domain::order::{StopPolicy, TakeProfitPolicy};
use crate::domain::strategy::Strategy;
use crate::ports::config_port::ConfigPort;

pub fn validate_app_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_engine_config(config)?;
    validate_strategy_config(config)?;
    validate_session_config(config)?;
    validate_risk_config(config)?;
    validate_governor_config(config)?;
    for symbol in symbols_from_config(config)? {
        validate_instrument(&instrument_from_config(config, &symbol)?)?;
    }
    Ok(())
}

pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    symbols_from_config(config)?;

    let capacity = config.get_int("engine", "window_capacity", 500)?;
    if capacity < 2 {
        return Err(TraderError::invalid(
            "engine",
            "window_capacity",
            "window_capacity must be at least 2",
        ));
    }
    let history = config.get_int("engine", "history_bars", capacity)?;
    if history < 1 {
        return Err(TraderError::invalid(
            "engine",
            "history_bars",
            "history_bars must be at least 1",
        ));
    }
    if config.get_int("engine", "poll_interval_secs", 5)? < 0 {
        return Err(TraderError::invalid(
            "engine",
            "poll_interval_secs",
            "poll_interval_secs must be non-negative",
        ));
    }
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let strategy = strategy_from_config(config)?;
    validate_strategy(&strategy)?;

    let capacity = get_usize(config, "engine", "window_capacity", 500)?;
    let warmup = strategy.warmup_bars();
    if capacity < warmup {
        return Err(TraderError::invalid(
            "engine",
            "window_capacity",
            format!("{} needs at least {} bars, window holds {}", strategy.kind(), warmup, capacity),
        ));
    }
    let engine = engine_from_config(config)?;
    if engine.history_bars < 2 {
        return Err(TraderError::invalid(
            "engine",
            "history_bars",
            "history_bars must be at least 2 to compare consecutive bars",
        ));
    }
    Ok(())
}

/// Every `[session.<name>]`: hours, strategy parameters, and a window large
/// enough for the session's strategy.
pub fn validate_session_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let capacity = get_usize(config, "engine", "window_capacity", 500)?;
    for section in session_sections(config) {
        let session = session_from_config(config, &section)?;
        validate_strategy_in(&section, &session.strategy)?;
        let warmup = session.strategy.warmup_bars();
        if capacity < warmup {
            return Err(TraderError::invalid(
                "engine",
                "window_capacity",
                format!(
                    "session {} runs {} which needs at least {} bars, window holds {}",
                    session.name,
                    session.strategy.kind(),
                    warmup,
                    capacity
                ),
            ));
        }
    }
    Ok(())
}

pub fn validate_strategy(strategy: &Strategy) -> Result<(), TraderError> {
    validate_strategy_in("strategy", strategy)
}

/// Parameter checks for a strategy read from `section`.
pub fn validate_strategy_in(section: &str, strategy: &Strategy) -> Result<(), TraderError> {
    match strategy {
        Strategy::SrBreakout(p) => {
            positive(section, "window", p.window)?;
            positive(section, "touch_threshold", p.touch_threshold)?;
        }
        Strategy::TrendCrossover(p) => {
            positive(section, "fast_period", p.fast_period)?;
            positive(section, "adx_period", p.adx_period)?;
            positive(section, "window", p.window)?;
            positive(section, "touch_threshold", p.touch_threshold)?;
            ordered(section, "fast_period", p.fast_period, "slow_period", p.slow_period)?;
            percent(section, "adx_threshold", p.adx_threshold)?;
        }
        Strategy::MeanReversion(p) => {
            positive(section, "bb_period", p.bb_period)?;
            positive(section, "rsi_period", p.rsi_period)?;
            positive(section, "macd_fast", p.macd_fast)?;
            positive(section, "macd_signal", p.macd_signal)?;
            ordered(section, "macd_fast", p.macd_fast, "macd_slow", p.macd_slow)?;
            multiplier(section, p.bb_multiplier)?;
            percent(section, "rsi_oversold", p.rsi_oversold)?;
            percent(section, "rsi_overbought", p.rsi_overbought)?;
            if p.rsi_oversold >= p.rsi_overbought {
                return Err(TraderError::invalid(
                    section,
                    "rsi_oversold",
                    "rsi_oversold must be below rsi_overbought",
                ));
            }
        }
        Strategy::FractalBreakout(p) => {
            positive(section, "trend_period", p.trend_period)?;
            positive(section, "touch_threshold", p.touch_threshold)?;
            if !p.tolerance.is_finite() || p.tolerance < 0.0 {
                return Err(TraderError::invalid(
                    section,
                    "tolerance",
                    "tolerance must be non-negative",
                ));
            }
        }
        Strategy::DirectionalTrend(p) => {
            positive(section, "adx_period", p.adx_period)?;
            positive(section, "window", p.window)?;
            positive(section, "touch_threshold", p.touch_threshold)?;
            percent(section, "adx_threshold", p.adx_threshold)?;
        }
        Strategy::MomentumScalp(p) => {
            positive(section, "ema_fast", p.ema_fast)?;
            positive(section, "rsi_period", p.rsi_period)?;
            positive(section, "stoch_period", p.stoch_period)?;
            ordered(section, "ema_fast", p.ema_fast, "ema_slow", p.ema_slow)?;
            for (key, value) in [
                ("rsi_oversold", p.rsi_oversold),
                ("rsi_recovery", p.rsi_recovery),
                ("rsi_overbought", p.rsi_overbought),
                ("rsi_relapse", p.rsi_relapse),
                ("stoch_low", p.stoch_low),
                ("stoch_high", p.stoch_high),
            ] {
                percent(section, key, value)?;
            }
        }
        Strategy::VolatilityReversion(p) => {
            positive(section, "bb_period", p.bb_period)?;
            positive(section, "macd_fast", p.macd_fast)?;
            positive(section, "macd_signal", p.macd_signal)?;
            ordered(section, "macd_fast", p.macd_fast, "macd_slow", p.macd_slow)?;
            multiplier(section, p.bb_multiplier)?;
        }
        Strategy::RangeBreakout(p) => {
            positive(section, "range_period", p.range_period)?;
            positive(section, "atr_period", p.atr_period)?;
            if p.range_hours.start_hour == p.range_hours.end_hour {
                return Err(TraderError::invalid(
                    section,
                    "range_end_hour",
                    "range_end_hour must differ from range_start_hour",
                ));
            }
            if !p.entry_threshold.is_finite() || p.entry_threshold < 0.0 {
                return Err(TraderError::invalid(
                    section,
                    "entry_threshold",
                    "entry_threshold must be non-negative",
                ));
            }
        }
        Strategy::BandPullback(p) => {
            positive(section, "ema_fast", p.ema_fast)?;
            positive(section, "rsi_period", p.rsi_period)?;
            positive(section, "bb_period", p.bb_period)?;
            ordered(section, "ema_fast", p.ema_fast, "ema_slow", p.ema_slow)?;
            multiplier(section, p.bb_multiplier)?;
            for (key, value) in [
                ("rsi_buy_min", p.rsi_buy_min),
                ("rsi_buy_max", p.rsi_buy_max),
                ("rsi_sell_min", p.rsi_sell_min),
                ("rsi_sell_max", p.rsi_sell_max),
            ] {
                percent(section, key, value)?;
            }
            for (low_key, low, high_key, high) in [
                ("rsi_buy_min", p.rsi_buy_min, "rsi_buy_max", p.rsi_buy_max),
                ("rsi_sell_min", p.rsi_sell_min, "rsi_sell_max", p.rsi_sell_max),
            ] {
                if low >= high {
                    return Err(TraderError::invalid(
                        section,
                        low_key,
                        format!("{low_key} must be below {high_key}"),
                    ));
                }
            }
        }
    }
    Ok(())
}

pub fn validate_risk_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let risk = risk_from_config(config)?;
    if !(risk.risk_percent > 0.0 && risk.risk_percent <= 100.0) {
        return Err(TraderError::invalid(
            "risk",
            "risk_percent",
            "risk_percent must be in (0, 100]",
        ));
    }
    if !risk.max_spread.is_finite() || risk.max_spread < 0.0 {
        return Err(TraderError::invalid(
            "risk",
            "max_spread",
            "max_spread must be non-negative",
        ));
    }
    let (stop_key, stop_value) = match risk.stop {
        StopPolicy::AtrMultiple(f) => ("sl_atr_factor", f),
        StopPolicy::Fixed(d) => ("sl_fixed_distance", d),
    };
    let (tp_key, tp_value) = match risk.take_profit {
        TakeProfitPolicy::RewardRatio(r) => ("tp_reward_ratio", r),
        TakeProfitPolicy::AtrMultiple(f) => ("tp_atr_factor", f),
        TakeProfitPolicy::Fixed(d) => ("tp_fixed_distance", d),
    };
    for (key, value) in [(stop_key, stop_value), (tp_key, tp_value)] {
        if !value.is_finite() || value <= 0.0 {
            return Err(TraderError::invalid(
                "risk",
                key,
                format!("{key} must be positive"),
            ));
        }
    }
    if risk.atr_period == 0 {
        return Err(TraderError::invalid(
            "risk",
            "atr_period",
            "atr_period must be at least 1",
        ));
    }
    Ok(())
}

pub fn validate_governor_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if config.get_string("governor", "max_daily_loss").is_none() {
        return Err(TraderError::missing("governor", "max_daily_loss"));
    }
    let limit = config.get_double("governor", "max_daily_loss", 0.0)?;
    if !limit.is_finite() || limit <= 0.0 {
        return Err(TraderError::invalid(
            "governor",
            "max_daily_loss",
            "max_daily_loss must be positive",
        ));
    }
    get_hour(config, "governor", "reset_hour_utc", 0)?;
    Ok(())
}

pub fn validate_instrument(spec: &InstrumentSpec) -> Result<(), TraderError> {
    let section = crate::domain::config::instrument_section(&spec.symbol);
    for (key, value) in [
        ("min_lot", spec.min_lot),
        ("lot_step", spec.lot_step),
        ("value_per_unit", spec.value_per_unit),
        ("point", spec.point),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(TraderError::invalid(
                &section,
                key,
                format!("{key} must be positive"),
            ));
        }
    }
    if !spec.max_lot.is_finite() || spec.max_lot < spec.min_lot {
        return Err(TraderError::invalid(
            &section,
            "max_lot",
            "max_lot must be at least min_lot",
        ));
    }
    for (key, value) in [("min_lot", spec.min_lot), ("max_lot", spec.max_lot)] {
        if !spec.is_step_multiple(value) {
            return Err(TraderError::invalid(
                &section,
                key,
                format!("{key} {value} is not a whole number of lot_step {}", spec.lot_step),
            ));
        }
    }
    Ok(())
}

fn positive(section: &str, key: &str, value: usize) -> Result<(), TraderError> {
    if value == 0 {
        return Err(TraderError::invalid(
            section,
            key,
            format!("{key} must be at least 1"),
        ));
    }
    Ok(())
}

fn ordered(
    section: &str,
    fast_key: &str,
    fast: usize,
    slow_key: &str,
    slow: usize,
) -> Result<(), TraderError> {
    if fast >= slow {
        return Err(TraderError::invalid(
            section,
            fast_key,
            format!("{fast_key} must be below {slow_key}"),
        ));
    }
    Ok(())
}

fn percent(section: &str, key: &str, value: f64) -> Result<(), TraderError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(TraderError::invalid(
            section,
            key,
            format!("{key} must be between 0 and 100"),
        ));
    }
    Ok(())
}

fn multiplier(section: &str, value: f64) -> Result<(), TraderError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(TraderError::invalid(
            section,
            "bb_multiplier",
            "bb_multiplier must be positive",
        ));
    }
    Ok(())
}
