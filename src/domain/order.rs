//! Order construction.
//!
//! Turns an actionable signal into a fully priced and sized [`OrderRequest`],
//! or a [`Rejection`] saying why nothing should be submitted. Construction is
//! all-or-nothing and happens before any call to the execution gateway.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::domain::instrument::InstrumentSpec;
use crate::domain::signal::{Signal, SignalKind};
use crate::domain::sizing::{size, Sizing};
use crate::domain::trade::Direction;

/// How far the stop-loss sits from the entry price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopPolicy {
    /// `atr * factor`
    AtrMultiple(f64),
    /// Fixed price distance.
    Fixed(f64),
}

/// How far the take-profit sits from the entry price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TakeProfitPolicy {
    /// Multiple of the stop distance.
    RewardRatio(f64),
    /// `atr * factor`
    AtrMultiple(f64),
    /// Fixed price distance.
    Fixed(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskParameters {
    pub risk_percent: f64,
    /// Widest acceptable `ask - bid`, in price units.
    pub max_spread: f64,
    pub stop: StopPolicy,
    pub take_profit: TakeProfitPolicy,
    pub atr_period: usize,
    /// Size from account balance instead of equity.
    pub use_balance: bool,
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            risk_percent: 1.0,
            max_spread: 0.5,
            stop: StopPolicy::AtrMultiple(2.0),
            take_profit: TakeProfitPolicy::RewardRatio(2.0),
            atr_period: 14,
            use_balance: false,
        }
    }
}

/// Best bid and ask at the time of the signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
}

impl Quote {
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    pub fn entry_for(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Buy => self.ask,
            Direction::Sell => self.bid,
        }
    }
}

/// Market and account state an order is built against.
#[derive(Debug, Clone)]
pub struct OrderContext<'a> {
    pub symbol: &'a str,
    pub quote: Quote,
    pub atr: Option<f64>,
    /// Equity or balance, per [`RiskParameters::use_balance`].
    pub capital: f64,
    pub instrument: Option<&'a InstrumentSpec>,
    pub trading_enabled: bool,
    pub comment: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub direction: Direction,
    pub volume: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub comment: String,
    pub signal_index: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    Hold,
    GovernorBlocked,
    SpreadTooWide { spread: f64, max_spread: f64 },
    InvalidPrice { price: f64 },
    InvalidStopDistance { distance: f64 },
}

impl Rejection {
    /// Rejections that are normal control flow rather than problems.
    pub fn is_noop(&self) -> bool {
        matches!(self, Rejection::Hold | Rejection::GovernorBlocked)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Hold => write!(f, "signal is hold"),
            Rejection::GovernorBlocked => write!(f, "daily loss breaker engaged"),
            Rejection::SpreadTooWide { spread, max_spread } => {
                write!(f, "spread {spread} exceeds maximum {max_spread}")
            }
            Rejection::InvalidPrice { price } => write!(f, "invalid quote price {price}"),
            Rejection::InvalidStopDistance { distance } => {
                write!(f, "stop or target distance {distance} is not positive")
            }
        }
    }
}

pub fn build_order(
    signal: &Signal,
    ctx: &OrderContext<'_>,
    risk: &RiskParameters,
) -> Result<(OrderRequest, Sizing), Rejection> {
    let direction = match signal.kind {
        SignalKind::Buy => Direction::Buy,
        SignalKind::Sell => Direction::Sell,
        SignalKind::Hold => return Err(Rejection::Hold),
    };
    if !ctx.trading_enabled {
        return Err(Rejection::GovernorBlocked);
    }

    let Quote { bid, ask } = ctx.quote;
    for price in [bid, ask] {
        if !price.is_finite() || price <= 0.0 {
            return Err(Rejection::InvalidPrice { price });
        }
    }
    let spread = ctx.quote.spread();
    if spread < 0.0 {
        return Err(Rejection::InvalidPrice { price: bid });
    }
    if spread > risk.max_spread {
        return Err(Rejection::SpreadTooWide {
            spread,
            max_spread: risk.max_spread,
        });
    }

    let atr = ctx.atr.filter(|a| a.is_finite() && *a > 0.0);
    let stop_distance = match risk.stop {
        StopPolicy::AtrMultiple(factor) => atr.map_or(f64::NAN, |a| a * factor),
        StopPolicy::Fixed(distance) => distance,
    };
    if !stop_distance.is_finite() || stop_distance <= 0.0 {
        return Err(Rejection::InvalidStopDistance {
            distance: stop_distance,
        });
    }
    let target_distance = match risk.take_profit {
        TakeProfitPolicy::RewardRatio(ratio) => stop_distance * ratio,
        TakeProfitPolicy::AtrMultiple(factor) => atr.map_or(f64::NAN, |a| a * factor),
        TakeProfitPolicy::Fixed(distance) => distance,
    };
    if !target_distance.is_finite() || target_distance <= 0.0 {
        return Err(Rejection::InvalidStopDistance {
            distance: target_distance,
        });
    }

    let entry = ctx.quote.entry_for(direction);
    let sign = direction.sign();
    let round = |price: f64| match ctx.instrument {
        Some(spec) if spec.point > 0.0 => (price / spec.point).round() * spec.point,
        _ => price,
    };
    let stop_loss = round(entry - sign * stop_distance);
    let take_profit = round(entry + sign * target_distance);

    let ordered = match direction {
        Direction::Buy => stop_loss < entry && entry < take_profit,
        Direction::Sell => take_profit < entry && entry < stop_loss,
    };
    if !ordered {
        return Err(Rejection::InvalidStopDistance {
            distance: (entry - stop_loss).abs(),
        });
    }

    let stop_points = match ctx.instrument {
        Some(spec) => spec.to_points(stop_distance),
        None => stop_distance,
    };
    let sizing = size(ctx.capital, risk.risk_percent, stop_points, ctx.instrument);

    let order = OrderRequest {
        symbol: ctx.symbol.to_string(),
        direction,
        volume: sizing.volume,
        entry_price: entry,
        stop_loss,
        take_profit,
        comment: ctx.comment.to_string(),
        signal_index: signal.index,
        timestamp: signal.timestamp,
    };
    Ok((order, sizing))
}
