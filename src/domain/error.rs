//! Domain error types.

use chrono::{DateTime, Utc};

/// Top-level error type for scalptrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no instrument metadata for {symbol}")]
    InstrumentNotFound { symbol: String },

    #[error("out-of-order bar at {timestamp}: last stored bar is at {last}")]
    OutOfOrderBar {
        timestamp: DateTime<Utc>,
        last: DateTime<Utc>,
    },

    #[error("non-finite bar values at {timestamp}")]
    InvalidBar { timestamp: DateTime<Utc> },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("market data error for {symbol}: {reason}")]
    Feed { symbol: String, reason: String },

    #[error("order rejected for {symbol}: {reason}")]
    OrderRejected { symbol: String, reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    /// Data errors are recovered locally by the engine (bar dropped, `Hold` emitted).
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            TraderError::OutOfOrderBar { .. }
                | TraderError::InvalidBar { .. }
                | TraderError::InsufficientData { .. }
                | TraderError::Feed { .. }
        )
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            TraderError::ConfigParse { .. }
                | TraderError::ConfigMissing { .. }
                | TraderError::ConfigInvalid { .. }
                | TraderError::InstrumentNotFound { .. }
        )
    }

    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(section: &str, key: &str) -> Self {
        TraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) | TraderError::Csv(_) => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. }
            | TraderError::InstrumentNotFound { .. } => 2,
            TraderError::OrderRejected { .. } => 4,
            TraderError::OutOfOrderBar { .. }
            | TraderError::InvalidBar { .. }
            | TraderError::InsufficientData { .. }
            | TraderError::Feed { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
