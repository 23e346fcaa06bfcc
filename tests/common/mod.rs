#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use scalptrader::domain::bar::Bar;
use scalptrader::domain::engine::Collaborators;
use scalptrader::domain::error::TraderError;
use scalptrader::domain::instrument::InstrumentSpec;
use scalptrader::domain::order::{OrderRequest, Quote};
use scalptrader::domain::trade::{ClosedTradeReport, TradeRecord};
use scalptrader::ports::account_port::AccountInfo;
use scalptrader::ports::execution_port::{ExecutionGateway, ExecutionReport};
use scalptrader::ports::instrument_port::InstrumentInfo;
use scalptrader::ports::market_data_port::MarketDataFeed;
use scalptrader::ports::reconciliation_port::TradeReconciliationFeed;
use std::collections::HashMap;
use std::path::Path;

pub const VALID_INI: &str = r#"
[engine]
symbols = XAUUSD, EURUSD
timeframe = M1
window_capacity = 200
poll_interval_secs = 1

[strategy]
kind = sr_breakout
window = 5
touch_threshold = 2
comment = integration

[risk]
risk_percent = 1
max_spread = 0.5
sl_policy = atr
sl_atr_factor = 2
tp_policy = reward_ratio
tp_reward_ratio = 2
atr_period = 3

[governor]
max_daily_loss = 500
reset_hour_utc = 0

[instrument.xauusd]
min_lot = 0.01
max_lot = 100
lot_step = 0.01
value_per_unit = 1
point = 0.01

[instrument.eurusd]
min_lot = 0.01
max_lot = 50
lot_step = 0.01
value_per_unit = 1
point = 0.00001
"#;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
}

pub fn make_bar(minute: i64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        timestamp: base_time() + Duration::minutes(minute),
        open: close,
        high,
        low,
        close,
        volume: 100.0,
    }
}

/// Flat range with resistance at 101 touched three times, then a close
/// through it at minute 6.
pub fn breakout_series() -> Vec<Bar> {
    let mut bars: Vec<Bar> = (0..6)
        .map(|i| {
            let high = if i % 2 == 0 { 101.0 } else { 100.5 };
            make_bar(i, high, 99.0, 100.0)
        })
        .collect();
    bars.push(make_bar(6, 102.0, 100.0, 101.5));
    bars
}

/// Deterministic oscillating series that crosses its own levels repeatedly.
pub fn oscillating_series(n: usize) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            let close = 100.0 + 3.0 * (x * 0.35).sin() + 0.02 * x;
            make_bar(i as i64, close + 0.6, close - 0.6, close)
        })
        .collect()
}

pub fn xauusd_spec() -> InstrumentSpec {
    InstrumentSpec {
        symbol: "XAUUSD".to_string(),
        min_lot: 0.01,
        max_lot: 100.0,
        lot_step: 0.01,
        value_per_unit: 1.0,
        point: 0.01,
    }
}

pub fn write_bars_csv(dir: &Path, symbol: &str, bars: &[Bar]) {
    let mut content = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.timestamp.to_rfc3339(),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    std::fs::write(dir.join(format!("{symbol}.csv")), content).unwrap();
}

/// In-memory broker double: serves a fixed bar history and records every
/// submitted order.
pub struct MockBroker {
    pub bars: Mutex<Vec<Bar>>,
    pub spread: f64,
    pub equity: f64,
    pub instruments: HashMap<String, InstrumentSpec>,
    pub submitted: Mutex<Vec<OrderRequest>>,
    pub closed: Mutex<Vec<ClosedTradeReport>>,
}

impl MockBroker {
    pub fn new(bars: Vec<Bar>) -> Self {
        let mut instruments = HashMap::new();
        instruments.insert("XAUUSD".to_string(), xauusd_spec());
        Self {
            bars: Mutex::new(bars),
            spread: 0.02,
            equity: 10_000.0,
            instruments,
            submitted: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
        }
    }

    pub fn without_instruments(mut self) -> Self {
        self.instruments.clear();
        self
    }

    pub fn with_spread(mut self, spread: f64) -> Self {
        self.spread = spread;
        self
    }

    pub fn collab(&self) -> Collaborators<'_> {
        Collaborators {
            feed: self,
            account: self,
            instruments: self,
            gateway: self,
            reconciliation: self,
            trade_log: None,
        }
    }

    pub fn last_time(&self) -> DateTime<Utc> {
        self.bars.lock().last().map(|b| b.timestamp).unwrap_or_else(base_time)
    }
}

impl MarketDataFeed for MockBroker {
    fn fetch_latest_bars(
        &self,
        _symbol: &str,
        _timeframe: &str,
        count: usize,
    ) -> Result<Vec<Bar>, TraderError> {
        let bars = self.bars.lock();
        Ok(bars[bars.len().saturating_sub(count)..].to_vec())
    }

    fn quote(&self, symbol: &str) -> Result<Quote, TraderError> {
        let bars = self.bars.lock();
        let last = bars.last().ok_or_else(|| TraderError::Feed {
            symbol: symbol.to_string(),
            reason: "no bars".to_string(),
        })?;
        Ok(Quote {
            bid: last.close,
            ask: last.close + self.spread,
        })
    }
}

impl AccountInfo for MockBroker {
    fn current_equity(&self) -> f64 {
        self.equity
    }

    fn current_balance(&self) -> f64 {
        self.equity
    }
}

impl InstrumentInfo for MockBroker {
    fn lookup(&self, symbol: &str) -> Result<InstrumentSpec, TraderError> {
        self.instruments
            .get(symbol)
            .cloned()
            .ok_or_else(|| TraderError::InstrumentNotFound {
                symbol: symbol.to_string(),
            })
    }
}

impl ExecutionGateway for MockBroker {
    fn submit(&self, order: &OrderRequest) -> ExecutionReport {
        let mut submitted = self.submitted.lock();
        submitted.push(order.clone());
        ExecutionReport::Accepted(TradeRecord {
            ticket: submitted.len() as u64,
            symbol: order.symbol.clone(),
            direction: order.direction,
            volume: order.volume,
            entry_price: order.entry_price,
            stop_loss: order.stop_loss,
            take_profit: order.take_profit,
            open_time: order.timestamp,
            close_time: None,
            realized_pnl: None,
        })
    }
}

impl TradeReconciliationFeed for MockBroker {
    fn closed_trades(&self, since: DateTime<Utc>) -> Result<Vec<ClosedTradeReport>, TraderError> {
        Ok(self
            .closed
            .lock()
            .iter()
            .filter(|r| r.close_time >= since)
            .cloned()
            .collect())
    }
}
