//! Simulated broker for replay runs.
//!
//! Fills every valid order at its requested entry price, closes positions
//! when a later bar touches the stop-loss or take-profit, and reports those
//! closures through the reconciliation port. Shared by all engines in a run.
//!
//! Reconciliation asks for reports closed at or after the oldest trade it
//! still holds open, so reports closed before the oldest trade open here are
//! dropped once the bar after their close has been processed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::domain::bar::Bar;
use crate::domain::error::TraderError;
use crate::domain::instrument::InstrumentSpec;
use crate::domain::order::OrderRequest;
use crate::domain::trade::{ClosedTradeReport, Direction, TradeRecord};
use crate::ports::account_port::AccountInfo;
use crate::ports::execution_port::{ExecutionGateway, ExecutionReport};
use crate::ports::reconciliation_port::TradeReconciliationFeed;

#[derive(Debug)]
struct BrokerState {
    next_ticket: u64,
    balance: f64,
    open: Vec<TradeRecord>,
    closed: Vec<ClosedTradeReport>,
    last_price: HashMap<String, f64>,
    last_bar_time: Option<DateTime<Utc>>,
}

impl BrokerState {
    /// Drop reports no reconciliation can still ask for.
    fn prune_closed(&mut self) {
        let horizon = self.open.iter().map(|t| t.open_time).min();
        let previous_bar = self.last_bar_time;
        self.closed.retain(|r| {
            previous_bar.map_or(true, |t| r.close_time >= t)
                || horizon.is_some_and(|h| r.close_time >= h)
        });
    }
}

pub struct PaperBroker {
    instruments: HashMap<String, InstrumentSpec>,
    state: Mutex<BrokerState>,
}

impl PaperBroker {
    pub fn new(initial_balance: f64, instruments: Vec<InstrumentSpec>) -> Self {
        Self {
            instruments: instruments
                .into_iter()
                .map(|spec| (spec.symbol.to_uppercase(), spec))
                .collect(),
            state: Mutex::new(BrokerState {
                next_ticket: 1,
                balance: initial_balance,
                open: Vec::new(),
                closed: Vec::new(),
                last_price: HashMap::new(),
                last_bar_time: None,
            }),
        }
    }

    fn spec(&self, symbol: &str) -> Option<&InstrumentSpec> {
        self.instruments.get(&symbol.to_uppercase())
    }

    pub fn open_positions(&self) -> Vec<TradeRecord> {
        self.state.lock().open.clone()
    }

    /// Process a newly closed bar. Positions opened before the bar that have
    /// their stop or target inside its range are closed at that level. When
    /// both are inside the range the stop is assumed to have filled first.
    pub fn on_bar(&self, symbol: &str, bar: &Bar) -> Vec<ClosedTradeReport> {
        let mut state = self.state.lock();
        state.last_price.insert(symbol.to_uppercase(), bar.close);
        state.prune_closed();
        state.last_bar_time = Some(bar.timestamp);

        let mut reports = Vec::new();
        let mut still_open = Vec::with_capacity(state.open.len());
        for trade in std::mem::take(&mut state.open) {
            let Some(exit) = (trade.symbol == symbol && trade.open_time < bar.timestamp)
                .then(|| exit_price(&trade, bar))
                .flatten()
            else {
                still_open.push(trade);
                continue;
            };
            let Some(spec) = self.spec(&trade.symbol) else {
                still_open.push(trade);
                continue;
            };
            let pnl = trade.pnl_at(exit, spec);
            state.balance += pnl;
            info!(
                ticket = trade.ticket,
                symbol = %trade.symbol,
                exit,
                pnl,
                balance = state.balance,
                "paper position closed"
            );
            reports.push(ClosedTradeReport {
                ticket: trade.ticket,
                pnl,
                close_time: bar.timestamp,
            });
        }
        state.open = still_open;
        state.closed.extend(reports.iter().cloned());
        reports
    }
}

fn exit_price(trade: &TradeRecord, bar: &Bar) -> Option<f64> {
    let (adverse, favourable) = match trade.direction {
        Direction::Buy => (bar.low, bar.high),
        Direction::Sell => (bar.high, bar.low),
    };
    if trade.should_stop_loss(adverse) {
        Some(trade.stop_loss)
    } else if trade.should_take_profit(favourable) {
        Some(trade.take_profit)
    } else {
        None
    }
}

impl ExecutionGateway for PaperBroker {
    fn submit(&self, order: &OrderRequest) -> ExecutionReport {
        let Some(spec) = self.spec(&order.symbol) else {
            return ExecutionReport::Rejected {
                reason: format!("unknown symbol {}", order.symbol),
            };
        };
        if !spec.is_valid_volume(order.volume) {
            return ExecutionReport::Rejected {
                reason: format!("invalid volume {}", order.volume),
            };
        }
        if ![order.entry_price, order.stop_loss, order.take_profit]
            .iter()
            .all(|p| p.is_finite() && *p > 0.0)
        {
            return ExecutionReport::Rejected {
                reason: "invalid price levels".to_string(),
            };
        }

        let mut state = self.state.lock();
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        let trade = TradeRecord {
            ticket,
            symbol: order.symbol.clone(),
            direction: order.direction,
            volume: order.volume,
            entry_price: order.entry_price,
            stop_loss: order.stop_loss,
            take_profit: order.take_profit,
            open_time: order.timestamp,
            close_time: None,
            realized_pnl: None,
        };
        debug!(ticket, symbol = %order.symbol, comment = %order.comment, "paper fill");
        state.open.push(trade.clone());
        ExecutionReport::Accepted(trade)
    }
}

impl AccountInfo for PaperBroker {
    fn current_equity(&self) -> f64 {
        let state = self.state.lock();
        let unrealized: f64 = state
            .open
            .iter()
            .filter_map(|t| {
                let price = state.last_price.get(&t.symbol.to_uppercase())?;
                Some(t.pnl_at(*price, self.spec(&t.symbol)?))
            })
            .sum();
        state.balance + unrealized
    }

    fn current_balance(&self) -> f64 {
        self.state.lock().balance
    }
}

impl TradeReconciliationFeed for PaperBroker {
    fn closed_trades(&self, since: DateTime<Utc>) -> Result<Vec<ClosedTradeReport>, TraderError> {
        Ok(self
            .state
            .lock()
            .closed
            .iter()
            .filter(|r| r.close_time >= since)
            .cloned()
            .collect())
    }
}
