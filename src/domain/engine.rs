//! Per-instrument trading engine.
//!
//! One engine owns the bar window and trade book for a single symbol. Each
//! `tick` reconciles closed trades into the shared governor, pulls the latest
//! bars, evaluates the strategy on the newest bar pair and, for an actionable
//! signal, builds and submits at most one order. The strategy is the one whose
//! trading session covers the newest bar; a bar outside every session is
//! recorded but not evaluated. The caller supplies `now`, so replaying the
//! same bars through a fresh engine repeats every decision.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn, Level};

use crate::domain::bar::Bar;
use crate::domain::bar_window::BarWindow;
use crate::domain::config::EngineConfig;
use crate::domain::error::TraderError;
use crate::domain::governor::SharedGovernor;
use crate::domain::indicator::{calculate_atr, calculate_atr_expansion};
use crate::domain::indicator::levels::render_level_scale;
use crate::domain::order::{build_order, OrderContext, OrderRequest, Rejection};
use crate::domain::signal::{evaluate, Signal, SignalKind};
use crate::domain::trade::{TradeBook, TradeRecord};
use crate::ports::account_port::AccountInfo;
use crate::ports::execution_port::{ExecutionGateway, ExecutionReport};
use crate::ports::instrument_port::InstrumentInfo;
use crate::ports::market_data_port::MarketDataFeed;
use crate::ports::reconciliation_port::TradeReconciliationFeed;
use crate::ports::trade_log_port::TradeLog;

/// External collaborators an engine talks to during a tick.
pub struct Collaborators<'a> {
    pub feed: &'a dyn MarketDataFeed,
    pub account: &'a dyn AccountInfo,
    pub instruments: &'a dyn InstrumentInfo,
    pub gateway: &'a dyn ExecutionGateway,
    pub reconciliation: &'a dyn TradeReconciliationFeed,
    pub trade_log: Option<&'a dyn TradeLog>,
}

/// What a tick did with the newest bar.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Hold,
    /// A trade for this symbol is still open.
    PositionOpen,
    NoQuote { reason: String },
    Rejected(Rejection),
    Submitted {
        order: OrderRequest,
        trade: TradeRecord,
    },
    GatewayRejected {
        order: OrderRequest,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The feed returned nothing usable.
    NoData { reason: String },
    /// No bar newer than the last evaluated one arrived.
    NoNewBar,
    /// The newest bar falls outside every trading session for this symbol.
    OutOfSession { timestamp: DateTime<Utc> },
    Evaluated { signal: Signal, action: Action },
}

/// Counters accumulated by [`Engine::run`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStats {
    pub ticks: usize,
    pub bars_evaluated: usize,
    pub buy_signals: usize,
    pub sell_signals: usize,
    pub contradictions: usize,
    pub orders_submitted: usize,
    pub orders_rejected: usize,
    pub gateway_rejections: usize,
    /// Reason given for the first order the gateway refused.
    pub first_gateway_rejection: Option<String>,
    pub bars_out_of_session: usize,
    pub trades_closed: usize,
}

impl EngineStats {
    fn record(&mut self, outcome: &TickOutcome) {
        self.ticks += 1;
        if let TickOutcome::OutOfSession { .. } = outcome {
            self.bars_out_of_session += 1;
        }
        let TickOutcome::Evaluated { signal, action } = outcome else {
            return;
        };
        self.bars_evaluated += 1;
        match signal.kind {
            SignalKind::Buy => self.buy_signals += 1,
            SignalKind::Sell => self.sell_signals += 1,
            SignalKind::Hold => {}
        }
        if signal.contradiction {
            self.contradictions += 1;
        }
        match action {
            Action::Submitted { .. } => self.orders_submitted += 1,
            Action::Rejected(r) if !r.is_noop() => self.orders_rejected += 1,
            Action::GatewayRejected { reason, .. } => {
                self.gateway_rejections += 1;
                self.first_gateway_rejection.get_or_insert_with(|| reason.clone());
            }
            _ => {}
        }
    }
}

pub struct Engine {
    symbol: String,
    config: EngineConfig,
    window: BarWindow,
    book: TradeBook,
    last_evaluated: Option<DateTime<Utc>>,
    trades_closed: usize,
}

impl Engine {
    pub fn new(symbol: &str, config: EngineConfig) -> Self {
        Self {
            symbol: symbol.to_string(),
            window: BarWindow::new(config.window_capacity),
            config,
            book: TradeBook::new(),
            last_evaluated: None,
            trades_closed: 0,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn window(&self) -> &BarWindow {
        &self.window
    }

    pub fn trade_book(&self) -> &TradeBook {
        &self.book
    }

    /// Push fetched bars into the window. Bars at or before the newest stored
    /// bar are overlap from the previous fetch and are skipped. Returns the
    /// number of bars added.
    pub fn ingest(&mut self, bars: &[Bar]) -> usize {
        let mut added = 0;
        for bar in bars {
            if self.window.last().is_some_and(|last| bar.timestamp <= last.timestamp) {
                continue;
            }
            match self.window.push(*bar) {
                Ok(_) => added += 1,
                Err(e) => warn!(symbol = %self.symbol, error = %e, "dropping bar"),
            }
        }
        added
    }

    /// Signal for the newest bar pair in the window, judged by the strategy
    /// active at the newest bar. `None` with fewer than two bars or outside
    /// every session.
    pub fn evaluate_latest(&self) -> Option<Signal> {
        let bars = self.window.snapshot();
        if bars.len() < 2 {
            return None;
        }
        let strategy = self.config.strategy_for(&self.symbol, bars[bars.len() - 1].timestamp)?;
        let snapshots = strategy.snapshots(bars);
        let n = snapshots.len();
        let (prev, curr) = (&snapshots[n - 2], &snapshots[n - 1]);
        let signal = evaluate(prev, curr, strategy);
        if tracing::enabled!(Level::DEBUG) {
            let period = self.config.risk.atr_period;
            let atr_expansion = calculate_atr_expansion(bars, period, period, 1.0).simple_at(n - 1);
            debug!(
                symbol = %self.symbol,
                timestamp = %curr.timestamp,
                strategy = strategy.kind().as_str(),
                close = curr.close,
                signal = %signal.kind,
                atr_expansion = ?atr_expansion,
                levels = %render_level_scale(curr.close, curr.support, curr.resistance, 30),
                "evaluated bar"
            );
        }
        Some(signal)
    }

    fn latest_atr(&self) -> Option<f64> {
        let bars = self.window.snapshot();
        calculate_atr(bars, self.config.risk.atr_period).simple_at(bars.len().checked_sub(1)?)
    }

    /// Feed closed trades for this engine's open positions to the governor.
    pub fn reconcile(&mut self, feed: &dyn TradeReconciliationFeed, governor: &SharedGovernor) {
        let Some(since) = self.book.open_trades().map(|t| t.open_time).min() else {
            return;
        };
        match feed.closed_trades(since) {
            Ok(reports) => {
                let closed = self.book.reconcile(&reports, &mut governor.lock());
                self.trades_closed += closed.len();
            }
            Err(e) => warn!(symbol = %self.symbol, error = %e, "reconciliation failed"),
        }
    }

    pub fn tick(
        &mut self,
        now: DateTime<Utc>,
        collab: &Collaborators<'_>,
        governor: &SharedGovernor,
    ) -> TickOutcome {
        governor.lock().observe_time(now);
        self.reconcile(collab.reconciliation, governor);

        let bars = match collab.feed.fetch_latest_bars(
            &self.symbol,
            &self.config.timeframe,
            self.config.history_bars,
        ) {
            Ok(bars) => bars,
            Err(e) => {
                warn!(symbol = %self.symbol, error = %e, "market data fetch failed");
                return TickOutcome::NoData {
                    reason: e.to_string(),
                };
            }
        };
        if bars.is_empty() {
            return TickOutcome::NoData {
                reason: "feed returned no bars".to_string(),
            };
        }
        self.ingest(&bars);

        let Some(newest) = self.window.last().map(|b| b.timestamp) else {
            return TickOutcome::NoNewBar;
        };
        if self.last_evaluated == Some(newest) {
            return TickOutcome::NoNewBar;
        }
        self.last_evaluated = Some(newest);
        if self.config.strategy_for(&self.symbol, newest).is_none() {
            debug!(symbol = %self.symbol, timestamp = %newest, "bar outside every trading session");
            return TickOutcome::OutOfSession { timestamp: newest };
        }

        let Some(signal) = self.evaluate_latest() else {
            return TickOutcome::NoNewBar;
        };
        let action = self.act(&signal, collab, governor);
        TickOutcome::Evaluated { signal, action }
    }

    fn act(&mut self, signal: &Signal, collab: &Collaborators<'_>, governor: &SharedGovernor) -> Action {
        if !signal.kind.is_actionable() {
            return Action::Hold;
        }
        if self.book.has_open_position(&self.symbol) {
            debug!(symbol = %self.symbol, signal = %signal.kind, "position already open, skipping");
            return Action::PositionOpen;
        }

        let instrument = match collab.instruments.lookup(&self.symbol) {
            Ok(spec) => Some(spec),
            Err(e) => {
                warn!(symbol = %self.symbol, error = %e, "instrument metadata unavailable");
                None
            }
        };
        let quote = match collab.feed.quote(&self.symbol) {
            Ok(q) => q,
            Err(e) => {
                warn!(symbol = %self.symbol, error = %e, "no quote, skipping signal");
                return Action::NoQuote {
                    reason: e.to_string(),
                };
            }
        };
        let capital = if self.config.risk.use_balance {
            collab.account.current_balance()
        } else {
            collab.account.current_equity()
        };
        let ctx = OrderContext {
            symbol: &self.symbol,
            quote,
            atr: self.latest_atr(),
            capital,
            instrument: instrument.as_ref(),
            trading_enabled: governor.lock().trading_enabled(),
            comment: &self.config.comment,
        };

        let order = match build_order(signal, &ctx, &self.config.risk) {
            Ok((order, _sizing)) => order,
            Err(rejection) => {
                if rejection.is_noop() {
                    info!(symbol = %self.symbol, signal = %signal.kind, reason = %rejection, "signal not traded");
                } else {
                    warn!(symbol = %self.symbol, signal = %signal.kind, reason = %rejection, "order rejected");
                }
                return Action::Rejected(rejection);
            }
        };

        match collab.gateway.submit(&order) {
            ExecutionReport::Accepted(trade) => {
                info!(
                    symbol = %self.symbol,
                    ticket = trade.ticket,
                    direction = %trade.direction,
                    volume = trade.volume,
                    entry = trade.entry_price,
                    sl = trade.stop_loss,
                    tp = trade.take_profit,
                    "order accepted"
                );
                if let Some(log) = collab.trade_log {
                    if let Err(e) = log.record(&trade) {
                        warn!(symbol = %self.symbol, error = %e, "failed to write trade log");
                    }
                }
                self.book.record_open(trade.clone());
                Action::Submitted { order, trade }
            }
            ExecutionReport::Rejected { reason } => {
                let err = TraderError::OrderRejected {
                    symbol: self.symbol.clone(),
                    reason: reason.clone(),
                };
                warn!(error = %err, "gateway rejected order");
                Action::GatewayRejected { order, reason }
            }
        }
    }

    /// Tick until `next_tick` runs dry or `shutdown` is raised, pausing
    /// `pause` between ticks. A tick in progress always completes.
    pub fn run(
        &mut self,
        collab: &Collaborators<'_>,
        governor: &SharedGovernor,
        shutdown: &AtomicBool,
        pause: Duration,
        mut next_tick: impl FnMut() -> Option<DateTime<Utc>>,
    ) -> EngineStats {
        let mut stats = EngineStats::default();
        while !shutdown.load(Ordering::SeqCst) {
            let Some(now) = next_tick() else {
                break;
            };
            let outcome = self.tick(now, collab, governor);
            stats.record(&outcome);
            if !pause.is_zero() {
                std::thread::sleep(pause);
            }
        }
        // settle trades closed after the final bar
        self.reconcile(collab.reconciliation, governor);
        stats.trades_closed = self.trades_closed;
        info!(symbol = %self.symbol, ?stats, "engine stopped");
        stats
    }
}
