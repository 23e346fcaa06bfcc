//! CLI definition and dispatch.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_trade_log::CsvTradeLog;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_broker::PaperBroker;
use crate::adapters::replay_clock::ReplayClock;
use crate::adapters::replay_feed::ReplayFeed;
use crate::domain::bar::Bar;
use crate::domain::bar_window::BarWindow;
use crate::domain::config::{load_app_config, AppConfig};
use crate::domain::engine::{Collaborators, Engine, EngineStats};
use crate::domain::error::TraderError;
use crate::domain::governor::{RiskGovernor, SharedGovernor};
use crate::domain::indicator::levels::render_level_scale;
use crate::domain::session::evaluate_scheduled;
use crate::ports::account_port::AccountInfo;
use crate::ports::instrument_port::InstrumentInfo;
use crate::ports::trade_log_port::TradeLog;

#[derive(Parser, Debug)]
#[command(name = "scalptrader", about = "Intraday signal and risk engine for scalping strategies")]
pub struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay recorded bars through one engine per symbol against a paper broker
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding one <SYMBOL>.csv per traded symbol
        #[arg(short, long)]
        data: PathBuf,
        /// Append executed orders to this CSV file
        #[arg(long)]
        trade_log: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long, default_value_t = 10_000.0)]
        balance: f64,
        /// Ask minus bid applied to every replayed quote
        #[arg(long, default_value_t = 0.0)]
        spread: f64,
        /// Sleep the configured poll interval between bars
        #[arg(long)]
        paced: bool,
        /// Stop every engine once the daily loss limit disables trading
        #[arg(long)]
        stop_on_halt: bool,
    },
    /// Print the signal evaluated at every bar
    Signals {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        /// Include HOLD rows
        #[arg(long)]
        all: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(&cli.log_level);
    match cli.command {
        Command::Run {
            config,
            data,
            trade_log,
            symbol,
            balance,
            spread,
            paced,
            stop_on_halt,
        } => run_replay(&ReplayOptions {
            config,
            data,
            trade_log,
            symbol,
            balance,
            spread,
            paced,
            stop_on_halt,
        }),
        Command::Signals {
            config,
            data,
            symbol,
            all,
        } => run_signals(&config, &data, symbol.as_deref(), all),
        Command::Validate { config } => run_validate(&config),
    }
}

/// `RUST_LOG` wins over `--log-level`. Safe to call more than once.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn fail(err: &TraderError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<(FileConfigAdapter, AppConfig), ExitCode> {
    let adapter = FileConfigAdapter::from_file(path).map_err(|e| fail(&e))?;
    let app = load_app_config(&adapter).map_err(|e| fail(&e))?;
    Ok((adapter, app))
}

/// `--symbol` overrides the configured list.
pub fn resolve_symbols(symbol_override: Option<&str>, app: &AppConfig) -> Vec<String> {
    match symbol_override {
        Some(s) => vec![s.trim().to_uppercase()],
        None => app.symbols.clone(),
    }
}

pub struct ReplayOptions {
    pub config: PathBuf,
    pub data: PathBuf,
    pub trade_log: Option<PathBuf>,
    pub symbol: Option<String>,
    pub balance: f64,
    pub spread: f64,
    pub paced: bool,
    pub stop_on_halt: bool,
}

/// What a finished replay left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    /// Per-symbol statistics in configured symbol order.
    pub engines: Vec<(String, EngineStats)>,
    pub panicked: usize,
    pub balance: f64,
    pub equity: f64,
    pub daily_pnl: f64,
    pub trading_enabled: bool,
    pub open_positions: usize,
}

impl ReplayReport {
    /// First order the gateway refused, as the error the run exits with.
    pub fn gateway_rejection(&self) -> Option<TraderError> {
        self.engines.iter().find_map(|(symbol, stats)| {
            stats
                .first_gateway_rejection
                .as_ref()
                .map(|reason| TraderError::OrderRejected {
                    symbol: symbol.clone(),
                    reason: format!("{reason} ({} order(s) refused)", stats.gateway_rejections),
                })
        })
    }
}

pub fn run_replay(opts: &ReplayOptions) -> ExitCode {
    eprintln!("Loading config from {}", opts.config.display());
    let report = match replay(opts) {
        Ok(report) => report,
        Err(e) => return fail(&e),
    };

    eprintln!("\n=== Replay Summary ===");
    for (symbol, stats) in &report.engines {
        eprintln!(
            "  {}: {} bars ({} out of session), {} buy / {} sell signals, {} orders, {} rejected, {} closed",
            symbol,
            stats.bars_evaluated,
            stats.bars_out_of_session,
            stats.buy_signals,
            stats.sell_signals,
            stats.orders_submitted,
            stats.orders_rejected + stats.gateway_rejections,
            stats.trades_closed,
        );
    }
    eprintln!("Balance:          {:.2}", report.balance);
    eprintln!("Equity:           {:.2}", report.equity);
    eprintln!("Daily PnL:        {:.2}", report.daily_pnl);
    eprintln!("Trading enabled:  {}", report.trading_enabled);
    eprintln!("Open positions:   {}", report.open_positions);

    if report.panicked > 0 {
        eprintln!("error: {} engine(s) panicked", report.panicked);
        return ExitCode::from(1);
    }
    if let Some(err) = report.gateway_rejection() {
        return fail(&err);
    }
    ExitCode::SUCCESS
}

/// Replay the recorded history of every symbol through one engine per
/// symbol. Engines run on their own threads but take turns on a shared
/// clock, so bars from all symbols are processed in timestamp order.
pub fn replay(opts: &ReplayOptions) -> Result<ReplayReport, TraderError> {
    let adapter = FileConfigAdapter::from_file(&opts.config)?;
    let app = load_app_config(&adapter)?;
    let symbols = resolve_symbols(opts.symbol.as_deref(), &app);

    let csv = CsvAdapter::new(opts.data.clone());
    let mut feed = ReplayFeed::new(opts.spread);
    let mut specs = Vec::new();
    let warmup = app.engine.warmup_bars();
    for symbol in &symbols {
        let bars = ordered_bars(symbol, csv.load_bars(symbol)?);
        info!(symbol = %symbol, bars = bars.len(), "loaded history");
        if bars.len() < warmup {
            let err = TraderError::InsufficientData {
                symbol: symbol.clone(),
                bars: bars.len(),
                minimum: warmup,
            };
            warn!(error = %err, "every bar will hold");
        }
        feed.insert(symbol, bars, 0);
        specs.push(adapter.lookup(symbol)?);
    }

    let trade_log = opts.trade_log.as_deref().map(CsvTradeLog::open).transpose()?;

    let broker = PaperBroker::new(opts.balance, specs);
    let governor = RiskGovernor::shared(app.governor.clone());
    let clock = ReplayClock::new(feed.pending());
    let shutdown = AtomicBool::new(false);
    let pause = if opts.paced {
        app.engine.poll_interval
    } else {
        Duration::ZERO
    };

    info!(
        timeframe = %app.engine.timeframe,
        symbols = symbols.len(),
        strategy = %app.engine.strategy,
        sessions = app.engine.sessions.len(),
        "starting replay"
    );

    let results: Vec<(String, EngineStats)> = thread::scope(|scope| {
        let handles: Vec<_> = symbols
            .iter()
            .map(|symbol| {
                let ctx = ReplayContext {
                    feed: &feed,
                    clock: &clock,
                    broker: &broker,
                    instruments: &adapter,
                    trade_log: trade_log.as_ref(),
                    governor: &governor,
                    shutdown: &shutdown,
                    stop_on_halt: opts.stop_on_halt,
                };
                let mut engine = Engine::new(symbol, app.engine.clone());
                scope.spawn(move || {
                    let stats = ctx.drive(&mut engine, pause);
                    (engine.symbol().to_string(), stats)
                })
            })
            .collect();
        handles
            .into_iter()
            .filter_map(|h| h.join().ok())
            .collect()
    });

    let governor = governor.lock();
    Ok(ReplayReport {
        panicked: symbols.len() - results.len(),
        engines: results,
        balance: broker.current_balance(),
        equity: broker.current_equity(),
        daily_pnl: governor.cumulative_daily_pnl(),
        trading_enabled: governor.trading_enabled(),
        open_positions: broker.open_positions().len(),
    })
}

/// Borrowed state one replay thread needs.
struct ReplayContext<'a> {
    feed: &'a ReplayFeed,
    clock: &'a ReplayClock,
    broker: &'a PaperBroker,
    instruments: &'a FileConfigAdapter,
    trade_log: Option<&'a CsvTradeLog>,
    governor: &'a SharedGovernor,
    shutdown: &'a AtomicBool,
    stop_on_halt: bool,
}

impl ReplayContext<'_> {
    fn drive(&self, engine: &mut Engine, pause: Duration) -> EngineStats {
        let collab = Collaborators {
            feed: self.feed,
            account: self.broker,
            instruments: self.instruments,
            gateway: self.broker,
            reconciliation: self.broker,
            trade_log: self.trade_log.map(|log| log as &dyn TradeLog),
        };
        let symbol = engine.symbol().to_string();
        let participant = self.clock.participant(&symbol.to_uppercase());
        // the turn for the bar being ticked, released when the next one is asked for
        let mut held = None;
        engine.run(&collab, self.governor, self.shutdown, pause, || {
            drop(held.take());
            if self.stop_on_halt && !self.governor.lock().trading_enabled() {
                info!(symbol = %symbol, "daily loss limit reached, stopping replay");
                self.shutdown.store(true, Ordering::SeqCst);
                return None;
            }
            let turn = participant.wait_turn(self.shutdown)?;
            let bar = self.feed.advance(&symbol)?;
            held = Some(turn);
            self.broker.on_bar(&symbol, &bar);
            Some(bar.timestamp)
        })
    }
}

fn ordered_bars(symbol: &str, bars: Vec<Bar>) -> Vec<Bar> {
    let mut window = BarWindow::new(bars.len());
    for bar in bars {
        if let Err(e) = window.push(bar) {
            warn!(symbol = %symbol, error = %e, "dropping bar");
        }
    }
    window.snapshot().to_vec()
}

fn run_signals(config_path: &Path, data: &Path, symbol: Option<&str>, all: bool) -> ExitCode {
    let (_adapter, app) = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let warmup = app.engine.warmup_bars();
    let csv = CsvAdapter::new(data.to_path_buf());

    println!("timestamp,symbol,close,signal,triggers,levels");
    for symbol in resolve_symbols(symbol, &app) {
        let bars = match csv.load_bars(&symbol) {
            Ok(bars) => ordered_bars(&symbol, bars),
            Err(e) => return fail(&e),
        };
        if bars.len() < warmup {
            let err = TraderError::InsufficientData {
                symbol: symbol.clone(),
                bars: bars.len(),
                minimum: warmup,
            };
            warn!(error = %err, "every bar will hold");
        }
        let judged = evaluate_scheduled(&app.engine.strategy, &app.engine.sessions, &symbol, &bars);
        for (signal, snapshot) in &judged {
            if !all && !signal.kind.is_actionable() {
                continue;
            }
            println!(
                "{},{},{},{},{},{}",
                signal.timestamp.to_rfc3339(),
                symbol,
                signal.close,
                signal.kind,
                signal.triggers.join("+"),
                render_level_scale(snapshot.close, snapshot.support, snapshot.resistance, 20),
            );
        }
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    let (adapter, app) = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    eprintln!("Config validated successfully");
    eprintln!("  Instruments: {}", adapter.configured_instruments().join(", "));
    eprintln!("  Symbols:   {}", app.symbols.join(", "));
    eprintln!("  Strategy:  {}", app.engine.strategy);
    for session in &app.engine.sessions {
        let symbols = if session.symbols.is_empty() {
            "all symbols".to_string()
        } else {
            session.symbols.join(", ")
        };
        eprintln!(
            "  Session {} {} ({}): {}",
            session.name, session.hours, symbols, session.strategy
        );
    }
    eprintln!("  Warm-up:   {} bars", app.engine.warmup_bars());
    eprintln!(
        "  Risk:      {}% per trade, max spread {}",
        app.engine.risk.risk_percent, app.engine.risk.max_spread
    );
    eprintln!("  Daily loss limit: {}", app.governor.max_daily_loss);
    ExitCode::SUCCESS
}
