//! CLI integration tests for the replay, signals and validate commands.
//!
//! Tests cover:
//! - Argument parsing for every subcommand
//! - Config loading and symbol resolution
//! - Validate against real INI files on disk
//! - Full replay over CSV bars with a paper broker and trade log
//! - Exit codes for config and data failures

mod common;

use clap::Parser;
use common::*;
use scalptrader::cli::{self, Cli, Command, ReplayOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tempfile::TempDir;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

// ExitCode has no PartialEq, so compare the debug rendering
fn same_code(actual: ExitCode, expected: ExitCode) -> bool {
    format!("{actual:?}") == format!("{expected:?}")
}

fn replay_options(config: &Path, data: &Path, trade_log: Option<PathBuf>) -> ReplayOptions {
    ReplayOptions {
        config: config.to_path_buf(),
        data: data.to_path_buf(),
        trade_log,
        symbol: None,
        balance: 10_000.0,
        spread: 0.0,
        paced: false,
        stop_on_halt: false,
    }
}

/// Breakout followed by a bar that runs through the take-profit.
fn xauusd_history() -> Vec<scalptrader::domain::bar::Bar> {
    let mut bars = breakout_series();
    bars.push(make_bar(7, 115.0, 101.4, 114.0));
    bars.push(make_bar(8, 114.5, 113.5, 114.0));
    bars
}

fn flat_history(n: i64) -> Vec<scalptrader::domain::bar::Bar> {
    (0..n).map(|i| make_bar(i, 1.1001, 1.0999, 1.1)).collect()
}

mod parsing {
    use super::*;

    #[test]
    fn signals_arguments() {
        let cli = Cli::try_parse_from([
            "scalptrader",
            "signals",
            "-c",
            "bot.ini",
            "-d",
            "bars",
            "--symbol",
            "xauusd",
            "--all",
        ])
        .unwrap();
        let Command::Signals {
            config,
            data,
            symbol,
            all,
        } = cli.command
        else {
            panic!("expected signals command");
        };
        assert_eq!(config, PathBuf::from("bot.ini"));
        assert_eq!(data, PathBuf::from("bars"));
        assert_eq!(symbol.as_deref(), Some("xauusd"));
        assert!(all);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn run_requires_data_directory() {
        assert!(Cli::try_parse_from(["scalptrader", "run", "--config", "bot.ini"]).is_err());
    }

    #[test]
    fn unknown_subcommand_fails() {
        assert!(Cli::try_parse_from(["scalptrader", "trade"]).is_err());
    }
}

mod config_loading {
    use super::*;

    #[test]
    fn load_config_valid() {
        let file = write_temp_ini(VALID_INI);
        let (_adapter, app) = cli::load_config(file.path()).unwrap();
        assert_eq!(app.symbols, vec!["XAUUSD", "EURUSD"]);
        assert_eq!(app.engine.window_capacity, 200);
        assert_eq!(app.governor.max_daily_loss, 500.0);
    }

    #[test]
    fn load_config_missing_file_is_config_error() {
        let err = cli::load_config(Path::new("/nonexistent/path/config.ini")).unwrap_err();
        assert!(same_code(err, ExitCode::from(2)));
    }

    #[test]
    fn load_config_invalid_value_is_config_error() {
        let file = write_temp_ini(&VALID_INI.replace("risk_percent = 1", "risk_percent = -3"));
        let err = cli::load_config(file.path()).unwrap_err();
        assert!(same_code(err, ExitCode::from(2)));
    }

    #[test]
    fn symbol_override_wins() {
        let file = write_temp_ini(VALID_INI);
        let (_adapter, app) = cli::load_config(file.path()).unwrap();
        assert_eq!(cli::resolve_symbols(Some(" eurusd "), &app), vec!["EURUSD"]);
        assert_eq!(cli::resolve_symbols(None, &app), vec!["XAUUSD", "EURUSD"]);
    }
}

mod validate {
    use super::*;

    #[test]
    fn validate_valid_config_succeeds() {
        let file = write_temp_ini(VALID_INI);
        let code = cli::run(Cli {
            log_level: "warn".into(),
            command: Command::Validate {
                config: file.path().to_path_buf(),
            },
        });
        assert!(same_code(code, ExitCode::SUCCESS));
    }

    #[test]
    fn validate_unknown_strategy_fails() {
        let file = write_temp_ini(&VALID_INI.replace("kind = sr_breakout", "kind = martingale"));
        let code = cli::run(Cli {
            log_level: "warn".into(),
            command: Command::Validate {
                config: file.path().to_path_buf(),
            },
        });
        assert!(same_code(code, ExitCode::from(2)));
    }

    #[test]
    fn validate_missing_instrument_section_fails() {
        let ini = VALID_INI.replace("[instrument.eurusd]", "[instrument.gbpusd]");
        let file = write_temp_ini(&ini);
        let code = cli::run(Cli {
            log_level: "warn".into(),
            command: Command::Validate {
                config: file.path().to_path_buf(),
            },
        });
        assert!(same_code(code, ExitCode::from(2)));
    }
}

mod replay {
    use super::*;

    fn setup() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bot.ini"), VALID_INI).unwrap();
        write_bars_csv(dir.path(), "XAUUSD", &xauusd_history());
        write_bars_csv(dir.path(), "EURUSD", &flat_history(20));
        let config = dir.path().join("bot.ini");
        (dir, config)
    }

    #[test]
    fn replay_writes_trade_log() {
        let (dir, config) = setup();
        let log_path = dir.path().join("trades.csv");
        let code = cli::run_replay(&replay_options(&config, dir.path(), Some(log_path.clone())));
        assert!(same_code(code, ExitCode::SUCCESS));

        let log = std::fs::read_to_string(&log_path).unwrap();
        let first = log.lines().next().expect("at least one executed order");
        let expected_prefix = format!(
            "{},XAUUSD,BUY,price:101.5,",
            make_bar(6, 0.0, 0.0, 0.0).timestamp.to_rfc3339()
        );
        assert!(first.starts_with(&expected_prefix), "unexpected log line {first}");
        assert!(first.contains(",sl:") && first.contains(",tp:") && first.contains(",lot_size:"));
        assert!(!log.contains("EURUSD"));
    }

    #[test]
    fn replay_unconfigured_symbol_is_config_error() {
        let (dir, config) = setup();
        write_bars_csv(dir.path(), "GBPUSD", &flat_history(5));
        let mut opts = replay_options(&config, dir.path(), None);
        opts.symbol = Some("gbpusd".into());
        assert!(same_code(cli::run_replay(&opts), ExitCode::from(2)));
    }

    #[test]
    fn replay_single_symbol_without_log() {
        let (dir, config) = setup();
        let mut opts = replay_options(&config, dir.path(), None);
        opts.symbol = Some("EURUSD".into());
        let code = cli::run_replay(&opts);
        assert!(same_code(code, ExitCode::SUCCESS));
    }

    #[test]
    fn replay_missing_bar_file_is_data_error() {
        let (dir, config) = setup();
        std::fs::remove_file(dir.path().join("EURUSD.csv")).unwrap();
        let code = cli::run_replay(&replay_options(&config, dir.path(), None));
        assert!(same_code(code, ExitCode::from(5)));
    }

    /// Half-hourly bars from 09:00 on day one to 14:30 on day two.
    fn two_day_history(base: f64, amplitude: f64, phase: f64) -> Vec<scalptrader::domain::bar::Bar> {
        (0..60)
            .map(|i| {
                let x = i as f64 + phase;
                let close = base + amplitude * (x * 0.45).sin() + amplitude * 0.05 * x;
                make_bar(30 * i, close + amplitude * 0.2, close - amplitude * 0.2, close)
            })
            .collect()
    }

    #[test]
    fn two_symbol_replay_repeats_across_session_days() {
        let dir = TempDir::new().unwrap();
        let ini = VALID_INI.replace("max_daily_loss = 500", "max_daily_loss = 5");
        std::fs::write(dir.path().join("bot.ini"), ini).unwrap();
        write_bars_csv(dir.path(), "XAUUSD", &two_day_history(100.0, 3.0, 0.0));
        write_bars_csv(dir.path(), "EURUSD", &two_day_history(1.1, 0.003, 1.7));
        let opts = replay_options(&dir.path().join("bot.ini"), dir.path(), None);

        let first = cli::replay(&opts).unwrap();
        assert_eq!(first.panicked, 0);
        let symbols: Vec<&str> = first.engines.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(symbols, vec!["XAUUSD", "EURUSD"]);
        for (_, stats) in &first.engines {
            assert_eq!(stats.ticks, 60);
            assert_eq!(stats.bars_evaluated, 59);
        }
        for _ in 0..5 {
            assert_eq!(cli::replay(&opts).unwrap(), first);
        }
    }

    #[test]
    fn replay_missing_config_is_config_error() {
        let dir = TempDir::new().unwrap();
        let code = cli::run_replay(&replay_options(
            &dir.path().join("missing.ini"),
            dir.path(),
            None,
        ));
        assert!(same_code(code, ExitCode::from(2)));
    }

    #[test]
    fn signals_over_csv_history_succeeds() {
        let (dir, config) = setup();
        let code = cli::run(Cli {
            log_level: "warn".into(),
            command: Command::Signals {
                config,
                data: dir.path().to_path_buf(),
                symbol: Some("XAUUSD".into()),
                all: false,
            },
        });
        assert!(same_code(code, ExitCode::SUCCESS));
    }
}
