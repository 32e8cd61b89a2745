//! CLI definition and dispatch.

use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_model_adapter::JsonModelAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::adapters::paper_broker::{BrokerConfig, PaperBroker, TradingSession};
use crate::domain::backtest::{self, BacktestConfig, DEFAULT_LOOKBACK_DAYS, DataWindow, DecisionKind};
use crate::domain::config_validation::{
    parse_instruments, read_date, read_f64, read_time, read_u64, validate_config,
};
use crate::domain::decision::ThresholdRule;
use crate::domain::environment::EnvConfig;
use crate::domain::error::TraderError;
use crate::domain::live::{self, DEFAULT_RISK_FRACTION, LiveConfig, LiveControl, LiveTrader};
use crate::ports::broker_port::OrderSide;
use crate::ports::config_port::ConfigPort;
use crate::ports::model_port::ModelPort;
use crate::ports::report_port::ReportPort;

const DEFAULT_LISTEN: &str = "127.0.0.1:3000";

#[derive(Parser, Debug)]
#[command(name = "rltrader", about = "RL trading backtester and paper trader")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest for one instrument
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        stock: String,
        /// Directory for the JSON report (overrides [report] dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Use the threshold rule instead of the trained policy
        #[arg(long)]
        rule: bool,
    },
    /// Run the live trading loop against the paper broker until Ctrl-C
    Live {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        stock: String,
    },
    /// Cancel all open orders and close all positions
    ForceExit {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Check configuration, instrument and artifacts without simulating
    Validate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        stock: Option<String>,
    },
    /// List the supported instruments
    ListInstruments {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Start the web server
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            stock,
            output_dir,
            rule,
        } => run_backtest(&config, &stock, output_dir.as_deref(), rule),
        Command::Live { config, stock } => run_live(&config, &stock),
        Command::ForceExit { config } => run_force_exit(&config),
        Command::Validate { config, stock } => run_validate(&config, stock.as_deref()),
        Command::ListInstruments { config } => run_list_instruments(&config),
        Command::Serve { config } => run_serve(&config),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Loads and validates the INI file. Every command goes through here so a bad
/// value is reported before any data, artifact or broker access.
pub fn load_config(path: &Path) -> Result<FileConfigAdapter, TraderError> {
    eprintln!("Loading config from {}", path.display());
    let adapter = FileConfigAdapter::from_file(path)?;
    validate_config(&adapter)?;
    Ok(adapter)
}

pub fn build_env_config(config: &dyn ConfigPort) -> Result<EnvConfig, TraderError> {
    let d = EnvConfig::default();
    let env = EnvConfig {
        initial_balance: read_f64(config, "environment", "initial_balance", d.initial_balance)?,
        transaction_fee: read_f64(config, "environment", "transaction_fee", d.transaction_fee)?,
        buy_fraction: read_f64(config, "environment", "buy_fraction", d.buy_fraction)?,
        sell_fraction: read_f64(config, "environment", "sell_fraction", d.sell_fraction)?,
        profit_threshold: read_f64(config, "environment", "profit_threshold", d.profit_threshold)?,
    };
    env.validate()?;
    Ok(env)
}

pub fn build_window(config: &dyn ConfigPort) -> Result<DataWindow, TraderError> {
    Ok(DataWindow {
        start: read_date(config, "data", "start_date")?,
        end: read_date(config, "data", "end_date")?,
        lookback_days: read_u64(config, "data", "lookback_days", DEFAULT_LOOKBACK_DAYS)?,
    })
}

pub fn build_backtest_config(
    config: &dyn ConfigPort,
    today: chrono::NaiveDate,
    rule: bool,
) -> Result<BacktestConfig, TraderError> {
    let (start_date, end_date) = build_window(config)?.resolve(today);
    let decision = if rule {
        DecisionKind::Rule(ThresholdRule::default())
    } else {
        DecisionKind::Policy
    };
    let backtest = BacktestConfig {
        start_date,
        end_date,
        env: build_env_config(config)?,
        decision,
    };
    backtest.validate()?;
    Ok(backtest)
}

pub fn build_live_config(config: &dyn ConfigPort, symbol: &str) -> Result<LiveConfig, TraderError> {
    let side = match config.get_string("live", "side") {
        None => OrderSide::Buy,
        Some(s) => s.parse().map_err(|reason| TraderError::ConfigInvalid {
            section: "live".into(),
            key: "side".into(),
            reason,
        })?,
    };
    let live = LiveConfig {
        symbol: symbol.to_string(),
        side,
        interval: Duration::from_secs(read_u64(config, "live", "interval_secs", 60)?),
        risk_fraction: read_f64(config, "live", "risk_fraction", DEFAULT_RISK_FRACTION)?,
    };
    live.validate()?;
    Ok(live)
}

pub fn build_broker_config(config: &dyn ConfigPort) -> Result<BrokerConfig, TraderError> {
    let open = read_time(config, "broker", "session_open")?;
    let close = read_time(config, "broker", "session_close")?;
    let session = match (open, close) {
        (Some(open), Some(close)) if open < close => Some(TradingSession { open, close }),
        (None, None) => None,
        _ => {
            return Err(TraderError::ConfigInvalid {
                section: "broker".into(),
                key: "session_open".into(),
                reason: "session_open and session_close must both be set, open before close"
                    .into(),
            });
        }
    };
    Ok(BrokerConfig {
        account_path: PathBuf::from(
            config
                .get_string("broker", "account_path")
                .unwrap_or_else(|| "paper_account.json".to_string()),
        ),
        starting_cash: read_f64(config, "broker", "starting_cash", 100_000.0)?,
        session,
    })
}

fn dir_setting(config: &dyn ConfigPort, section: &str, default: &str) -> PathBuf {
    PathBuf::from(
        config
            .get_string(section, "dir")
            .unwrap_or_else(|| default.to_string()),
    )
}

pub fn csv_dir(config: &dyn ConfigPort) -> PathBuf {
    PathBuf::from(
        config
            .get_string("data", "csv_dir")
            .unwrap_or_else(|| "data".to_string()),
    )
}

pub fn models_dir(config: &dyn ConfigPort) -> PathBuf {
    dir_setting(config, "models", "models")
}

pub fn report_dir(config: &dyn ConfigPort) -> PathBuf {
    dir_setting(config, "report", ".")
}

fn run_backtest(
    config_path: &Path,
    stock: &str,
    output_dir: Option<&Path>,
    rule: bool,
) -> Result<(), TraderError> {
    // Stage 1: config
    let config = load_config(config_path)?;
    let registry = parse_instruments(&config)?;
    let bt_config = build_backtest_config(&config, Local::now().date_naive(), rule)?;

    // Stage 2: adapters
    let data = CsvAdapter::new(csv_dir(&config));
    let models = JsonModelAdapter::new(models_dir(&config));
    let reports = JsonReportAdapter::new(
        output_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| report_dir(&config)),
    );

    // Stage 3: run
    eprintln!(
        "Running backtest for {stock} ({} to {})...",
        bt_config.start_date, bt_config.end_date
    );
    let run = backtest::run_backtest(stock, &registry, &data, &models, &bt_config)?;
    if run.reference_fallbacks > 0 {
        eprintln!(
            "warning: {} steps had no SMA_10 reference price, fell back to close",
            run.reference_fallbacks
        );
    }

    // Stage 4: persist and print
    let path = reports.write(&run.report)?;
    let json = serde_json::to_string_pretty(&run.report).map_err(|e| TraderError::Report {
        reason: e.to_string(),
    })?;
    println!("{json}");

    let m = &run.metrics;
    eprintln!();
    eprintln!("=== Backtest Results ({} / {}) ===", run.report.stock, run.symbol);
    eprintln!("Bars:              {}", run.bars);
    eprintln!("Initial value:     {:.2}", run.report.initial_portfolio_value);
    eprintln!("Final value:       {:.2}", run.report.final_portfolio_value);
    eprintln!("Total return:      {:.2}%", run.report.total_return_percentage);
    eprintln!("Max drawdown:      {:.2}%", m.max_drawdown * 100.0);
    eprintln!("Drawdown duration: {} steps", m.max_drawdown_duration);
    eprintln!("Sharpe (per step): {:.4}", m.sharpe_ratio);
    eprintln!("Actions:           {} hold / {} buy / {} sell", m.holds, m.buys, m.sells);
    eprintln!("Report written to {}", path.display());
    Ok(())
}

fn run_live(config_path: &Path, stock: &str) -> Result<(), TraderError> {
    let config = load_config(config_path)?;
    let registry = parse_instruments(&config)?;
    let instrument = registry.resolve(stock)?;
    let live_config = build_live_config(&config, &instrument.symbol)?;
    let broker_config = build_broker_config(&config)?;

    let broker = PaperBroker::open(broker_config, CsvAdapter::new(csv_dir(&config)))?;
    let mut trader = LiveTrader::new(broker, live_config)?;
    eprintln!(
        "Live trading {} ({}), press Ctrl-C to stop",
        instrument.name, instrument.symbol
    );

    let runtime = tokio::runtime::Runtime::new()?;
    let summary = runtime.block_on(async {
        let (tx, rx) = tokio::sync::watch::channel(LiveControl::Run);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(LiveControl::Stop);
            }
        });
        trader.run(rx).await
    })?;

    eprintln!(
        "Stopped after {} ticks: {} orders submitted, {} skipped, {} broker errors",
        summary.ticks, summary.submitted, summary.skipped, summary.broker_errors
    );
    Ok(())
}

fn run_force_exit(config_path: &Path) -> Result<(), TraderError> {
    let config = load_config(config_path)?;
    let broker_config = build_broker_config(&config)?;
    let mut broker = PaperBroker::open(broker_config, CsvAdapter::new(csv_dir(&config)))?;
    let summary = live::force_exit(&mut broker)?;
    eprintln!(
        "Cancelled {} open orders, closed {} positions",
        summary.cancelled, summary.closed
    );
    Ok(())
}

fn run_validate(config_path: &Path, stock: Option<&str>) -> Result<(), TraderError> {
    let config = load_config(config_path)?;
    let registry = parse_instruments(&config)?;
    build_backtest_config(&config, Local::now().date_naive(), false)?;
    build_broker_config(&config)?;
    eprintln!("Config OK ({} instruments)", registry.len());

    if let Some(stock) = stock {
        let instrument = registry.resolve(stock)?;
        build_live_config(&config, &instrument.symbol)?;
        let models = JsonModelAdapter::new(models_dir(&config));
        models.ensure_artifacts(&instrument.name)?;
        let policy = models.load_policy(&instrument.name)?;
        models.load_normalization(&instrument.name)?;
        eprintln!(
            "Artifacts OK for {} ({} layers)",
            instrument.name,
            policy.layers.len()
        );
    }
    Ok(())
}

fn run_list_instruments(config_path: &Path) -> Result<(), TraderError> {
    let config = load_config(config_path)?;
    let registry = parse_instruments(&config)?;
    for instrument in registry.iter() {
        println!("{}\t{}", instrument.name, instrument.symbol);
    }
    Ok(())
}

fn run_serve(config_path: &Path) -> Result<(), TraderError> {
    #[cfg(feature = "web")]
    {
        use crate::adapters::web::{AppState, build_router};
        use std::net::SocketAddr;
        use std::sync::Arc;

        let config = load_config(config_path)?;
        let listen = config
            .get_string("web", "listen")
            .unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let addr: SocketAddr = listen.parse().map_err(|_| TraderError::ConfigInvalid {
            section: "web".into(),
            key: "listen".into(),
            reason: format!("'{listen}' is not a socket address"),
        })?;

        let csv = Arc::new(CsvAdapter::new(csv_dir(&config)));
        let state = AppState {
            registry: parse_instruments(&config)?,
            data_port: csv.clone(),
            models: Arc::new(JsonModelAdapter::new(models_dir(&config))),
            reports: Arc::new(JsonReportAdapter::new(report_dir(&config))),
            quotes: csv,
            window: build_window(&config)?,
            env: build_env_config(&config)?,
            // symbol is replaced when a session starts
            live: build_live_config(&config, "")?,
            broker: build_broker_config(&config)?,
            live_session: Default::default(),
        };
        let router = build_router(state);

        eprintln!("Starting web server on {addr}");
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(async {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router).await
        })?;
        Ok(())
    }

    #[cfg(not(feature = "web"))]
    {
        let _ = (config_path, DEFAULT_LISTEN);
        Err(TraderError::ConfigInvalid {
            section: "web".into(),
            key: "listen".into(),
            reason: "web feature is required for serve".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn cli_parses_backtest() {
        let cli = Cli::try_parse_from([
            "rltrader", "backtest", "-c", "cfg.ini", "--stock", "microsoft", "--rule",
        ])
        .unwrap();
        match cli.command {
            Command::Backtest {
                config,
                stock,
                output_dir,
                rule,
            } => {
                assert_eq!(config, PathBuf::from("cfg.ini"));
                assert_eq!(stock, "microsoft");
                assert!(output_dir.is_none());
                assert!(rule);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_parses_force_exit_and_list() {
        let cli = Cli::try_parse_from(["rltrader", "force-exit", "--config", "a.ini"]).unwrap();
        assert!(matches!(cli.command, Command::ForceExit { .. }));
        let cli = Cli::try_parse_from(["rltrader", "list-instruments", "-c", "a.ini"]).unwrap();
        assert!(matches!(cli.command, Command::ListInstruments { .. }));
    }

    #[test]
    fn cli_requires_stock_for_backtest() {
        assert!(Cli::try_parse_from(["rltrader", "backtest", "-c", "a.ini"]).is_err());
    }

    #[test]
    fn env_config_defaults() {
        let env = build_env_config(&config("[environment]\n")).unwrap();
        assert_eq!(env, EnvConfig::default());
    }

    #[test]
    fn env_config_reads_overrides() {
        let env = build_env_config(&config(
            "[environment]\ninitial_balance = 5000\ntransaction_fee = 0\nbuy_fraction = 1.0\n",
        ))
        .unwrap();
        assert_eq!(env.initial_balance, 5000.0);
        assert_eq!(env.transaction_fee, 0.0);
        assert_eq!(env.buy_fraction, 1.0);
        assert_eq!(env.sell_fraction, 0.5);
    }

    #[test]
    fn env_config_rejects_garbage() {
        let err = build_env_config(&config("[environment]\ninitial_balance = lots\n")).unwrap_err();
        assert!(matches!(err, TraderError::ConfigInvalid { .. }));
    }

    #[test]
    fn backtest_config_uses_lookback_from_today() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let bt = build_backtest_config(&config("[data]\nlookback_days = 30\n"), today, false)
            .unwrap();
        assert_eq!(bt.end_date, today);
        assert_eq!(bt.start_date, NaiveDate::from_ymd_opt(2024, 5, 31).unwrap());
        assert_eq!(bt.decision, DecisionKind::Policy);
    }

    #[test]
    fn backtest_config_explicit_dates_and_rule() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let bt = build_backtest_config(
            &config("[data]\nstart_date = 2023-01-01\nend_date = 2023-12-31\n"),
            today,
            true,
        )
        .unwrap();
        assert_eq!(bt.start_date, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(bt.end_date, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
        assert!(matches!(bt.decision, DecisionKind::Rule(_)));
    }

    #[test]
    fn live_config_defaults_and_side() {
        let live = build_live_config(&config("[live]\n"), "MSFT").unwrap();
        assert_eq!(live.symbol, "MSFT");
        assert_eq!(live.side, OrderSide::Buy);
        assert_eq!(live.interval, Duration::from_secs(60));
        assert_eq!(live.risk_fraction, 0.05);

        let live = build_live_config(&config("[live]\nside = sell\ninterval_secs = 5\n"), "MSFT")
            .unwrap();
        assert_eq!(live.side, OrderSide::Sell);
        assert_eq!(live.interval, Duration::from_secs(5));
    }

    #[test]
    fn live_config_rejects_unknown_side() {
        let err = build_live_config(&config("[live]\nside = short\n"), "MSFT").unwrap_err();
        assert!(matches!(err, TraderError::ConfigInvalid { ref key, .. } if key == "side"));
    }

    #[test]
    fn broker_config_session() {
        let broker = build_broker_config(&config(
            "[broker]\naccount_path = acct.json\nsession_open = 09:30\nsession_close = 16:00\n",
        ))
        .unwrap();
        assert_eq!(broker.account_path, PathBuf::from("acct.json"));
        assert_eq!(broker.starting_cash, 100_000.0);
        let session = broker.session.unwrap();
        assert_eq!(session.open, chrono::NaiveTime::from_hms_opt(9, 30, 0).unwrap());

        let always = build_broker_config(&config("[broker]\n")).unwrap();
        assert!(always.session.is_none());

        let half = build_broker_config(&config("[broker]\nsession_open = 09:30\n")).unwrap_err();
        assert!(matches!(half, TraderError::ConfigInvalid { .. }));
    }

    #[test]
    fn directories_default() {
        let c = config("[data]\n");
        assert_eq!(csv_dir(&c), PathBuf::from("data"));
        assert_eq!(models_dir(&c), PathBuf::from("models"));
        assert_eq!(report_dir(&c), PathBuf::from("."));
    }
}
