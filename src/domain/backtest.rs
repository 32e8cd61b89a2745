//! Backtest pipeline: instrument → feature rows → artifacts → episode.
//!
//! Shared by the CLI and the web wrapper so both entry points fail the same
//! way for the same inputs. Configuration errors surface before any data
//! access, and missing artifacts surface before anything is deserialized.

use chrono::{Days, NaiveDate};
use tracing::info;

use super::decision::{DecisionSource, ThresholdRule};
use super::environment::{EnvConfig, TradingEnv};
use super::error::TraderError;
use super::execution::run_episode;
use super::instruments::InstrumentRegistry;
use super::metrics::EpisodeMetrics;
use super::normalization::{NormalizationStats, NormalizedEnv};
use super::report::BacktestReport;
use crate::ports::data_port::DataPort;
use crate::ports::model_port::ModelPort;

pub const DEFAULT_LOOKBACK_DAYS: u64 = 90;

/// Backtest date window as configured. Missing bounds are filled in relative
/// to the day the run starts: the end defaults to today and the start to
/// `lookback_days` before the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub lookback_days: u64,
}

impl Default for DataWindow {
    fn default() -> Self {
        DataWindow {
            start: None,
            end: None,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }
}

impl DataWindow {
    pub fn resolve(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let end = self.end.unwrap_or(today);
        let start = self.start.unwrap_or_else(|| {
            end.checked_sub_days(Days::new(self.lookback_days))
                .unwrap_or(NaiveDate::MIN)
        });
        (start, end)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecisionKind {
    /// Trained policy plus its normalization statistics.
    Policy,
    /// Rule on raw observations; no artifacts are loaded.
    Rule(ThresholdRule),
}

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub env: EnvConfig,
    pub decision: DecisionKind,
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), TraderError> {
        if self.start_date >= self.end_date {
            return Err(TraderError::ConfigInvalid {
                section: "data".into(),
                key: "start_date".into(),
                reason: format!(
                    "start_date ({}) must be before end_date ({})",
                    self.start_date, self.end_date
                ),
            });
        }
        self.env.validate()
    }
}

#[derive(Debug, Clone)]
pub struct BacktestRun {
    pub symbol: String,
    pub report: BacktestReport,
    pub metrics: EpisodeMetrics,
    pub bars: usize,
    pub reference_fallbacks: usize,
}

pub fn run_backtest(
    stock: &str,
    registry: &InstrumentRegistry,
    data: &dyn DataPort,
    models: &dyn ModelPort,
    config: &BacktestConfig,
) -> Result<BacktestRun, TraderError> {
    let instrument = registry.resolve(stock)?;
    config.validate()?;
    let stock = instrument.name.as_str();
    let symbol = instrument.symbol.as_str();

    info!(
        stock,
        symbol,
        start = %config.start_date,
        end = %config.end_date,
        "fetching feature rows"
    );
    let bars = data.fetch_bars(symbol, config.start_date, config.end_date)?;
    let bar_count = bars.len();

    let (source, stats): (Box<dyn DecisionSource>, NormalizationStats) = match &config.decision {
        DecisionKind::Policy => {
            models.ensure_artifacts(stock)?;
            let policy = models.load_policy(stock)?;
            let stats = models.load_normalization(stock)?;
            (Box::new(policy), stats)
        }
        DecisionKind::Rule(rule) => (Box::new(rule.clone()), NormalizationStats::identity()),
    };

    let env = TradingEnv::new(symbol, bars, config.env.clone())?;
    let mut env = NormalizedEnv::new(env, stats)?;
    let report = run_episode(stock, &mut env, source.as_ref())?;
    let metrics = EpisodeMetrics::compute(&report);

    Ok(BacktestRun {
        symbol: symbol.to_string(),
        reference_fallbacks: env.inner().reference_fallbacks(),
        bars: bar_count,
        report,
        metrics,
    })
}
