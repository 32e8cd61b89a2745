//! Portfolio environment: the bar-by-bar state machine driven by a decision source.
//!
//! Each `step` trades at the close of the bar the decision was made on, then
//! advances one bar and marks the portfolio to that bar's close.
//!
//! Trade gates use the post-step bar's 10-bar SMA as the reference price:
//! - BUY only when the trade price is below the reference; invests
//!   `buy_fraction` of cash in whole shares, fee included.
//! - SELL only with shares held and either price above the reference or a
//!   cumulative return of at least `profit_threshold`; sells `sell_fraction`
//!   of the position, or all of it when that rounds to zero.
//!
//! When a bar carries no SMA the reference falls back to the trade price,
//! which disables the price gate for that step. Every fallback is counted and
//! logged so a data-quality problem does not pass silently.

use tracing::debug;

use super::action::Action;
use super::bar::Bar;
use super::error::TraderError;
use super::observation::Observation;
use super::portfolio::PortfolioState;
use super::sizing::{buy_cost, sell_proceeds, shares_for_cash, shares_to_sell};

/// Simulation parameters fixed for the lifetime of an environment.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvConfig {
    pub initial_balance: f64,
    /// Proportional fee, e.g. 0.001 for 0.1%.
    pub transaction_fee: f64,
    pub buy_fraction: f64,
    pub sell_fraction: f64,
    pub profit_threshold: f64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        EnvConfig {
            initial_balance: 10_000.0,
            transaction_fee: 0.001,
            buy_fraction: 0.5,
            sell_fraction: 0.5,
            profit_threshold: 0.02,
        }
    }
}

impl EnvConfig {
    pub fn validate(&self) -> Result<(), TraderError> {
        let invalid = |key: &str, reason: &str| TraderError::ConfigInvalid {
            section: "environment".to_string(),
            key: key.to_string(),
            reason: reason.to_string(),
        };
        if !(self.initial_balance.is_finite() && self.initial_balance > 0.0) {
            return Err(invalid("initial_balance", "initial_balance must be positive"));
        }
        if !(self.transaction_fee >= 0.0 && self.transaction_fee < 1.0) {
            return Err(invalid("transaction_fee", "transaction_fee must be in [0, 1)"));
        }
        if !(self.buy_fraction > 0.0 && self.buy_fraction <= 1.0) {
            return Err(invalid("buy_fraction", "buy_fraction must be in (0, 1]"));
        }
        if !(self.sell_fraction > 0.0 && self.sell_fraction <= 1.0) {
            return Err(invalid("sell_fraction", "sell_fraction must be in (0, 1]"));
        }
        if !(self.profit_threshold.is_finite() && self.profit_threshold >= 0.0) {
            return Err(invalid(
                "profit_threshold",
                "profit_threshold must be non-negative",
            ));
        }
        Ok(())
    }
}

/// A trade the environment executed during a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub action: Action,
    pub shares: u64,
    pub price: f64,
    /// Signed change in cash, fees included.
    pub cash_delta: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepInfo {
    pub net_worth: f64,
    pub fill: Option<Fill>,
    pub reference_fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

/// The contract the execution loop drives.
pub trait Environment {
    /// Start (or restart) an episode and return the first observation.
    fn reset(&mut self) -> Observation;

    fn step(&mut self, action: Action) -> Result<StepOutcome, TraderError>;

    /// Number of steps in one episode.
    fn max_steps(&self) -> usize;
}

pub struct TradingEnv {
    symbol: String,
    bars: Vec<Bar>,
    config: EnvConfig,
    state: PortfolioState,
    max_steps: usize,
    reference_fallbacks: usize,
}

impl TradingEnv {
    /// Builds an environment over at least two complete bars.
    pub fn new(symbol: &str, bars: Vec<Bar>, config: EnvConfig) -> Result<Self, TraderError> {
        config.validate()?;

        if bars.len() < 2 {
            return Err(TraderError::DataUnavailable {
                code: symbol.to_string(),
                reason: format!("an episode needs at least 2 bars, got {}", bars.len()),
            });
        }
        if let Some(i) = bars.iter().position(|b| !b.is_complete()) {
            return Err(TraderError::DataUnavailable {
                code: symbol.to_string(),
                reason: format!("bar {i} has missing or non-finite values"),
            });
        }

        let max_steps = bars.len() - 1;
        Ok(TradingEnv {
            symbol: symbol.to_string(),
            state: PortfolioState::new(config.initial_balance),
            bars,
            config,
            max_steps,
            reference_fallbacks: 0,
        })
    }

    pub fn state(&self) -> &PortfolioState {
        &self.state
    }

    /// Steps in the current episode whose bar had no usable SMA.
    pub fn reference_fallbacks(&self) -> usize {
        self.reference_fallbacks
    }

    fn observation(&self) -> Observation {
        Observation::build(&self.bars[self.state.step_index], &self.state)
    }

    fn try_buy(&mut self, price: f64, reference: f64) -> Option<Fill> {
        if price >= reference {
            return None;
        }
        let shares = shares_for_cash(self.state.cash, self.config.buy_fraction, price);
        if shares == 0 {
            return None;
        }
        let cost = buy_cost(shares, price, self.config.transaction_fee);
        if cost > self.state.cash {
            return None;
        }
        self.state.cash -= cost;
        self.state.shares_held += shares;
        Some(Fill {
            action: Action::Buy,
            shares,
            price,
            cash_delta: -cost,
        })
    }

    fn try_sell(&mut self, price: f64, reference: f64) -> Result<Option<Fill>, TraderError> {
        if self.state.shares_held == 0 {
            return Ok(None);
        }
        let in_profit = self.state.cumulative_return() >= self.config.profit_threshold;
        if price <= reference && !in_profit {
            return Ok(None);
        }
        let shares = shares_to_sell(self.state.shares_held, self.config.sell_fraction);
        let remaining = self.state.shares_held.checked_sub(shares).ok_or_else(|| {
            TraderError::InvariantViolation {
                step: self.state.step_index,
                reason: format!(
                    "sell of {shares} shares exceeds position of {}",
                    self.state.shares_held
                ),
            }
        })?;
        let proceeds = sell_proceeds(shares, price, self.config.transaction_fee);
        self.state.cash += proceeds;
        self.state.shares_held = remaining;
        Ok(Some(Fill {
            action: Action::Sell,
            shares,
            price,
            cash_delta: proceeds,
        }))
    }
}

impl Environment for TradingEnv {
    fn reset(&mut self) -> Observation {
        self.state.reset();
        self.reference_fallbacks = 0;
        self.observation()
    }

    fn step(&mut self, action: Action) -> Result<StepOutcome, TraderError> {
        if self.state.step_index >= self.max_steps {
            return Err(TraderError::InvariantViolation {
                step: self.state.step_index,
                reason: "step called after the episode finished".to_string(),
            });
        }

        let current_price = self.bars[self.state.step_index].close;
        self.state.step_index += 1;
        let bar = &self.bars[self.state.step_index];
        let mark_price = bar.close;
        let (reference_price, reference_fallback) = match bar.reference_price() {
            Some(sma) => (sma, false),
            None => (current_price, true),
        };
        if reference_fallback {
            self.reference_fallbacks += 1;
            debug!(
                symbol = %self.symbol,
                step = self.state.step_index,
                "no SMA_10 on bar, reference price falls back to close"
            );
        }

        let previous_net_worth = self.state.last_net_worth();
        let fill = match action {
            Action::Hold => None,
            Action::Buy => self.try_buy(current_price, reference_price),
            Action::Sell => self.try_sell(current_price, reference_price)?,
        };
        if let Some(fill) = &fill {
            debug!(
                symbol = %self.symbol,
                step = self.state.step_index,
                action = %fill.action,
                shares = fill.shares,
                price = fill.price,
                cash = self.state.cash,
                "fill"
            );
        }

        let net_worth = self.state.mark_to_market(mark_price);
        let reward = if previous_net_worth == 0.0 {
            0.0
        } else {
            (net_worth - previous_net_worth) / previous_net_worth
        };
        self.state.record_net_worth(net_worth);
        self.state.check_invariants(mark_price)?;

        Ok(StepOutcome {
            observation: self.observation(),
            reward,
            done: self.state.step_index >= self.max_steps,
            info: StepInfo {
                net_worth,
                fill,
                reference_fallback,
            },
        })
    }

    fn max_steps(&self) -> usize {
        self.max_steps
    }
}
