//! Simulated portfolio state for one episode.

use super::error::TraderError;

/// Absolute tolerance for the net worth accounting check.
const ACCOUNTING_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioState {
    pub cash: f64,
    pub shares_held: u64,
    pub step_index: usize,
    pub net_worth_history: Vec<f64>,
    pub initial_balance: f64,
}

impl PortfolioState {
    pub fn new(initial_balance: f64) -> Self {
        PortfolioState {
            cash: initial_balance,
            shares_held: 0,
            step_index: 0,
            net_worth_history: vec![initial_balance],
            initial_balance,
        }
    }

    /// Back to the episode-start state; `initial_balance` is kept.
    pub fn reset(&mut self) {
        *self = PortfolioState::new(self.initial_balance);
    }

    /// Cash plus mark-to-market value of held shares.
    pub fn mark_to_market(&self, price: f64) -> f64 {
        self.cash + self.shares_held as f64 * price
    }

    /// Net worth at the end of the previous step.
    pub fn last_net_worth(&self) -> f64 {
        self.net_worth_history
            .last()
            .copied()
            .unwrap_or(self.initial_balance)
    }

    /// Fractional gain of the last recorded net worth over the initial balance.
    pub fn cumulative_return(&self) -> f64 {
        if self.initial_balance > 0.0 {
            self.last_net_worth() / self.initial_balance - 1.0
        } else {
            0.0
        }
    }

    pub fn record_net_worth(&mut self, net_worth: f64) {
        self.net_worth_history.push(net_worth);
    }

    /// Fails when cash is negative or the last history entry disagrees with
    /// `cash + shares_held * price`.
    pub fn check_invariants(&self, price: f64) -> Result<(), TraderError> {
        if self.cash < 0.0 || self.cash.is_nan() {
            return Err(TraderError::InvariantViolation {
                step: self.step_index,
                reason: format!("cash went negative ({})", self.cash),
            });
        }
        let expected = self.mark_to_market(price);
        let recorded = self.last_net_worth();
        if (expected - recorded).abs() > ACCOUNTING_TOLERANCE * expected.abs().max(1.0) {
            return Err(TraderError::InvariantViolation {
                step: self.step_index,
                reason: format!("net worth {recorded} does not match holdings value {expected}"),
            });
        }
        Ok(())
    }
}
