//! Backtest report: the persisted artifact of one episode.

use serde::{Deserialize, Serialize};

use super::action::Action;
use super::error::TraderError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub action: Action,
    pub reward: f64,
    pub net_worth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub stock: String,
    pub initial_portfolio_value: f64,
    pub final_portfolio_value: f64,
    pub total_return_percentage: f64,
    pub action_logs: Vec<ActionLogEntry>,
}

impl BacktestReport {
    /// Summarises a completed action log. Initial and final values are the
    /// first and last logged net worth.
    pub fn from_logs(stock: &str, action_logs: Vec<ActionLogEntry>) -> Result<Self, TraderError> {
        let (Some(first), Some(last)) = (action_logs.first(), action_logs.last()) else {
            return Err(TraderError::Report {
                reason: format!("no steps were recorded for {stock}"),
            });
        };
        let initial = first.net_worth;
        let fin = last.net_worth;
        let total_return_percentage = if initial != 0.0 {
            (fin - initial) / initial * 100.0
        } else {
            0.0
        };
        Ok(BacktestReport {
            stock: stock.to_string(),
            initial_portfolio_value: initial,
            final_portfolio_value: fin,
            total_return_percentage,
            action_logs,
        })
    }

    pub fn steps(&self) -> usize {
        self.action_logs.len()
    }

    /// Logged net worth series in step order.
    pub fn net_worth_series(&self) -> Vec<f64> {
        self.action_logs.iter().map(|e| e.net_worth).collect()
    }
}
