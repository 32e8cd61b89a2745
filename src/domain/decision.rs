//! Decision sources: anything that maps an observation to an action.

use super::action::Action;
use super::error::TraderError;
use super::observation::{Observation, RSI_INDEX};

/// Deterministic observation → action mapping.
pub trait DecisionSource {
    fn name(&self) -> &str;

    fn predict(&self, observation: &Observation) -> Result<Action, TraderError>;
}

/// Momentum rule on the raw observation: buy oversold, sell overbought.
///
/// Thresholds are on the scaled RSI (RSI / 100), so it must be paired with
/// identity normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRule {
    pub buy_below: f64,
    pub sell_above: f64,
}

impl Default for ThresholdRule {
    fn default() -> Self {
        ThresholdRule {
            buy_below: 0.30,
            sell_above: 0.70,
        }
    }
}

impl DecisionSource for ThresholdRule {
    fn name(&self) -> &str {
        "rsi-threshold"
    }

    fn predict(&self, observation: &Observation) -> Result<Action, TraderError> {
        let rsi = observation.values()[RSI_INDEX];
        if !rsi.is_finite() {
            return Err(TraderError::Decision {
                source_name: self.name().to_string(),
                reason: format!("non-finite RSI input {rsi}"),
            });
        }
        Ok(if rsi < self.buy_below {
            Action::Buy
        } else if rsi > self.sell_above {
            Action::Sell
        } else {
            Action::Hold
        })
    }
}
