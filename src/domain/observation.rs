//! Observation vector handed to the decision source.
//!
//! The field order and scale constants are part of the policy contract: a
//! policy and its normalization statistics are only valid against the exact
//! layout they were trained on.

use super::bar::Bar;
use super::portfolio::PortfolioState;

pub const OBS_LEN: usize = 15;

pub const PRICE_SCALE: f64 = 1000.0;
pub const RSI_SCALE: f64 = 100.0;
pub const SHARES_SCALE: f64 = 1000.0;
pub const CCI_SCALE: f64 = 1000.0;
pub const OBV_SCALE: f64 = 1_000_000.0;

/// Index of the scaled RSI field.
pub const RSI_INDEX: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation(pub [f64; OBS_LEN]);

impl Observation {
    /// Layout:
    ///  0..=3  open, high, low, close / PRICE_SCALE
    ///  4      rsi / RSI_SCALE
    ///  5..=8  macd, macd_hist, stochastic_k, stochastic_d (unscaled)
    ///  9, 10  upper_band, lower_band / PRICE_SCALE
    ///  11     shares_held / SHARES_SCALE
    ///  12     cash / initial_balance
    ///  13     cci / CCI_SCALE
    ///  14     obv / OBV_SCALE
    pub fn build(bar: &Bar, state: &PortfolioState) -> Self {
        let cash_ratio = if state.initial_balance > 0.0 {
            state.cash / state.initial_balance
        } else {
            0.0
        };
        Observation([
            bar.open / PRICE_SCALE,
            bar.high / PRICE_SCALE,
            bar.low / PRICE_SCALE,
            bar.close / PRICE_SCALE,
            bar.rsi / RSI_SCALE,
            bar.macd,
            bar.macd_hist,
            bar.stochastic_k,
            bar.stochastic_d,
            bar.upper_band / PRICE_SCALE,
            bar.lower_band / PRICE_SCALE,
            state.shares_held as f64 / SHARES_SCALE,
            cash_ratio,
            bar.cci / CCI_SCALE,
            bar.obv / OBV_SCALE,
        ])
    }

    pub fn values(&self) -> &[f64; OBS_LEN] {
        &self.0
    }
}
