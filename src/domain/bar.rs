//! Indicator-augmented price bar.

use chrono::NaiveDateTime;

/// One row of market data with the indicator fields computed upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_hist: f64,
    pub stochastic_k: f64,
    pub stochastic_d: f64,
    pub upper_band: f64,
    pub lower_band: f64,
    pub cci: f64,
    pub obv: f64,
    /// 10-bar simple moving average of close, when the upstream step provides it.
    pub sma_10: Option<f64>,
}

impl Bar {
    /// True when every required field is a finite number.
    pub fn is_complete(&self) -> bool {
        [
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
            self.rsi,
            self.macd,
            self.macd_hist,
            self.stochastic_k,
            self.stochastic_d,
            self.upper_band,
            self.lower_band,
            self.cci,
            self.obv,
        ]
        .iter()
        .all(|v| v.is_finite())
            && self.sma_10.is_none_or(f64::is_finite)
    }

    /// Short moving average used as the trade gate, if usable.
    pub fn reference_price(&self) -> Option<f64> {
        self.sma_10.filter(|v| v.is_finite() && *v > 0.0)
    }
}
