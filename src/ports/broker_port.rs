//! Live broker port trait.

use serde::{Deserialize, Serialize};

use crate::domain::error::TraderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

impl std::str::FromStr for OrderSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(OrderSide::Buy),
            "sell" => Ok(OrderSide::Sell),
            other => Err(format!("unknown order side '{other}' (expected buy or sell)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Filled,
    Cancelled,
}

impl OrderStatus {
    pub fn is_resolved(self) -> bool {
        !matches!(self, OrderStatus::Open)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub symbol: String,
    pub side: OrderSide,
    pub qty: u64,
    pub status: OrderStatus,
    /// Set once the order is filled.
    #[serde(default)]
    pub fill_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub symbol: String,
    pub qty: u64,
    pub avg_entry_price: f64,
}

impl BrokerPosition {
    pub fn unrealized_pl(&self, price: f64) -> f64 {
        (price - self.avg_entry_price) * self.qty as f64
    }
}

/// Source of the most recent traded price for a symbol.
pub trait QuoteSource {
    fn latest_price(&self, symbol: &str) -> Result<f64, TraderError>;
}

impl<T: QuoteSource + ?Sized> QuoteSource for std::sync::Arc<T> {
    fn latest_price(&self, symbol: &str) -> Result<f64, TraderError> {
        (**self).latest_price(symbol)
    }
}

/// Everything the live loop needs from a brokerage. Any transport or
/// authentication failure surfaces as `BrokerUnavailable`.
pub trait BrokerPort {
    fn is_market_open(&self) -> Result<bool, TraderError>;

    fn open_orders(&self) -> Result<Vec<Order>, TraderError>;

    fn order_status(&mut self, order_id: u64) -> Result<OrderStatus, TraderError>;

    fn cash(&self) -> Result<f64, TraderError>;

    fn latest_price(&self, symbol: &str) -> Result<f64, TraderError>;

    fn position(&self, symbol: &str) -> Result<Option<BrokerPosition>, TraderError>;

    fn submit_market_order(
        &mut self,
        symbol: &str,
        qty: u64,
        side: OrderSide,
    ) -> Result<Order, TraderError>;

    /// Returns how many orders were cancelled.
    fn cancel_all_orders(&mut self) -> Result<usize, TraderError>;

    /// Returns how many positions were closed.
    fn close_all_positions(&mut self) -> Result<usize, TraderError>;
}
