//! Deterministic paper broker persisted as a JSON account file.
//!
//! Orders are accepted open and fill at the latest quote the next time their
//! status is queried. No fees, no partial fills, no randomness. A buy that
//! cash no longer covers, or a sell larger than the position, is cancelled
//! at fill time instead.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::{Datelike, Local, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::error::TraderError;
use crate::ports::broker_port::{
    BrokerPort, BrokerPosition, Order, OrderSide, OrderStatus, QuoteSource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingSession {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

/// Paper account settings; passed explicitly, never read from globals.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerConfig {
    pub account_path: PathBuf,
    pub starting_cash: f64,
    /// Weekday session in local time. `None` means always open.
    pub session: Option<TradingSession>,
}

/// Resolved orders kept in the account file besides the open ones.
const RESOLVED_HISTORY: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Account {
    cash: f64,
    next_order_id: u64,
    orders: Vec<Order>,
    positions: Vec<BrokerPosition>,
}

impl Account {
    fn new(cash: f64) -> Self {
        Account {
            cash,
            next_order_id: 1,
            orders: Vec::new(),
            positions: Vec::new(),
        }
    }

    fn position_index(&self, symbol: &str) -> Option<usize> {
        self.positions.iter().position(|p| p.symbol == symbol)
    }

    fn push_order(&mut self, symbol: String, side: OrderSide, qty: u64) -> Order {
        let order = Order {
            id: self.next_order_id,
            symbol,
            side,
            qty,
            status: OrderStatus::Open,
            fill_price: None,
        };
        self.next_order_id += 1;
        self.orders.push(order.clone());
        order
    }

    /// Applies an open order at `price`, returning its resolved status.
    fn fill(&mut self, idx: usize, price: f64) -> OrderStatus {
        let order = self.orders[idx].clone();
        let notional = order.qty as f64 * price;
        let status = match order.side {
            OrderSide::Buy if notional <= self.cash => {
                self.cash -= notional;
                match self.position_index(&order.symbol) {
                    Some(p) => {
                        let pos = &mut self.positions[p];
                        let total = pos.qty + order.qty;
                        pos.avg_entry_price = (pos.avg_entry_price * pos.qty as f64 + notional)
                            / total as f64;
                        pos.qty = total;
                    }
                    None => self.positions.push(BrokerPosition {
                        symbol: order.symbol.clone(),
                        qty: order.qty,
                        avg_entry_price: price,
                    }),
                }
                OrderStatus::Filled
            }
            OrderSide::Sell => match self.position_index(&order.symbol) {
                Some(p) if self.positions[p].qty >= order.qty => {
                    self.cash += notional;
                    self.positions[p].qty -= order.qty;
                    if self.positions[p].qty == 0 {
                        self.positions.remove(p);
                    }
                    OrderStatus::Filled
                }
                _ => OrderStatus::Cancelled,
            },
            OrderSide::Buy => OrderStatus::Cancelled,
        };

        let stored = &mut self.orders[idx];
        stored.status = status;
        if status == OrderStatus::Filled {
            stored.fill_price = Some(price);
        }
        debug!(order_id = order.id, ?status, price, "paper order resolved");
        status
    }

    /// Drops the oldest resolved orders beyond `RESOLVED_HISTORY`. Open
    /// orders are always kept.
    fn prune(&mut self) {
        let resolved = self.orders.iter().filter(|o| o.status.is_resolved()).count();
        let mut excess = resolved.saturating_sub(RESOLVED_HISTORY);
        if excess == 0 {
            return;
        }
        self.orders.retain(|o| {
            if excess > 0 && o.status.is_resolved() {
                excess -= 1;
                false
            } else {
                true
            }
        });
    }
}

fn unavailable(reason: impl Into<String>) -> TraderError {
    TraderError::BrokerUnavailable {
        reason: reason.into(),
    }
}

pub struct PaperBroker<Q> {
    config: BrokerConfig,
    quotes: Q,
    account: Account,
}

impl<Q: QuoteSource> PaperBroker<Q> {
    /// Opens the account file, or starts a fresh account with
    /// `starting_cash` when none exists yet.
    pub fn open(config: BrokerConfig, quotes: Q) -> Result<Self, TraderError> {
        let account = if config.account_path.is_file() {
            let raw = fs::read_to_string(&config.account_path)?;
            serde_json::from_str(&raw).map_err(|e| TraderError::ArtifactCorrupt {
                path: config.account_path.clone(),
                reason: e.to_string(),
            })?
        } else {
            info!(
                path = %config.account_path.display(),
                cash = config.starting_cash,
                "starting new paper account"
            );
            Account::new(config.starting_cash)
        };
        Ok(PaperBroker {
            config,
            quotes,
            account,
        })
    }

    pub fn is_open_at(&self, now: NaiveDateTime) -> bool {
        match self.config.session {
            None => true,
            Some(session) => {
                let weekday = !matches!(now.weekday(), Weekday::Sat | Weekday::Sun);
                let t = now.time();
                weekday && t >= session.open && t < session.close
            }
        }
    }

    /// Writes `next` to the account file and only then makes it current, so a
    /// failed write leaves the in-memory account as it was.
    fn commit(&mut self, mut next: Account) -> Result<(), TraderError> {
        next.prune();
        let json = serde_json::to_string_pretty(&next)
            .map_err(|e| unavailable(format!("serialize account: {e}")))?;
        if let Some(parent) = self.config.account_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| unavailable(format!("create account dir: {e}")))?;
            }
        }
        fs::write(&self.config.account_path, json).map_err(|e| {
            unavailable(format!(
                "write {}: {e}",
                self.config.account_path.display()
            ))
        })?;
        self.account = next;
        Ok(())
    }

    fn quote(&self, symbol: &str) -> Result<f64, TraderError> {
        let price = self
            .quotes
            .latest_price(symbol)
            .map_err(|e| unavailable(format!("no quote for {symbol}: {e}")))?;
        if !(price.is_finite() && price > 0.0) {
            return Err(unavailable(format!("invalid quote {price} for {symbol}")));
        }
        Ok(price)
    }
}

impl<Q: QuoteSource> BrokerPort for PaperBroker<Q> {
    fn is_market_open(&self) -> Result<bool, TraderError> {
        Ok(self.is_open_at(Local::now().naive_local()))
    }

    fn open_orders(&self) -> Result<Vec<Order>, TraderError> {
        Ok(self
            .account
            .orders
            .iter()
            .filter(|o| o.status == OrderStatus::Open)
            .cloned()
            .collect())
    }

    fn order_status(&mut self, order_id: u64) -> Result<OrderStatus, TraderError> {
        let idx = self
            .account
            .orders
            .iter()
            .position(|o| o.id == order_id)
            .ok_or_else(|| unavailable(format!("unknown order {order_id}")))?;

        let status = self.account.orders[idx].status;
        if status.is_resolved() {
            return Ok(status);
        }
        let symbol = self.account.orders[idx].symbol.clone();
        let price = self.quote(&symbol)?;
        let mut next = self.account.clone();
        let status = next.fill(idx, price);
        self.commit(next)?;
        Ok(status)
    }

    fn cash(&self) -> Result<f64, TraderError> {
        Ok(self.account.cash)
    }

    fn latest_price(&self, symbol: &str) -> Result<f64, TraderError> {
        self.quote(symbol)
    }

    fn position(&self, symbol: &str) -> Result<Option<BrokerPosition>, TraderError> {
        Ok(self
            .account
            .position_index(symbol)
            .map(|i| self.account.positions[i].clone()))
    }

    fn submit_market_order(
        &mut self,
        symbol: &str,
        qty: u64,
        side: OrderSide,
    ) -> Result<Order, TraderError> {
        if qty == 0 {
            return Err(unavailable("order quantity must be positive"));
        }
        let mut next = self.account.clone();
        let order = next.push_order(symbol.to_string(), side, qty);
        self.commit(next)?;
        Ok(order)
    }

    fn cancel_all_orders(&mut self) -> Result<usize, TraderError> {
        let mut next = self.account.clone();
        let mut cancelled = 0;
        for order in next
            .orders
            .iter_mut()
            .filter(|o| o.status == OrderStatus::Open)
        {
            order.status = OrderStatus::Cancelled;
            cancelled += 1;
        }
        self.commit(next)?;
        Ok(cancelled)
    }

    fn close_all_positions(&mut self) -> Result<usize, TraderError> {
        let mut next = self.account.clone();
        let held = std::mem::take(&mut next.positions);
        for position in &held {
            let price = self.quote(&position.symbol)?;
            let order = next.push_order(position.symbol.clone(), OrderSide::Sell, position.qty);
            let last = next.orders.len() - 1;
            next.orders[last].status = OrderStatus::Filled;
            next.orders[last].fill_price = Some(price);
            next.cash += position.qty as f64 * price;
            debug!(order_id = order.id, price, "paper position closed");
        }
        self.commit(next)?;
        Ok(held.len())
    }
}

impl QuoteSource for HashMap<String, f64> {
    fn latest_price(&self, symbol: &str) -> Result<f64, TraderError> {
        self.get(symbol)
            .copied()
            .ok_or_else(|| unavailable(format!("no quote for {symbol}")))
    }
}
