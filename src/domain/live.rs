//! Live trading loop: polls a broker on a fixed interval and places sized
//! market orders, one at a time.
//!
//! `LiveTrader` is the only writer of orders for its broker. It keeps an
//! explicit pending-order flag instead of treating the broker's open-order
//! list as a lock: the flag is seeded from the broker once, set on every
//! submission and cleared only when the broker reports that order resolved.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::error::TraderError;
use super::sizing::shares_for_cash;
use crate::ports::broker_port::{BrokerPort, Order, OrderSide};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_RISK_FRACTION: f64 = 0.05;

#[derive(Debug, Clone, PartialEq)]
pub struct LiveConfig {
    pub symbol: String,
    pub side: OrderSide,
    pub interval: Duration,
    /// Fraction of available cash committed per order.
    pub risk_fraction: f64,
}

impl LiveConfig {
    pub fn new(symbol: &str) -> Self {
        LiveConfig {
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            interval: DEFAULT_INTERVAL,
            risk_fraction: DEFAULT_RISK_FRACTION,
        }
    }

    pub fn validate(&self) -> Result<(), TraderError> {
        if self.interval.is_zero() {
            return Err(TraderError::ConfigInvalid {
                section: "live".into(),
                key: "interval_secs".into(),
                reason: "interval must be at least one second".into(),
            });
        }
        if !(self.risk_fraction > 0.0 && self.risk_fraction <= 1.0) {
            return Err(TraderError::ConfigInvalid {
                section: "live".into(),
                key: "risk_fraction".into(),
                reason: "risk_fraction must be in (0, 1]".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    MarketClosed,
    OrderPending { order_id: u64 },
    InsufficientFunds,
    /// Sell side with nothing held.
    NoPosition,
    Submitted(Order),
}

/// External command for a running loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveControl {
    Run,
    Stop,
    ForceExit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ForceExitSummary {
    pub cancelled: usize,
    pub closed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiveSummary {
    pub ticks: usize,
    pub submitted: usize,
    pub skipped: usize,
    pub broker_errors: usize,
    pub force_exit: Option<ForceExitSummary>,
}

/// Cancels every open order, then closes every position.
pub fn force_exit<B: BrokerPort + ?Sized>(broker: &mut B) -> Result<ForceExitSummary, TraderError> {
    let cancelled = broker.cancel_all_orders()?;
    let closed = broker.close_all_positions()?;
    info!(cancelled, closed, "force exit complete");
    Ok(ForceExitSummary { cancelled, closed })
}

pub struct LiveTrader<B> {
    broker: B,
    config: LiveConfig,
    pending: Option<u64>,
    seeded: bool,
}

impl<B: BrokerPort> LiveTrader<B> {
    pub fn new(broker: B, config: LiveConfig) -> Result<Self, TraderError> {
        config.validate()?;
        Ok(LiveTrader {
            broker,
            config,
            pending: None,
            seeded: false,
        })
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn pending_order(&self) -> Option<u64> {
        self.pending
    }

    /// Seeds the pending flag from orders left open by an earlier session.
    pub fn adopt_open_orders(&mut self) -> Result<(), TraderError> {
        let open = self.broker.open_orders()?;
        if let Some(order) = open.first() {
            info!(
                order_id = order.id,
                open = open.len(),
                "adopting open order from broker"
            );
            self.pending = Some(order.id);
        }
        self.seeded = true;
        Ok(())
    }

    /// One poll of the broker. Errors leave the pending flag untouched.
    pub fn tick(&mut self) -> Result<TickOutcome, TraderError> {
        if !self.seeded {
            self.adopt_open_orders()?;
        }

        if !self.broker.is_market_open()? {
            info!("market is closed, skipping tick");
            return Ok(TickOutcome::MarketClosed);
        }

        if let Some(order_id) = self.pending {
            let status = self.broker.order_status(order_id)?;
            if !status.is_resolved() {
                info!(order_id, "order still open, skipping tick");
                return Ok(TickOutcome::OrderPending { order_id });
            }
            info!(order_id, ?status, "pending order resolved");
            self.pending = None;
        }

        let symbol = self.config.symbol.as_str();
        let price = self.broker.latest_price(symbol)?;
        let cash = self.broker.cash()?;
        let mut qty = shares_for_cash(cash, self.config.risk_fraction, price);

        if self.config.side == OrderSide::Sell {
            let held = self.broker.position(symbol)?.map_or(0, |p| p.qty);
            if held == 0 {
                info!(symbol, "no position to sell, skipping tick");
                return Ok(TickOutcome::NoPosition);
            }
            qty = qty.min(held);
        }

        if qty == 0 {
            info!(symbol, cash, price, "insufficient funds, skipping tick");
            return Ok(TickOutcome::InsufficientFunds);
        }

        let order = self
            .broker
            .submit_market_order(symbol, qty, self.config.side)?;
        info!(
            order_id = order.id,
            symbol,
            qty,
            side = %self.config.side,
            price,
            "submitted market order"
        );
        self.pending = Some(order.id);
        Ok(TickOutcome::Submitted(order))
    }

    /// Logs the current position and its unrealized P/L.
    pub fn log_position(&self) {
        let symbol = self.config.symbol.as_str();
        match self.broker.position(symbol) {
            Ok(Some(position)) => match self.broker.latest_price(symbol) {
                Ok(price) => {
                    let pl = position.unrealized_pl(price);
                    info!(
                        symbol,
                        qty = position.qty,
                        avg_entry = position.avg_entry_price,
                        price,
                        unrealized_pl = format!("{pl:.2}"),
                        "position"
                    );
                }
                Err(e) => warn!(symbol, error = %e, "could not price position"),
            },
            Ok(None) => info!(symbol, "no open position"),
            Err(e) => warn!(symbol, error = %e, "could not read position"),
        }
    }

    /// Cancels and liquidates everything, then clears the pending flag.
    pub fn force_exit(&mut self) -> Result<ForceExitSummary, TraderError> {
        let summary = force_exit(&mut self.broker)?;
        self.pending = None;
        Ok(summary)
    }

    /// Ticks every `interval` until told to stop. `BrokerUnavailable` skips
    /// the tick; any other error ends the loop.
    pub async fn run(
        &mut self,
        mut control: watch::Receiver<LiveControl>,
    ) -> Result<LiveSummary, TraderError> {
        let mut summary = LiveSummary::default();
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            symbol = %self.config.symbol,
            side = %self.config.side,
            interval_secs = self.config.interval.as_secs(),
            "starting live trading loop"
        );

        let mut command = *control.borrow_and_update();
        while command == LiveControl::Run {
            tokio::select! {
                _ = ticker.tick() => {
                    summary.ticks += 1;
                    match self.tick() {
                        Ok(TickOutcome::Submitted(_)) => summary.submitted += 1,
                        Ok(_) => summary.skipped += 1,
                        Err(TraderError::BrokerUnavailable { reason }) => {
                            warn!(%reason, "broker unavailable, skipping tick");
                            summary.broker_errors += 1;
                            continue;
                        }
                        Err(e) => return Err(e),
                    }
                    self.log_position();
                }
                changed = control.changed() => {
                    command = match changed {
                        Ok(()) => *control.borrow_and_update(),
                        // controller went away
                        Err(_) => LiveControl::Stop,
                    };
                }
            }
        }

        if command == LiveControl::ForceExit {
            info!("force exit requested");
            summary.force_exit = Some(self.force_exit()?);
        } else {
            info!(ticks = summary.ticks, "live trading loop stopped");
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::broker_port::{BrokerPosition, OrderStatus};

    #[derive(Default)]
    struct Stub {
        closed: bool,
        cash: f64,
        price: f64,
        held: u64,
        status: Option<OrderStatus>,
        preexisting: Vec<Order>,
        submitted: Vec<(u64, OrderSide)>,
    }

    impl BrokerPort for Stub {
        fn is_market_open(&self) -> Result<bool, TraderError> {
            Ok(!self.closed)
        }

        fn open_orders(&self) -> Result<Vec<Order>, TraderError> {
            Ok(self.preexisting.clone())
        }

        fn order_status(&mut self, _order_id: u64) -> Result<OrderStatus, TraderError> {
            Ok(self.status.unwrap_or(OrderStatus::Open))
        }

        fn cash(&self) -> Result<f64, TraderError> {
            Ok(self.cash)
        }

        fn latest_price(&self, _symbol: &str) -> Result<f64, TraderError> {
            Ok(self.price)
        }

        fn position(&self, symbol: &str) -> Result<Option<BrokerPosition>, TraderError> {
            Ok((self.held > 0).then(|| BrokerPosition {
                symbol: symbol.to_string(),
                qty: self.held,
                avg_entry_price: self.price,
            }))
        }

        fn submit_market_order(
            &mut self,
            symbol: &str,
            qty: u64,
            side: OrderSide,
        ) -> Result<Order, TraderError> {
            self.submitted.push((qty, side));
            Ok(Order {
                id: self.submitted.len() as u64,
                symbol: symbol.to_string(),
                side,
                qty,
                status: OrderStatus::Open,
                fill_price: None,
            })
        }

        fn cancel_all_orders(&mut self) -> Result<usize, TraderError> {
            Ok(0)
        }

        fn close_all_positions(&mut self) -> Result<usize, TraderError> {
            Ok(usize::from(self.held > 0))
        }
    }

    fn trader(stub: Stub) -> LiveTrader<Stub> {
        LiveTrader::new(stub, LiveConfig::new("MSFT")).unwrap()
    }

    #[test]
    fn sizes_order_from_risk_fraction() {
        let mut t = trader(Stub {
            cash: 100_000.0,
            price: 400.0,
            ..Stub::default()
        });
        let outcome = t.tick().unwrap();
        // floor(100000 * 0.05 / 400) = 12
        assert!(matches!(outcome, TickOutcome::Submitted(ref o) if o.qty == 12));
        assert_eq!(t.pending_order(), Some(1));
    }

    #[test]
    fn pending_order_blocks_next_submission() {
        let mut t = trader(Stub {
            cash: 100_000.0,
            price: 400.0,
            ..Stub::default()
        });
        t.tick().unwrap();
        assert_eq!(t.tick().unwrap(), TickOutcome::OrderPending { order_id: 1 });
        assert_eq!(t.broker().submitted.len(), 1);
    }

    #[test]
    fn resolved_order_clears_flag() {
        let mut t = trader(Stub {
            cash: 100_000.0,
            price: 400.0,
            status: Some(OrderStatus::Filled),
            ..Stub::default()
        });
        t.tick().unwrap();
        assert!(matches!(t.tick().unwrap(), TickOutcome::Submitted(_)));
        assert_eq!(t.broker().submitted.len(), 2);
    }

    #[test]
    fn closed_market_skips() {
        let mut t = trader(Stub {
            closed: true,
            cash: 100_000.0,
            price: 400.0,
            ..Stub::default()
        });
        assert_eq!(t.tick().unwrap(), TickOutcome::MarketClosed);
        assert!(t.broker().submitted.is_empty());
    }

    #[test]
    fn small_cash_is_insufficient() {
        let mut t = trader(Stub {
            cash: 1_000.0,
            price: 400.0,
            ..Stub::default()
        });
        assert_eq!(t.tick().unwrap(), TickOutcome::InsufficientFunds);
        assert_eq!(t.pending_order(), None);
    }

    #[test]
    fn adopts_preexisting_open_order() {
        let mut t = trader(Stub {
            cash: 100_000.0,
            price: 400.0,
            preexisting: vec![Order {
                id: 77,
                symbol: "MSFT".into(),
                side: OrderSide::Buy,
                qty: 3,
                status: OrderStatus::Open,
                fill_price: None,
            }],
            ..Stub::default()
        });
        assert_eq!(t.tick().unwrap(), TickOutcome::OrderPending { order_id: 77 });
    }

    #[test]
    fn sell_side_caps_at_position() {
        let mut config = LiveConfig::new("MSFT");
        config.side = OrderSide::Sell;
        let mut t = LiveTrader::new(
            Stub {
                cash: 100_000.0,
                price: 400.0,
                held: 5,
                ..Stub::default()
            },
            config.clone(),
        )
        .unwrap();
        assert!(matches!(t.tick().unwrap(), TickOutcome::Submitted(ref o) if o.qty == 5));

        let mut flat = LiveTrader::new(
            Stub {
                cash: 100_000.0,
                price: 400.0,
                ..Stub::default()
            },
            config,
        )
        .unwrap();
        assert_eq!(flat.tick().unwrap(), TickOutcome::NoPosition);
    }

    #[test]
    fn rejects_bad_config() {
        let mut config = LiveConfig::new("MSFT");
        config.risk_fraction = 0.0;
        assert!(LiveTrader::new(Stub::default(), config).is_err());

        let mut config = LiveConfig::new("MSFT");
        config.interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
