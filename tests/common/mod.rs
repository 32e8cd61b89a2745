#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rltrader::domain::bar::Bar;
use rltrader::domain::error::TraderError;
use rltrader::domain::normalization::NormalizationStats;
use rltrader::domain::observation::OBS_LEN;
use rltrader::domain::policy::{Activation, DenseLayer, MlpPolicy};
use rltrader::ports::broker_port::{BrokerPort, BrokerPosition, Order, OrderSide, OrderStatus};
use rltrader::ports::data_port::DataPort;
use rltrader::ports::model_port::ModelPort;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

/// Bar with neutral indicators; only price and SMA matter to the environment.
pub fn make_bar(index: usize, close: f64, sma_10: Option<f64>) -> Bar {
    Bar {
        timestamp: start_time() + Duration::hours(index as i64),
        open: close - 0.5,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 10_000.0,
        rsi: 50.0,
        macd: 0.1,
        macd_hist: 0.05,
        stochastic_k: 50.0,
        stochastic_d: 50.0,
        upper_band: close + 2.0,
        lower_band: close - 2.0,
        cci: 0.0,
        obv: 100_000.0,
        sma_10,
    }
}

pub fn make_bars(closes: &[f64], smas: &[Option<f64>]) -> Vec<Bar> {
    closes
        .iter()
        .zip(smas)
        .enumerate()
        .map(|(i, (&close, &sma))| make_bar(i, close, sma))
        .collect()
}

/// Bars whose RSI walks the given values, for rule-driven runs.
pub fn with_rsi(mut bars: Vec<Bar>, rsi: &[f64]) -> Vec<Bar> {
    for (bar, &r) in bars.iter_mut().zip(rsi) {
        bar.rsi = r;
    }
    bars
}

/// Policy whose output bias always picks `action_index`.
pub fn constant_policy(action_index: usize) -> MlpPolicy {
    let mut bias = vec![0.0; 3];
    bias[action_index] = 1.0;
    MlpPolicy {
        layers: vec![DenseLayer {
            weights: vec![vec![0.0; OBS_LEN]; 3],
            bias,
        }],
        activation: Activation::Tanh,
    }
}

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<Bar>, TraderError> {
        match self.data.get(symbol) {
            Some(bars) if !bars.is_empty() => Ok(bars.clone()),
            _ => Err(TraderError::DataUnavailable {
                code: symbol.to_string(),
                reason: "no rows".to_string(),
            }),
        }
    }

    fn list_symbols(&self) -> Result<Vec<String>, TraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub struct MockModelPort {
    pub policies: HashMap<String, MlpPolicy>,
}

impl MockModelPort {
    pub fn new() -> Self {
        Self {
            policies: HashMap::new(),
        }
    }

    pub fn with_policy(mut self, stock: &str, policy: MlpPolicy) -> Self {
        self.policies.insert(stock.to_string(), policy);
        self
    }
}

impl ModelPort for MockModelPort {
    fn ensure_artifacts(&self, stock: &str) -> Result<(), TraderError> {
        if self.policies.contains_key(stock) {
            Ok(())
        } else {
            Err(TraderError::ArtifactMissing {
                path: PathBuf::from(format!("models/policy_{stock}.json")),
            })
        }
    }

    fn load_policy(&self, stock: &str) -> Result<MlpPolicy, TraderError> {
        self.ensure_artifacts(stock)?;
        Ok(self.policies[stock].clone())
    }

    fn load_normalization(&self, _stock: &str) -> Result<NormalizationStats, TraderError> {
        Ok(NormalizationStats::identity())
    }
}

/// Scriptable broker. Clones share state so tests can flip it while a trader
/// owns another handle.
#[derive(Clone, Default)]
pub struct MockBroker {
    pub state: Arc<Mutex<MockBrokerState>>,
}

#[derive(Default)]
pub struct MockBrokerState {
    pub market_closed: bool,
    pub unavailable: bool,
    pub cash: f64,
    pub price: f64,
    pub position: u64,
    pub next_id: u64,
    pub orders: Vec<Order>,
    pub cancel_calls: usize,
    pub close_calls: usize,
}

impl MockBroker {
    pub fn new(cash: f64, price: f64) -> Self {
        let broker = MockBroker::default();
        {
            let mut s = broker.state.lock().unwrap();
            s.cash = cash;
            s.price = price;
            s.next_id = 1;
        }
        broker
    }

    pub fn fill_all(&self) {
        let mut s = self.state.lock().unwrap();
        let price = s.price;
        for order in s.orders.iter_mut() {
            if order.status == OrderStatus::Open {
                order.status = OrderStatus::Filled;
                order.fill_price = Some(price);
            }
        }
    }

    pub fn submitted(&self) -> Vec<Order> {
        self.state.lock().unwrap().orders.clone()
    }

    fn check(&self) -> Result<(), TraderError> {
        if self.state.lock().unwrap().unavailable {
            Err(TraderError::BrokerUnavailable {
                reason: "connection refused".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl BrokerPort for MockBroker {
    fn is_market_open(&self) -> Result<bool, TraderError> {
        self.check()?;
        Ok(!self.state.lock().unwrap().market_closed)
    }

    fn open_orders(&self) -> Result<Vec<Order>, TraderError> {
        self.check()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .orders
            .iter()
            .filter(|o| !o.status.is_resolved())
            .cloned()
            .collect())
    }

    fn order_status(&mut self, order_id: u64) -> Result<OrderStatus, TraderError> {
        self.check()?;
        self.state
            .lock()
            .unwrap()
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .map(|o| o.status)
            .ok_or_else(|| TraderError::BrokerUnavailable {
                reason: format!("unknown order {order_id}"),
            })
    }

    fn cash(&self) -> Result<f64, TraderError> {
        self.check()?;
        Ok(self.state.lock().unwrap().cash)
    }

    fn latest_price(&self, _symbol: &str) -> Result<f64, TraderError> {
        self.check()?;
        Ok(self.state.lock().unwrap().price)
    }

    fn position(&self, symbol: &str) -> Result<Option<BrokerPosition>, TraderError> {
        self.check()?;
        let s = self.state.lock().unwrap();
        Ok((s.position > 0).then(|| BrokerPosition {
            symbol: symbol.to_string(),
            qty: s.position,
            avg_entry_price: s.price,
        }))
    }

    fn submit_market_order(
        &mut self,
        symbol: &str,
        qty: u64,
        side: OrderSide,
    ) -> Result<Order, TraderError> {
        self.check()?;
        let mut s = self.state.lock().unwrap();
        let order = Order {
            id: s.next_id,
            symbol: symbol.to_string(),
            side,
            qty,
            status: OrderStatus::Open,
            fill_price: None,
        };
        s.next_id += 1;
        s.orders.push(order.clone());
        Ok(order)
    }

    fn cancel_all_orders(&mut self) -> Result<usize, TraderError> {
        self.check()?;
        let mut s = self.state.lock().unwrap();
        s.cancel_calls += 1;
        let mut cancelled = 0;
        for order in s.orders.iter_mut() {
            if order.status == OrderStatus::Open {
                order.status = OrderStatus::Cancelled;
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }

    fn close_all_positions(&mut self) -> Result<usize, TraderError> {
        self.check()?;
        let mut s = self.state.lock().unwrap();
        s.close_calls += 1;
        let closed = usize::from(s.position > 0);
        s.position = 0;
        Ok(closed)
    }
}
