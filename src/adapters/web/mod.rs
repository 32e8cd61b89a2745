//! Web server adapter.
//!
//! Thin axum JSON wrapper over the same backtest pipeline and live loop the
//! CLI drives. One live session at a time.

mod error;
mod handlers;

pub use error::WebError;
pub use handlers::*;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::adapters::paper_broker::BrokerConfig;
use crate::domain::backtest::DataWindow;
use crate::domain::environment::EnvConfig;
use crate::domain::error::TraderError;
use crate::domain::instruments::InstrumentRegistry;
use crate::domain::live::{LiveConfig, LiveControl, LiveSummary};
use crate::ports::broker_port::QuoteSource;
use crate::ports::data_port::DataPort;
use crate::ports::model_port::ModelPort;
use crate::ports::report_port::ReportPort;

pub struct AppState {
    pub registry: InstrumentRegistry,
    pub data_port: Arc<dyn DataPort + Send + Sync>,
    pub models: Arc<dyn ModelPort + Send + Sync>,
    pub reports: Arc<dyn ReportPort + Send + Sync>,
    pub quotes: Arc<dyn QuoteSource + Send + Sync>,
    pub window: DataWindow,
    pub env: EnvConfig,
    /// Template for live sessions; the symbol is filled in per request.
    pub live: LiveConfig,
    pub broker: BrokerConfig,
    pub live_session: Mutex<Option<LiveSession>>,
}

pub struct LiveSession {
    pub stock: String,
    pub control: watch::Sender<LiveControl>,
    pub task: JoinHandle<Result<LiveSummary, TraderError>>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/backtest/{stock}", post(handlers::run_backtest))
        .route("/live/{stock}/start", post(handlers::start_live))
        .route("/live/stop", post(handlers::stop_live))
        .route("/force-exit", post(handlers::force_exit))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}
