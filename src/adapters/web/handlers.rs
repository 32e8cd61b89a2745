//! HTTP request handlers for web adapter.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Local;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::adapters::paper_broker::PaperBroker;
use crate::domain::backtest::{BacktestConfig, DecisionKind, run_backtest as run_backtest_pipeline};
use crate::domain::decision::ThresholdRule;
use crate::domain::live::{self, LiveControl, LiveTrader};
use crate::domain::report::BacktestReport;

use super::{AppState, LiveSession, WebError};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Default, Deserialize)]
pub struct BacktestParams {
    #[serde(default)]
    pub rule: bool,
}

pub async fn run_backtest(
    State(state): State<Arc<AppState>>,
    Path(stock): Path<String>,
    Query(params): Query<BacktestParams>,
) -> Result<Json<BacktestReport>, WebError> {
    let (start_date, end_date) = state.window.resolve(Local::now().date_naive());
    let config = BacktestConfig {
        start_date,
        end_date,
        env: state.env.clone(),
        decision: if params.rule {
            DecisionKind::Rule(ThresholdRule::default())
        } else {
            DecisionKind::Policy
        },
    };

    let run = run_backtest_pipeline(
        &stock,
        &state.registry,
        state.data_port.as_ref(),
        state.models.as_ref(),
        &config,
    )?;
    state.reports.write(&run.report)?;
    Ok(Json(run.report))
}

pub async fn start_live(
    State(state): State<Arc<AppState>>,
    Path(stock): Path<String>,
) -> Result<Json<Value>, WebError> {
    let mut session = state.live_session.lock().await;
    if let Some(running) = session.as_ref() {
        if !running.task.is_finished() {
            return Err(WebError::conflict(format!(
                "live trading already running for {}",
                running.stock
            )));
        }
    }

    let instrument = state.registry.resolve(&stock)?.clone();
    let mut config = state.live.clone();
    config.symbol = instrument.symbol.clone();

    let broker = PaperBroker::open(state.broker.clone(), Arc::clone(&state.quotes))?;
    let mut trader = LiveTrader::new(broker, config)?;
    let (control, rx) = watch::channel(LiveControl::Run);
    let task = tokio::spawn(async move { trader.run(rx).await });

    info!(stock = %instrument.name, symbol = %instrument.symbol, "live session started");
    *session = Some(LiveSession {
        stock: instrument.name.clone(),
        control,
        task,
    });

    Ok(Json(json!({
        "status": "started",
        "stock": instrument.name,
        "symbol": instrument.symbol,
    })))
}

async fn finish_session(
    state: &AppState,
    command: LiveControl,
) -> Result<Option<Value>, WebError> {
    let Some(session) = state.live_session.lock().await.take() else {
        return Ok(None);
    };
    // the loop may already have exited on its own
    let _ = session.control.send(command);
    let summary = session
        .task
        .await
        .map_err(|e| WebError::internal(format!("live task failed: {e}")))??;
    Ok(Some(json!({
        "status": "stopped",
        "stock": session.stock,
        "summary": summary,
    })))
}

pub async fn stop_live(State(state): State<Arc<AppState>>) -> Result<Json<Value>, WebError> {
    match finish_session(&state, LiveControl::Stop).await? {
        Some(body) => Ok(Json(body)),
        None => Err(WebError::conflict("no live session is running")),
    }
}

pub async fn force_exit(State(state): State<Arc<AppState>>) -> Result<Json<Value>, WebError> {
    if let Some(body) = finish_session(&state, LiveControl::ForceExit).await? {
        return Ok(Json(body));
    }
    let mut broker = PaperBroker::open(state.broker.clone(), Arc::clone(&state.quotes))?;
    let summary = live::force_exit(&mut broker)?;
    Ok(Json(json!({ "status": "exited", "summary": summary })))
}

pub async fn not_found() -> WebError {
    WebError::not_found("Page not found")
}
