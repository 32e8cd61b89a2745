//! Execution loop: drives one episode to completion and builds the report.
//!
//! The loop is bounded by the environment's `max_steps`; the net worth for
//! each entry is taken from the step's info payload, never re-read from the
//! environment afterwards. Any error from the decision source or the
//! environment aborts the run without a report.

use tracing::{debug, info};

use super::decision::DecisionSource;
use super::environment::Environment;
use super::error::TraderError;
use super::report::{ActionLogEntry, BacktestReport};

pub fn run_episode<E: Environment + ?Sized>(
    stock: &str,
    env: &mut E,
    source: &dyn DecisionSource,
) -> Result<BacktestReport, TraderError> {
    let max_steps = env.max_steps();
    info!(stock, source = source.name(), max_steps, "starting trading simulation");

    let mut observation = env.reset();
    let mut action_logs = Vec::with_capacity(max_steps);

    for step in 1..=max_steps {
        let action = source.predict(&observation)?;
        let outcome = env.step(action)?;

        debug!(
            stock,
            step,
            action = %action,
            reward = outcome.reward,
            net_worth = outcome.info.net_worth,
            "step"
        );
        action_logs.push(ActionLogEntry {
            action,
            reward: outcome.reward,
            net_worth: outcome.info.net_worth,
        });

        if outcome.done {
            let report = BacktestReport::from_logs(stock, action_logs)?;
            info!(
                stock,
                steps = report.steps(),
                final_value = format!("{:.2}", report.final_portfolio_value),
                return_pct = format!("{:.2}", report.total_return_percentage),
                "trading simulation completed"
            );
            return Ok(report);
        }
        observation = outcome.observation;
    }

    Err(TraderError::InvariantViolation {
        step: action_logs.len(),
        reason: format!("episode did not finish within {max_steps} steps"),
    })
}
