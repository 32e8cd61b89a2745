//! Configuration validation.
//!
//! Runs over the whole INI before any data or artifact access so a bad value
//! fails fast with the offending section and key.

use crate::domain::error::TraderError;
use crate::domain::instruments::InstrumentRegistry;
use crate::ports::config_port::ConfigPort;
use chrono::{NaiveDate, NaiveTime};
use tracing::warn;

const KNOWN_SECTIONS: [&str; 9] = [
    "default",
    "instruments",
    "data",
    "environment",
    "models",
    "report",
    "live",
    "broker",
    "web",
];

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_instruments(config)?;
    validate_dates(config)?;
    validate_lookback(config)?;
    validate_environment(config)?;
    validate_live(config)?;
    validate_broker(config)?;
    warn_unknown_sections(config);
    Ok(())
}

/// Unknown sections are usually typos; they are reported but not fatal.
fn warn_unknown_sections(config: &dyn ConfigPort) {
    for section in config.sections() {
        if !KNOWN_SECTIONS.contains(&section.as_str()) {
            warn!(section = %section, "ignoring unknown config section");
        }
    }
}

/// Parsed instrument mapping from `[instruments] supported`.
pub fn parse_instruments(config: &dyn ConfigPort) -> Result<InstrumentRegistry, TraderError> {
    let raw = config
        .get_string("instruments", "supported")
        .ok_or_else(|| TraderError::ConfigMissing {
            section: "instruments".to_string(),
            key: "supported".to_string(),
        })?;
    InstrumentRegistry::parse(&raw).map_err(|e| TraderError::ConfigInvalid {
        section: "instruments".to_string(),
        key: "supported".to_string(),
        reason: e.to_string(),
    })
}

/// Reads an optional number. Present but unparsable is an error rather than
/// a silent fallback to the default.
pub fn read_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, TraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid(section, key, &format!("'{s}' is not a number"))),
    }
}

pub fn read_u64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: u64,
) -> Result<u64, TraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| invalid(section, key, &format!("'{s}' is not a non-negative integer"))),
    }
}

pub fn read_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, TraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                invalid(
                    section,
                    key,
                    &format!("invalid {key} format, expected YYYY-MM-DD"),
                )
            }),
    }
}

pub fn read_time(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveTime>, TraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(Some)
            .map_err(|_| invalid(section, key, &format!("invalid {key} format, expected HH:MM"))),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> TraderError {
    TraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_instruments(config: &dyn ConfigPort) -> Result<(), TraderError> {
    parse_instruments(config).map(|_| ())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let start = read_date(config, "data", "start_date")?;
    let end = read_date(config, "data", "end_date")?;
    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(invalid(
                "data",
                "start_date",
                "start_date must be before end_date",
            ));
        }
    }
    Ok(())
}

fn validate_lookback(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if read_u64(config, "data", "lookback_days", 90)? == 0 {
        return Err(invalid(
            "data",
            "lookback_days",
            "lookback_days must be at least 1",
        ));
    }
    Ok(())
}

fn validate_environment(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let balance = read_f64(config, "environment", "initial_balance", 10_000.0)?;
    if !(balance.is_finite() && balance > 0.0) {
        return Err(invalid(
            "environment",
            "initial_balance",
            "initial_balance must be positive",
        ));
    }
    let fee = read_f64(config, "environment", "transaction_fee", 0.001)?;
    if !(0.0..1.0).contains(&fee) {
        return Err(invalid(
            "environment",
            "transaction_fee",
            "transaction_fee must be in [0, 1)",
        ));
    }
    for key in ["buy_fraction", "sell_fraction"] {
        let fraction = read_f64(config, "environment", key, 0.5)?;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(invalid(
                "environment",
                key,
                &format!("{key} must be in (0, 1]"),
            ));
        }
    }
    let threshold = read_f64(config, "environment", "profit_threshold", 0.02)?;
    if !(threshold.is_finite() && threshold >= 0.0) {
        return Err(invalid(
            "environment",
            "profit_threshold",
            "profit_threshold must be non-negative",
        ));
    }
    Ok(())
}

fn validate_live(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if read_u64(config, "live", "interval_secs", 60)? == 0 {
        return Err(invalid(
            "live",
            "interval_secs",
            "interval_secs must be at least 1",
        ));
    }
    let risk = read_f64(config, "live", "risk_fraction", 0.05)?;
    if !(risk > 0.0 && risk <= 1.0) {
        return Err(invalid("live", "risk_fraction", "risk_fraction must be in (0, 1]"));
    }
    if let Some(side) = config.get_string("live", "side") {
        side.parse::<crate::ports::broker_port::OrderSide>()
            .map_err(|reason| invalid("live", "side", &reason))?;
    }
    Ok(())
}

fn validate_broker(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let cash = read_f64(config, "broker", "starting_cash", 100_000.0)?;
    if !(cash.is_finite() && cash >= 0.0) {
        return Err(invalid(
            "broker",
            "starting_cash",
            "starting_cash must be non-negative",
        ));
    }
    let open = read_time(config, "broker", "session_open")?;
    let close = read_time(config, "broker", "session_close")?;
    match (open, close) {
        (None, None) => Ok(()),
        (Some(open), Some(close)) if open < close => Ok(()),
        (Some(_), Some(_)) => Err(invalid(
            "broker",
            "session_open",
            "session_open must be before session_close",
        )),
        (Some(_), None) => Err(TraderError::ConfigMissing {
            section: "broker".to_string(),
            key: "session_close".to_string(),
        }),
        (None, Some(_)) => Err(TraderError::ConfigMissing {
            section: "broker".to_string(),
            key: "session_open".to_string(),
        }),
    }
}
