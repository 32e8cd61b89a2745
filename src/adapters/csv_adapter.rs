//! CSV feature-row adapter.
//!
//! Reads `<dir>/<SYMBOL>.csv` files whose rows already carry the indicator
//! columns. Header names are matched case-insensitively.

use crate::domain::bar::Bar;
use crate::domain::error::TraderError;
use crate::ports::broker_port::QuoteSource;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

const TIMESTAMP_COLUMNS: [&str; 2] = ["timestamp", "date"];

const VALUE_COLUMNS: [&str; 14] = [
    "open",
    "high",
    "low",
    "close",
    "volume",
    "rsi",
    "macd",
    "macd_hist",
    "stochastic_k",
    "stochastic_d",
    "upper_band",
    "lower_band",
    "cci",
    "obv",
];

const SMA_COLUMN: &str = "sma_10";

pub struct CsvAdapter {
    base_path: PathBuf,
}

struct Columns {
    timestamp: usize,
    values: [usize; VALUE_COLUMNS.len()],
    sma: Option<usize>,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }

    fn resolve_columns(symbol: &str, headers: &csv::StringRecord) -> Result<Columns, TraderError> {
        let index: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_lowercase(), i))
            .collect();

        let missing = |name: &str| TraderError::DataUnavailable {
            code: symbol.to_string(),
            reason: format!("missing column '{name}'"),
        };

        let timestamp = TIMESTAMP_COLUMNS
            .iter()
            .find_map(|name| index.get(*name).copied())
            .ok_or_else(|| missing("timestamp"))?;

        let mut values = [0usize; VALUE_COLUMNS.len()];
        for (slot, name) in values.iter_mut().zip(VALUE_COLUMNS) {
            *slot = *index.get(name).ok_or_else(|| missing(name))?;
        }

        Ok(Columns {
            timestamp,
            values,
            sma: index.get(SMA_COLUMN).copied(),
        })
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` with or without an offset, and
/// bare dates. Offset timestamps are converted to UTC.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Empty, NaN, infinite and unparsable cells all count as missing.
fn parse_value(s: Option<&str>) -> Option<f64> {
    s.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, TraderError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| TraderError::DataUnavailable {
            code: symbol.to_string(),
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| TraderError::DataUnavailable {
                code: symbol.to_string(),
                reason: format!("CSV header error: {e}"),
            })?
            .clone();
        let columns = Self::resolve_columns(symbol, &headers)?;

        let mut bars = Vec::new();
        let mut in_window = 0usize;
        let mut dropped = 0usize;

        for (row, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| TraderError::DataUnavailable {
                code: symbol.to_string(),
                reason: format!("CSV parse error: {e}"),
            })?;

            let raw_ts = record.get(columns.timestamp).unwrap_or_default();
            let timestamp =
                parse_timestamp(raw_ts).ok_or_else(|| TraderError::DataUnavailable {
                    code: symbol.to_string(),
                    reason: format!("row {}: invalid timestamp '{raw_ts}'", row + 1),
                })?;

            let day = timestamp.date();
            if day < start || day > end {
                continue;
            }
            in_window += 1;

            let mut v = [0.0_f64; VALUE_COLUMNS.len()];
            let complete = v
                .iter_mut()
                .zip(columns.values)
                .all(|(slot, col)| match parse_value(record.get(col)) {
                    Some(x) => {
                        *slot = x;
                        true
                    }
                    None => false,
                });
            let sma_10 = match columns.sma {
                Some(col) => match parse_value(record.get(col)) {
                    Some(x) => Some(x),
                    None => {
                        dropped += 1;
                        continue;
                    }
                },
                None => None,
            };
            if !complete {
                dropped += 1;
                continue;
            }

            let [open, high, low, close, volume, rsi, macd, macd_hist, stochastic_k, stochastic_d, upper_band, lower_band, cci, obv] =
                v;
            bars.push(Bar {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
                rsi,
                macd,
                macd_hist,
                stochastic_k,
                stochastic_d,
                upper_band,
                lower_band,
                cci,
                obv,
                sma_10,
            });
        }

        if in_window == 0 {
            return Err(TraderError::DataUnavailable {
                code: symbol.to_string(),
                reason: format!("no rows between {start} and {end}"),
            });
        }
        if bars.is_empty() {
            return Err(TraderError::IndicatorComputation {
                code: symbol.to_string(),
                dropped,
            });
        }
        if dropped > 0 {
            warn!(symbol, dropped, kept = bars.len(), "dropped rows with missing values");
        }
        if columns.sma.is_none() {
            warn!(symbol, "no sma_10 column, every step falls back to the trade price");
        }

        bars.sort_by_key(|b| b.timestamp);
        debug!(symbol, bars = bars.len(), "loaded feature rows");
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, TraderError> {
        let entries = fs::read_dir(&self.base_path)?;

        let mut symbols = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("csv") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    symbols.push(stem.to_string());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

/// Close of the newest complete row in the file.
impl QuoteSource for CsvAdapter {
    fn latest_price(&self, symbol: &str) -> Result<f64, TraderError> {
        let bars = self.fetch_bars(symbol, NaiveDate::MIN, NaiveDate::MAX)?;
        bars.last()
            .map(|b| b.close)
            .ok_or_else(|| TraderError::DataUnavailable {
                code: symbol.to_string(),
                reason: "no rows".into(),
            })
    }
}
