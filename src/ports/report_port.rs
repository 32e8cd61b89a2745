//! Report persistence port trait.

use std::path::PathBuf;

use crate::domain::error::TraderError;
use crate::domain::report::BacktestReport;

/// Port for persisting backtest reports. Writes replace any earlier report
/// for the same stock.
pub trait ReportPort {
    fn write(&self, report: &BacktestReport) -> Result<PathBuf, TraderError>;
}
