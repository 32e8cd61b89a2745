//! JSON report adapter: one `backtest_results_<stock>.json` per stock.

use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::domain::error::TraderError;
use crate::domain::report::BacktestReport;
use crate::ports::report_port::ReportPort;

pub struct JsonReportAdapter {
    dir: PathBuf,
}

impl JsonReportAdapter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn report_path(&self, stock: &str) -> PathBuf {
        self.dir.join(format!("backtest_results_{stock}.json"))
    }

    pub fn load(&self, stock: &str) -> Result<BacktestReport, TraderError> {
        let path = self.report_path(stock);
        let raw = fs::read_to_string(&path)?;
        serde_json::from_str(&raw).map_err(|e| TraderError::Report {
            reason: format!("{}: {e}", path.display()),
        })
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, report: &BacktestReport) -> Result<PathBuf, TraderError> {
        let json = serde_json::to_string_pretty(report).map_err(|e| TraderError::Report {
            reason: e.to_string(),
        })?;

        fs::create_dir_all(&self.dir)?;
        let path = self.report_path(&report.stock);
        fs::write(&path, json)?;
        info!(path = %path.display(), "backtest results saved");
        Ok(path)
    }
}
