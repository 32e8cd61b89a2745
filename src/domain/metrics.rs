//! Summary statistics over a completed episode.

use super::action::Action;
use super::report::BacktestReport;

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeMetrics {
    pub total_return: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
    /// Mean over standard deviation of step returns, not annualised.
    pub sharpe_ratio: f64,
    pub holds: usize,
    pub buys: usize,
    pub sells: usize,
}

impl EpisodeMetrics {
    pub fn compute(report: &BacktestReport) -> Self {
        let series = report.net_worth_series();

        let total_return = if report.initial_portfolio_value > 0.0 {
            (report.final_portfolio_value - report.initial_portfolio_value)
                / report.initial_portfolio_value
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(&series);
        let sharpe_ratio = compute_step_sharpe(&series);

        let mut holds = 0;
        let mut buys = 0;
        let mut sells = 0;
        for entry in &report.action_logs {
            match entry.action {
                Action::Hold => holds += 1,
                Action::Buy => buys += 1,
                Action::Sell => sells += 1,
            }
        }

        EpisodeMetrics {
            total_return,
            max_drawdown,
            max_drawdown_duration,
            sharpe_ratio,
            holds,
            buys,
            sells,
        }
    }
}

fn compute_drawdown(series: &[f64]) -> (f64, usize) {
    let Some(&first) = series.first() else {
        return (0.0, 0);
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0usize;
    let mut current_dd_duration = 0usize;

    for &value in series {
        if value > peak {
            peak = value;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            let dd = (peak - value) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
            if dd > 0.0 {
                current_dd_duration += 1;
                max_dd_duration = max_dd_duration.max(current_dd_duration);
            }
        }
    }

    (max_dd, max_dd_duration)
}

fn compute_step_sharpe(series: &[f64]) -> f64 {
    if series.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = series
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    if stddev > 0.0 { mean / stddev } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::ActionLogEntry;

    fn report(entries: &[(Action, f64)]) -> BacktestReport {
        let logs = entries
            .iter()
            .map(|&(action, net_worth)| ActionLogEntry {
                action,
                reward: 0.0,
                net_worth,
            })
            .collect();
        BacktestReport::from_logs("test", logs).unwrap()
    }

    #[test]
    fn total_return_from_report_values() {
        let m = EpisodeMetrics::compute(&report(&[
            (Action::Hold, 10_000.0),
            (Action::Hold, 11_000.0),
        ]));
        assert!((m.total_return - 0.10).abs() < 1e-9);
    }

    #[test]
    fn action_counts() {
        let m = EpisodeMetrics::compute(&report(&[
            (Action::Buy, 100.0),
            (Action::Hold, 100.0),
            (Action::Hold, 100.0),
            (Action::Sell, 100.0),
        ]));
        assert_eq!((m.holds, m.buys, m.sells), (2, 1, 1));
    }

    #[test]
    fn max_drawdown() {
        let (dd, _) = compute_drawdown(&[100.0, 110.0, 90.0, 95.0, 80.0, 100.0]);
        assert!((dd - (110.0 - 80.0) / 110.0).abs() < 1e-9);
    }

    #[test]
    fn max_drawdown_duration() {
        let (_, duration) = compute_drawdown(&[100.0, 110.0, 100.0, 90.0, 85.0, 95.0]);
        assert_eq!(duration, 4);
    }

    #[test]
    fn flat_series_has_no_drawdown_or_sharpe() {
        let series = [100.0; 5];
        assert_eq!(compute_drawdown(&series), (0.0, 0));
        assert!(compute_step_sharpe(&series).abs() < f64::EPSILON);
    }

    #[test]
    fn rising_series_has_positive_sharpe() {
        let series: Vec<f64> = (0..20).map(|i| 100.0 * (1.0 + 0.001 * i as f64 * i as f64)).collect();
        assert!(compute_step_sharpe(&series) > 0.0);
    }

    #[test]
    fn single_point_sharpe_is_zero() {
        assert!(compute_step_sharpe(&[100.0]).abs() < f64::EPSILON);
    }
}
