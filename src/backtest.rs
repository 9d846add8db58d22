use std::fmt::Write as FmtWrite;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::dataset::DatasetRow;
use crate::error::PipelineError;
use crate::io::write_file;
use crate::walkforward::PredictionRow;

/// One out-of-sample prediction joined with the realized forward log return
/// for its bar, when known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionWithReturn {
    pub timestamp: i64,

    pub p_up: f64,
    pub p_down: f64,

    pub predicted_label: String,
    pub actual_label: String,

    /// Log return from t to t+1; `None` when no future bar was observed.
    pub forward_log_return: Option<f64>,
}

/// Left-joins predictions with the dataset's realized forward returns on
/// timestamp. Both inputs are timestamp-ordered.
pub fn attach_forward_returns(
    predictions: &[PredictionRow],
    dataset: &[DatasetRow],
) -> Vec<PredictionWithReturn> {
    let mut rows = Vec::with_capacity(predictions.len());
    let mut dataset_iter = dataset.iter().peekable();

    for p in predictions {
        while let Some(row) = dataset_iter.peek() {
            if row.timestamp < p.timestamp {
                dataset_iter.next();
            } else {
                break;
            }
        }
        let forward_log_return = match dataset_iter.peek() {
            Some(row) if row.timestamp == p.timestamp => Some(row.forward_return),
            _ => None,
        };

        rows.push(PredictionWithReturn {
            timestamp: p.timestamp,
            p_up: p.p_up,
            p_down: p.p_down,
            predicted_label: p.predicted.to_string(),
            actual_label: p.actual.to_string(),
            forward_log_return,
        });
    }

    rows
}

#[derive(Debug, Clone)]
pub struct PaperConfig {
    /// Confidence threshold, exclusive bounds (0, 1).
    pub threshold: f64,
    /// Per-side fee as a decimal, e.g. 0.0004 = 4 bps.
    pub fee_per_side: f64,
    /// Round-trip slippage as a decimal.
    pub slippage: f64,
    /// Timeframe periods in a year, used to annualize Sharpe.
    pub periods_per_year: f64,
    /// Equity CSV destination; `None` disables the export.
    pub equity_csv_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaperResult {
    pub threshold: f64,

    pub predictions: usize,
    pub trades: usize,
    pub coverage: f64,

    /// `end_equity - 1`.
    pub total_return: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,

    pub end_equity: f64,
}

/// One step of the equity curve; the curve starts at equity 1.0 before the
/// first prediction.
#[derive(Debug, Clone, Serialize)]
pub struct EquityPoint {
    pub timestamp: i64,
    pub equity: f64,
    pub traded: bool,
    pub side: String,
    pub trade_return: f64,
}

/// Replays out-of-sample predictions against realized forward returns.
///
/// A trade is taken only when confidence (max of the direction
/// probabilities, ties defaulting to the UP side) reaches the threshold and
/// the forward return is known. Equity compounds multiplicatively and is
/// floored at 0.
pub fn run_paper_backtest(
    rows: &[PredictionWithReturn],
    config: &PaperConfig,
) -> Result<PaperResult, PipelineError> {
    if config.threshold <= 0.0 || config.threshold >= 1.0 {
        return Err(PipelineError::InvalidConfig(
            "threshold must be in (0, 1)".to_string(),
        ));
    }
    if config.fee_per_side < 0.0 || config.slippage < 0.0 {
        return Err(PipelineError::InvalidConfig(
            "fee/slippage must be >= 0".to_string(),
        ));
    }
    if rows.is_empty() {
        return Err(PipelineError::InvalidInput("no predictions".to_string()));
    }

    let mut rows = rows.to_vec();
    rows.sort_by_key(|r| r.timestamp);

    let mut equity = 1.0;
    let mut peak = 1.0;
    let mut max_drawdown = 0.0;
    let mut trades = 0usize;
    let mut strategy_returns = Vec::with_capacity(rows.len());

    // Entry + exit fees, slippage treated as round-trip.
    let round_trip_cost = 2.0 * config.fee_per_side + config.slippage;

    let mut curve = Vec::with_capacity(rows.len() + 1);
    curve.push(EquityPoint {
        timestamp: rows[0].timestamp,
        equity,
        traded: false,
        side: "NONE".to_string(),
        trade_return: 0.0,
    });

    for row in &rows {
        let mut confidence = row.p_up;
        let mut side = "UP";
        if row.p_down > confidence {
            confidence = row.p_down;
            side = "DOWN";
        }

        let mut traded = false;
        let mut trade_return = 0.0;
        let mut period_return = 0.0;

        if confidence >= config.threshold {
            if let Some(forward_log_return) = row.forward_log_return {
                traded = true;
                trades += 1;

                let forward_simple = forward_log_return.exp() - 1.0;
                let direction = if side == "DOWN" { -1.0 } else { 1.0 };

                trade_return = direction * forward_simple - round_trip_cost;
                period_return = trade_return;
            }
        }

        equity *= 1.0 + period_return;
        if equity < 0.0 {
            equity = 0.0;
        }

        if equity > peak {
            peak = equity;
        }
        let drawdown = if peak > 0.0 { (peak - equity) / peak } else { 0.0 };
        if drawdown > max_drawdown {
            max_drawdown = drawdown;
        }

        strategy_returns.push(period_return);
        curve.push(EquityPoint {
            timestamp: row.timestamp,
            equity,
            traded,
            side: side.to_string(),
            trade_return,
        });
    }

    let sharpe = annualized_sharpe(&strategy_returns, config.periods_per_year);

    let result = PaperResult {
        threshold: config.threshold,
        predictions: rows.len(),
        trades,
        coverage: trades as f64 / rows.len() as f64,
        end_equity: equity,
        total_return: equity - 1.0,
        max_drawdown,
        sharpe,
    };

    if let Some(path) = &config.equity_csv_path {
        write_equity_csv(path, &curve)?;
        info!("equity curve written to {}", path.display());
    }

    Ok(result)
}

/// Mean over population std, scaled by sqrt(periods per year). Zero when
/// fewer than 2 returns exist or the series has no variance.
pub fn annualized_sharpe(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    if std == 0.0 {
        return 0.0;
    }
    (mean / std) * periods_per_year.sqrt()
}

/// Writes the equity curve as a delimited table with a header row and
/// 10-decimal floating columns.
pub fn write_equity_csv(path: &Path, points: &[EquityPoint]) -> Result<(), PipelineError> {
    let mut content = String::new();
    content.push_str("timestamp,equity,traded,side,trade_return\n");
    for p in points {
        writeln!(
            &mut content,
            "{},{:.10},{},{},{:.10}",
            p.timestamp,
            p.equity,
            p.traded as u8,
            p.side,
            p.trade_return
        )
        .expect("writing to String cannot fail");
    }
    write_file(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(
        timestamp: i64,
        p_up: f64,
        p_down: f64,
        forward_log_return: Option<f64>,
    ) -> PredictionWithReturn {
        PredictionWithReturn {
            timestamp,
            p_up,
            p_down,
            predicted_label: "UP".to_string(),
            actual_label: "UP".to_string(),
            forward_log_return,
        }
    }

    fn config(threshold: f64, fee: f64) -> PaperConfig {
        PaperConfig {
            threshold,
            fee_per_side: fee,
            slippage: 0.0,
            periods_per_year: 2190.0,
            equity_csv_path: None,
        }
    }

    #[test]
    fn test_config_validation() {
        let rows = vec![row(0, 0.7, 0.3, Some(0.01))];
        assert!(run_paper_backtest(&rows, &config(0.0, 0.0)).is_err());
        assert!(run_paper_backtest(&rows, &config(1.0, 0.0)).is_err());
        assert!(run_paper_backtest(&rows, &config(0.5, -0.1)).is_err());
    }

    #[test]
    fn test_confident_long_and_skipped_tie() {
        let rows = vec![
            row(0, 0.7, 0.3, Some(1.01f64.ln())),
            // Tie defaults to the UP side but confidence 0.5 < 0.6.
            row(1, 0.5, 0.5, Some(0.05)),
        ];
        let result = run_paper_backtest(&rows, &config(0.6, 0.0004)).unwrap();

        assert_eq!(result.trades, 1);
        assert!((result.coverage - 0.5).abs() < 1e-12);
        // trade return = 0.01 - 2*0.0004 = 0.0092
        assert!((result.end_equity - 1.0092).abs() < 1e-9);
        assert!((result.total_return - 0.0092).abs() < 1e-9);
    }

    #[test]
    fn test_short_side_profits_from_down_move() {
        let rows = vec![row(0, 0.2, 0.8, Some(0.98f64.ln()))];
        let result = run_paper_backtest(&rows, &config(0.6, 0.0)).unwrap();
        // Short on a -2% move earns +2% (simple-return space).
        assert!((result.end_equity - (1.0 + (1.0 - 0.98))).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_forward_return_means_no_trade() {
        let rows = vec![row(0, 0.9, 0.1, None)];
        let result = run_paper_backtest(&rows, &config(0.6, 0.0)).unwrap();
        assert_eq!(result.trades, 0);
        assert_eq!(result.end_equity, 1.0);
        assert_eq!(result.max_drawdown, 0.0);
    }

    #[test]
    fn test_max_drawdown_tracks_peak() {
        // Up 10%, then down 20%, then up 5%.
        let rows = vec![
            row(0, 0.9, 0.1, Some(1.10f64.ln())),
            row(1, 0.9, 0.1, Some(0.80f64.ln())),
            row(2, 0.9, 0.1, Some(1.05f64.ln())),
        ];
        let result = run_paper_backtest(&rows, &config(0.6, 0.0)).unwrap();

        // Peak after step 1 is 1.1; trough is 1.1 * 0.8 = 0.88.
        let expected_dd = (1.1 - 0.88) / 1.1;
        assert!((result.max_drawdown - expected_dd).abs() < 1e-9);
    }

    #[test]
    fn test_zero_variance_returns_give_zero_sharpe() {
        assert_eq!(annualized_sharpe(&[0.01], 2190.0), 0.0);
        assert_eq!(annualized_sharpe(&[0.01, 0.01, 0.01], 2190.0), 0.0);
        assert!(annualized_sharpe(&[0.01, 0.02], 2190.0) > 0.0);
    }

    #[test]
    fn test_equity_floor_at_zero() {
        let rows = vec![row(0, 0.9, 0.1, Some(0.0001f64.ln()))];
        // Forward simple return ~ -0.9999, plus costs pushes below -1.
        let mut cfg = config(0.6, 0.0);
        cfg.slippage = 0.5;
        let result = run_paper_backtest(&rows, &cfg).unwrap();
        assert_eq!(result.end_equity, 0.0);
    }

    #[test]
    fn test_equity_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/equity.csv");

        let rows = vec![row(0, 0.7, 0.3, Some(1.01f64.ln()))];
        let mut cfg = config(0.6, 0.0);
        cfg.equity_csv_path = Some(path.clone());
        run_paper_backtest(&rows, &cfg).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "timestamp,equity,traded,side,trade_return"
        );
        // Initial point before the first row, then the traded step.
        assert_eq!(lines.next().unwrap(), "0,1.0000000000,0,NONE,0.0000000000");
        let traded = lines.next().unwrap();
        assert!(traded.starts_with("0,1.0100000000,1,UP,"));
    }
}
