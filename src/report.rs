use std::path::Path;

use serde::Serialize;

use crate::backtest::PaperResult;
use crate::dataset::Class;
use crate::error::PipelineError;
use crate::io::write_file;
use crate::metrics::ConfusionMatrix;

/// Per-predictor evaluation summary for the run report.
#[derive(Debug, Clone, Serialize)]
pub struct PredictorSummary {
    pub name: String,
    pub accuracy: f64,
    pub up_precision: f64,
    pub up_recall: f64,
    pub down_precision: f64,
    pub down_recall: f64,
    pub matrix: [[u64; 3]; 3],
}

impl PredictorSummary {
    pub fn from_matrix(name: &str, cm: &ConfusionMatrix) -> PredictorSummary {
        let (up_precision, up_recall) = cm.precision_recall(Class::Up);
        let (down_precision, down_recall) = cm.precision_recall(Class::Down);
        PredictorSummary {
            name: name.to_string(),
            accuracy: cm.accuracy(),
            up_precision,
            up_recall,
            down_precision,
            down_recall,
            matrix: cm.m,
        }
    }
}

/// Full run report: evaluation summaries plus per-threshold backtest
/// results, serialized as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub symbol: String,
    pub timeframe: String,
    pub model_name: String,
    pub dataset_rows: usize,

    pub predictors: Vec<PredictorSummary>,
    pub backtests: Vec<PaperResult>,
}

pub fn write_report<P: AsRef<Path>>(report: &RunReport, path: P) -> Result<(), PipelineError> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| PipelineError::Parse(format!("report serialization: {}", e)))?;
    write_file(path, json)?;
    Ok(())
}
