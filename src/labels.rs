use serde::{Deserialize, Serialize};

use crate::candles::Candle;
use crate::dataset::Class;
use crate::error::PipelineError;

/// Forward-return label for one candle: the class, the realized forward log
/// return and the deadband it was compared against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelRow {
    pub exchange: String,
    pub symbol: String,
    pub timeframe: String,
    pub timestamp: i64,

    pub forward_return: f64,
    pub threshold_b: f64,
    pub label: Class,
}

/// Labels every candle except the last (no future candle to measure against),
/// yielding `len - 1` rows: UP above `threshold_b`, DOWN below `-threshold_b`,
/// NO_TRADE inside the deadband.
pub fn build_forward_return_labels(
    candle_series: &[Candle],
    threshold_b: f64,
) -> Result<Vec<LabelRow>, PipelineError> {
    if threshold_b <= 0.0 {
        return Err(PipelineError::InvalidConfig(
            "threshold_b must be > 0".to_string(),
        ));
    }
    if candle_series.len() < 2 {
        return Err(PipelineError::InvalidInput(
            "need at least 2 candles to build labels".to_string(),
        ));
    }

    let mut rows = Vec::with_capacity(candle_series.len() - 1);

    for window in candle_series.windows(2) {
        let current = &window[0];
        let next = &window[1];

        if current.close <= 0.0 || next.close <= 0.0 {
            return Err(PipelineError::InvalidInput(format!(
                "non-positive close at timestamp={}",
                current.timestamp
            )));
        }

        let forward_return = (next.close / current.close).ln();

        let label = if forward_return > threshold_b {
            Class::Up
        } else if forward_return < -threshold_b {
            Class::Down
        } else {
            Class::NoTrade
        };

        rows.push(LabelRow {
            exchange: current.exchange.clone(),
            symbol: current.symbol.clone(),
            timeframe: current.timeframe.clone(),
            timestamp: current.timestamp,
            forward_return,
            threshold_b,
            label,
        });
    }

    Ok(rows)
}
