use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// One OHLCV bar for a (venue, instrument, timeframe) partition.
///
/// Ordered strictly by `timestamp` (open time, ms UTC) within a partition;
/// immutable once `is_final` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub exchange: String,
    pub symbol: String,
    pub timeframe: String,

    /// Open time in ms (UTC).
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,

    /// Close time in ms, 0 if unknown.
    pub close_time: i64,
    pub is_final: bool,
}

const MILLIS_PER_MINUTE: i64 = 60 * 1000;
const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;
const MILLIS_PER_YEAR: i64 = 365 * 24 * MILLIS_PER_HOUR;

/// Interval length in milliseconds for a timeframe string like "4h".
pub fn timeframe_to_millis(timeframe: &str) -> Result<i64, PipelineError> {
    match timeframe.trim().to_lowercase().as_str() {
        "1m" => Ok(MILLIS_PER_MINUTE),
        "3m" => Ok(3 * MILLIS_PER_MINUTE),
        "5m" => Ok(5 * MILLIS_PER_MINUTE),
        "15m" => Ok(15 * MILLIS_PER_MINUTE),
        "30m" => Ok(30 * MILLIS_PER_MINUTE),
        "1h" => Ok(MILLIS_PER_HOUR),
        "2h" => Ok(2 * MILLIS_PER_HOUR),
        "4h" => Ok(4 * MILLIS_PER_HOUR),
        "6h" => Ok(6 * MILLIS_PER_HOUR),
        "8h" => Ok(8 * MILLIS_PER_HOUR),
        "12h" => Ok(12 * MILLIS_PER_HOUR),
        "1d" => Ok(24 * MILLIS_PER_HOUR),
        other => Err(PipelineError::InvalidConfig(format!(
            "unsupported timeframe: {:?}",
            other
        ))),
    }
}

/// Number of timeframe periods in a 365-day year, used to annualize Sharpe.
/// For 4h bars this is 2190.
pub fn periods_per_year(timeframe: &str) -> Result<f64, PipelineError> {
    let interval = timeframe_to_millis(timeframe)?;
    Ok(MILLIS_PER_YEAR as f64 / interval as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_to_millis() {
        assert_eq!(timeframe_to_millis("1m").unwrap(), 60_000);
        assert_eq!(timeframe_to_millis("4h").unwrap(), 4 * 3_600_000);
        assert_eq!(timeframe_to_millis(" 1D ").unwrap(), 24 * 3_600_000);
        assert!(timeframe_to_millis("7h").is_err());
    }

    #[test]
    fn test_periods_per_year_4h() {
        let p = periods_per_year("4h").unwrap();
        assert!((p - 2190.0).abs() < 1e-9);
    }
}
