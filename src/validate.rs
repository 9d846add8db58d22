use serde::Serialize;

use crate::candles::Candle;
use crate::error::PipelineError;

/// A hole in the candle series between two adjacent stored timestamps.
#[derive(Debug, Clone, Serialize)]
pub struct Gap {
    pub previous_ts: i64,
    pub expected_ts: i64,
    pub actual_ts: i64,
    /// Number of missing intervals; -1 when the gap is not aligned to the
    /// interval boundary (weird data).
    pub missing: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    pub count: usize,
    pub first_ts: i64,
    pub last_ts: i64,
    pub gaps: Vec<Gap>,
}

/// Checks that candle timestamps are strictly increasing and spaced by
/// `expected_interval_millis`, reporting any gaps. Gap repair is the bar
/// source's job; this only detects.
pub fn validate_continuity(
    candle_series: &[Candle],
    expected_interval_millis: i64,
) -> Result<ValidationResult, PipelineError> {
    let mut result = ValidationResult::default();

    let mut previous_ts: Option<i64> = None;

    for candle in candle_series {
        let current_ts = candle.timestamp;
        result.count += 1;
        if result.count == 1 {
            result.first_ts = current_ts;
        }
        result.last_ts = current_ts;

        if let Some(prev) = previous_ts {
            if current_ts <= prev {
                return Err(PipelineError::InvalidInput(format!(
                    "non-increasing timestamp: prev={} current={}",
                    prev, current_ts
                )));
            }

            let expected_ts = prev + expected_interval_millis;
            if current_ts != expected_ts {
                let delta = current_ts - prev;
                let missing = if delta > expected_interval_millis
                    && delta % expected_interval_millis == 0
                {
                    delta / expected_interval_millis - 1
                } else {
                    -1
                };
                result.gaps.push(Gap {
                    previous_ts: prev,
                    expected_ts,
                    actual_ts: current_ts,
                    missing,
                });
            }
        }

        previous_ts = Some(current_ts);
    }

    Ok(result)
}
