use serde::{Deserialize, Serialize};

use crate::candles::Candle;
use crate::error::PipelineError;

/// Per-candle feature vector. Lookback-dependent fields stay `None` until
/// their window is satisfied so that downstream joins can reject incomplete
/// rows explicitly instead of training on sentinel zeros.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRow {
    pub exchange: String,
    pub symbol: String,
    pub timeframe: String,
    pub timestamp: i64,

    /// 1-bar log return, `None` at index 0.
    pub ret_1: Option<f64>,
    /// 20-bar rolling population std of returns.
    pub vol_20: Option<f64>,
    /// Sum of the trailing 6 log returns.
    pub mom_6: Option<f64>,
    pub ema_10: Option<f64>,
    pub ema_30: Option<f64>,
    /// EMA(10) - EMA(30), defined from the first candle onward.
    pub ema_spread: Option<f64>,
    /// (high - low) / close.
    pub range_hl: Option<f64>,
    /// (close - open) / open.
    pub range_co: Option<f64>,
    /// Log volume change; needs both current and previous volume > 0.
    pub vol_chg: Option<f64>,
}

pub fn log_return(current_close: f64, previous_close: f64) -> f64 {
    (current_close / previous_close).ln()
}

pub fn alpha_from_period(period: usize) -> f64 {
    2.0 / (period as f64 + 1.0)
}

pub fn ema_step(previous_ema: f64, price: f64, alpha: f64) -> f64 {
    alpha * price + (1.0 - alpha) * previous_ema
}

/// Population standard deviation of `values[i - window + 1 ..= i]`.
pub fn rolling_std(values: &[f64], i: usize, window: usize) -> f64 {
    let start = i + 1 - window;
    let n = window as f64;

    let mean = values[start..=i].iter().sum::<f64>() / n;
    let variance_sum: f64 = values[start..=i].iter().map(|v| (v - mean).powi(2)).sum();
    (variance_sum / n).sqrt()
}

/// Builds one [`FeatureRow`] per candle, same order and count as the input.
pub fn build_features(candle_series: &[Candle]) -> Result<Vec<FeatureRow>, PipelineError> {
    if candle_series.len() < 2 {
        return Err(PipelineError::InvalidInput(format!(
            "need at least 2 candles, got {}",
            candle_series.len()
        )));
    }

    // Returns aligned to candles; returns[0] is never read.
    let mut returns = vec![f64::NAN; candle_series.len()];
    for i in 1..candle_series.len() {
        returns[i] = log_return(candle_series[i].close, candle_series[i - 1].close);
    }

    let alpha_10 = alpha_from_period(10);
    let alpha_30 = alpha_from_period(30);

    let mut ema_10 = 0.0;
    let mut ema_30 = 0.0;
    let mut ema_initialized = false;

    let mut rows = Vec::with_capacity(candle_series.len());

    for (i, candle) in candle_series.iter().enumerate() {
        // Range features are available immediately.
        let range_hl = (candle.high - candle.low) / candle.close;
        let range_co = (candle.close - candle.open) / candle.open;

        let vol_chg = if i >= 1 && candle_series[i - 1].volume > 0.0 && candle.volume > 0.0 {
            Some((candle.volume / candle_series[i - 1].volume).ln())
        } else {
            None
        };

        let ret_1 = if i >= 1 { Some(returns[i]) } else { None };

        // Momentum over 6 bars: sum of returns[i-5..=i].
        let mom_6 = if i >= 6 {
            Some(returns[i - 5..=i].iter().sum())
        } else {
            None
        };

        let vol_20 = if i >= 20 {
            Some(rolling_std(&returns, i, 20))
        } else {
            None
        };

        // EMAs initialize on the first close.
        if !ema_initialized {
            ema_10 = candle.close;
            ema_30 = candle.close;
            ema_initialized = true;
        } else {
            ema_10 = ema_step(ema_10, candle.close, alpha_10);
            ema_30 = ema_step(ema_30, candle.close, alpha_30);
        }

        rows.push(FeatureRow {
            exchange: candle.exchange.clone(),
            symbol: candle.symbol.clone(),
            timeframe: candle.timeframe.clone(),
            timestamp: candle.timestamp,
            ret_1,
            vol_20,
            mom_6,
            ema_10: Some(ema_10),
            ema_30: Some(ema_30),
            ema_spread: Some(ema_10 - ema_30),
            range_hl: Some(range_hl),
            range_co: Some(range_co),
            vol_chg,
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_series(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                exchange: "binance".to_string(),
                symbol: "BTCUSDT".to_string(),
                timeframe: "4h".to_string(),
                timestamp: i as i64 * 1000,
                open: close * 0.99,
                high: close * 1.01,
                low: close * 0.98,
                close,
                volume: 10.0 + i as f64,
                close_time: 0,
                is_final: true,
            })
            .collect()
    }

    #[test]
    fn test_too_few_candles() {
        let series = make_series(&[100.0]);
        assert!(build_features(&series).is_err());
    }

    #[test]
    fn test_lookback_windows() {
        let closes: Vec<f64> = (0..25).map(|i| 100.0 + i as f64).collect();
        let series = make_series(&closes);
        let rows = build_features(&series).unwrap();
        assert_eq!(rows.len(), 25);

        // ret_1 is None only at index 0.
        assert!(rows[0].ret_1.is_none());
        assert!(rows[1..].iter().all(|r| r.ret_1.is_some()));

        // mom_6 starts at index 6.
        assert!(rows[5].mom_6.is_none());
        assert!(rows[6].mom_6.is_some());

        // vol_20 is None for the first 20 rows, Some for the trailing len - 20.
        assert!(rows[..20].iter().all(|r| r.vol_20.is_none()));
        assert!(rows[20..].iter().all(|r| r.vol_20.is_some()));
        assert_eq!(rows.iter().filter(|r| r.vol_20.is_some()).count(), 25 - 20);

        // EMA spread and ranges are defined from the first candle.
        assert!(rows.iter().all(|r| r.ema_spread.is_some()));
        assert!(rows.iter().all(|r| r.range_hl.is_some() && r.range_co.is_some()));
    }

    #[test]
    fn test_ret1_and_mom6_values() {
        let series = make_series(&[100.0, 110.0, 121.0, 133.1, 146.41, 161.05, 177.16, 194.87]);
        let rows = build_features(&series).unwrap();

        let r1 = rows[1].ret_1.unwrap();
        assert!((r1 - (110.0f64 / 100.0).ln()).abs() < 1e-12);

        // mom_6 at index 6 is the sum of returns 1..=6.
        let expected: f64 = (1..=6)
            .map(|i| (series[i].close / series[i - 1].close).ln())
            .sum();
        assert!((rows[6].mom_6.unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_ema_initializes_to_first_close() {
        let series = make_series(&[100.0, 102.0]);
        let rows = build_features(&series).unwrap();
        assert!((rows[0].ema_10.unwrap() - 100.0).abs() < 1e-12);
        assert!((rows[0].ema_spread.unwrap()).abs() < 1e-12);

        let alpha = alpha_from_period(10);
        let expected = alpha * 102.0 + (1.0 - alpha) * 100.0;
        assert!((rows[1].ema_10.unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_zero_volume_disables_vol_chg() {
        let mut series = make_series(&[100.0, 101.0, 102.0]);
        series[1].volume = 0.0;
        let rows = build_features(&series).unwrap();
        assert!(rows[0].vol_chg.is_none());
        assert!(rows[1].vol_chg.is_none()); // current volume is 0
        assert!(rows[2].vol_chg.is_none()); // previous volume is 0
    }

    #[test]
    fn test_rolling_std_constant_returns() {
        let values = vec![f64::NAN, 0.5, 0.5, 0.5, 0.5];
        assert!(rolling_std(&values, 4, 4).abs() < 1e-12);
    }
}
