use serde::Serialize;

use crate::backtest::PredictionWithReturn;
use crate::dataset::Class;
use crate::error::PipelineError;

/// Per-threshold confidence analysis: how often the model's confident
/// directional calls are right, and what the realized forward return of
/// those calls looks like (a horizon proxy, not a full trading sim).
#[derive(Debug, Clone, Serialize)]
pub struct ConfidenceStats {
    pub threshold: f64,

    pub total_predictions: usize,
    pub trades: usize,
    pub coverage: f64,

    /// P(actual matches direction | traded).
    pub directional_precision: f64,
    /// Correct confident directions over all actual UP/DOWN events.
    pub directional_recall: f64,

    /// Mean signed forward log return among trades with a known return
    /// (sign flipped for DOWN calls).
    pub average_forward_return: f64,
}

/// Threshold grid from `min` to `max` inclusive, rounded to 2 decimals and
/// deduplicated; the loop bound carries an epsilon so float stepping does
/// not drop the endpoint.
pub fn build_thresholds(min: f64, max: f64, step: f64) -> Result<Vec<f64>, PipelineError> {
    if step <= 0.0 {
        return Err(PipelineError::InvalidConfig("step must be > 0".to_string()));
    }
    if min <= 0.0 || min >= 1.0 {
        return Err(PipelineError::InvalidConfig(
            "min threshold must be in (0, 1)".to_string(),
        ));
    }
    if max <= 0.0 || max > 1.0 {
        return Err(PipelineError::InvalidConfig(
            "max threshold must be in (0, 1]".to_string(),
        ));
    }
    if min > max {
        return Err(PipelineError::InvalidConfig(
            "min threshold must be <= max".to_string(),
        ));
    }

    let mut thresholds = Vec::new();
    let mut t = min;
    while t <= max + 1e-9 {
        thresholds.push((t * 100.0).round() / 100.0);
        t += step;
    }
    thresholds.sort_by(|a, b| a.total_cmp(b));
    thresholds.dedup_by(|a, b| (*a - *b).abs() <= 1e-9);
    Ok(thresholds)
}

/// Sweeps the threshold grid over out-of-sample predictions. The trade rule
/// matches the paper simulator: confidence = max(p_up, p_down), ties to the
/// UP side; but here a trade needs no realized return, only confidence.
pub fn compute_confidence_stats(
    rows: &[PredictionWithReturn],
    thresholds: &[f64],
) -> Vec<ConfidenceStats> {
    let total = rows.len();

    // Recall denominator: all actual directional (UP/DOWN) events.
    let actual_directional_count = rows
        .iter()
        .filter(|r| matches!(Class::parse(&r.actual_label), Class::Up | Class::Down))
        .count();

    let mut result = Vec::with_capacity(thresholds.len());

    for &threshold in thresholds {
        let mut trades = 0usize;
        let mut correct_directional = 0usize;
        let mut sum_forward_return = 0.0;
        let mut forward_return_count = 0usize;

        for row in rows {
            let mut confidence = row.p_up;
            let mut predicted_direction = Class::Up;
            if row.p_down > confidence {
                confidence = row.p_down;
                predicted_direction = Class::Down;
            }

            if confidence < threshold {
                continue;
            }
            trades += 1;

            if predicted_direction == Class::parse(&row.actual_label) {
                correct_directional += 1;
            }

            // DOWN calls are shorts, so their return proxy flips sign.
            if let Some(forward_return) = row.forward_log_return {
                let trade_return = if predicted_direction == Class::Down {
                    -forward_return
                } else {
                    forward_return
                };
                sum_forward_return += trade_return;
                forward_return_count += 1;
            }
        }

        let coverage = if total > 0 {
            trades as f64 / total as f64
        } else {
            0.0
        };
        let directional_precision = if trades > 0 {
            correct_directional as f64 / trades as f64
        } else {
            0.0
        };
        let directional_recall = if actual_directional_count > 0 {
            correct_directional as f64 / actual_directional_count as f64
        } else {
            0.0
        };
        let average_forward_return = if forward_return_count > 0 {
            sum_forward_return / forward_return_count as f64
        } else {
            0.0
        };

        result.push(ConfidenceStats {
            threshold,
            total_predictions: total,
            trades,
            coverage,
            directional_precision,
            directional_recall,
            average_forward_return,
        });
    }

    result
}
