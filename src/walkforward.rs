use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::baselines::{predict_always_no_trade, predict_random_by_train_distribution};
use crate::dataset::{Class, DatasetRow, NUM_CLASSES, NUM_FEATURES};
use crate::error::PipelineError;
use crate::matrix::Matrix;
use crate::metrics::ConfusionMatrix;
use crate::softmax::{SoftmaxLogReg, Standardizer};

/// Walk-forward evaluation configuration. All values are caller-supplied;
/// see [`evaluate_walk_forward`] for the validation rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub folds: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2_lambda: f64,
    pub seed: u64,
    pub model_name: String,
}

/// Strictly out-of-sample prediction for one test-block row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRow {
    pub exchange: String,
    pub symbol: String,
    pub timeframe: String,
    pub timestamp: i64,
    pub model_name: String,

    pub p_up: f64,
    pub p_down: f64,
    pub p_no_trade: f64,

    pub predicted: Class,
    pub actual: Class,
}

#[derive(Debug, Default)]
pub struct WalkForwardResult {
    pub baseline_no_trade: ConfusionMatrix,
    pub baseline_random: ConfusionMatrix,
    pub logreg: ConfusionMatrix,

    pub logreg_predictions: Vec<PredictionRow>,
}

fn rows_to_matrix(rows: &[DatasetRow]) -> (Matrix, Vec<usize>) {
    let mut x = Matrix::zeros(rows.len(), NUM_FEATURES);
    let mut y = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        for (j, value) in row.features().iter().enumerate() {
            x.set(i, j, *value);
        }
        y.push(row.label.index());
    }
    (x, y)
}

const MIN_DATASET_ROWS: usize = 50;
const MIN_TEST_BLOCK: usize = 10;
const MIN_TRAIN_ROWS: usize = 30;

/// Expanding-window walk-forward evaluation.
///
/// Fold f trains on `[0, (f+1)*test_block)` and tests on the adjacent
/// disjoint block; iteration stops once the test window would run past the
/// dataset, and folds whose training prefix is shorter than 30 rows are
/// skipped without failing. A fresh classifier is trained per fold; the
/// random baseline draws from one RNG seeded once for the whole run.
pub fn evaluate_walk_forward(
    dataset: &[DatasetRow],
    config: &TrainConfig,
) -> Result<WalkForwardResult, PipelineError> {
    if config.folds < 2 {
        return Err(PipelineError::InvalidConfig("folds must be >= 2".to_string()));
    }
    if dataset.len() < MIN_DATASET_ROWS {
        return Err(PipelineError::InvalidConfig(format!(
            "dataset too small ({} rows, need {})",
            dataset.len(),
            MIN_DATASET_ROWS
        )));
    }

    let n = dataset.len();
    let test_block = n / config.folds;
    if test_block < MIN_TEST_BLOCK {
        return Err(PipelineError::InvalidConfig(format!(
            "test block too small ({}); reduce folds",
            test_block
        )));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut result = WalkForwardResult::default();

    for fold in 0..config.folds {
        let train_end = (fold + 1) * test_block;
        let test_start = train_end;
        let test_end = test_start + test_block;

        if test_end > n {
            break;
        }
        if train_end < MIN_TRAIN_ROWS {
            debug!("fold {}: train prefix {} too short, skipping", fold, train_end);
            continue;
        }

        let train_rows = &dataset[..train_end];
        let test_rows = &dataset[test_start..test_end];

        info!(
            "fold {}: train [0, {}), test [{}, {})",
            fold, train_end, test_start, test_end
        );

        let pred_a = predict_always_no_trade(test_rows.len());
        for (row, predicted) in test_rows.iter().zip(pred_a.iter()) {
            result.baseline_no_trade.add(row.label, *predicted);
        }

        let pred_r = predict_random_by_train_distribution(train_rows, test_rows.len(), &mut rng);
        for (row, predicted) in test_rows.iter().zip(pred_r.iter()) {
            result.baseline_random.add(row.label, *predicted);
        }

        let (mut x_train, y_train) = rows_to_matrix(train_rows);
        let (mut x_test, _) = rows_to_matrix(test_rows);

        let standardizer = Standardizer::fit(&x_train);
        standardizer.transform_in_place(&mut x_train);
        standardizer.transform_in_place(&mut x_test);

        let mut model = SoftmaxLogReg::new(NUM_CLASSES, NUM_FEATURES);
        model.fit_gradient_descent(
            &x_train,
            &y_train,
            config.learning_rate,
            config.l2_lambda,
            config.epochs,
        )?;

        let proba = model.predict_proba(&x_test)?;
        let pred = model.predict(&x_test)?;

        for (i, row) in test_rows.iter().enumerate() {
            let predicted = Class::from_index(pred[i]);
            result.logreg.add(row.label, predicted);

            result.logreg_predictions.push(PredictionRow {
                exchange: row.exchange.clone(),
                symbol: row.symbol.clone(),
                timeframe: row.timeframe.clone(),
                timestamp: row.timestamp,
                model_name: config.model_name.clone(),
                p_up: proba.at(i, Class::Up.index()),
                p_down: proba.at(i, Class::Down.index()),
                p_no_trade: proba.at(i, Class::NoTrade.index()),
                predicted,
                actual: row.label,
            });
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_dataset(n: usize) -> Vec<DatasetRow> {
        (0..n)
            .map(|i| {
                let phase = i as f64 * 0.37;
                let label = match i % 3 {
                    0 => Class::Up,
                    1 => Class::Down,
                    _ => Class::NoTrade,
                };
                DatasetRow {
                    exchange: "binance".to_string(),
                    symbol: "BTCUSDT".to_string(),
                    timeframe: "4h".to_string(),
                    timestamp: i as i64,
                    ret_1: phase.sin() * 0.01,
                    vol_20: 0.02 + phase.cos().abs() * 0.005,
                    mom_6: phase.sin() * 0.03,
                    ema_spread: phase.cos() * 2.0,
                    range_hl: 0.015,
                    range_co: phase.sin() * 0.004,
                    vol_chg: phase.cos() * 0.1,
                    label,
                    forward_return: phase.sin() * 0.01,
                }
            })
            .collect()
    }

    fn config(folds: usize, seed: u64) -> TrainConfig {
        TrainConfig {
            folds,
            epochs: 20,
            learning_rate: 0.1,
            l2_lambda: 0.001,
            seed,
            model_name: "logreg_softmax".to_string(),
        }
    }

    #[test]
    fn test_config_validation() {
        let dataset = make_dataset(100);
        assert!(evaluate_walk_forward(&dataset, &config(1, 42)).is_err());
        assert!(evaluate_walk_forward(&make_dataset(40), &config(2, 42)).is_err());
        // 100 rows / 11 folds -> test block 9 < 10
        assert!(evaluate_walk_forward(&dataset, &config(11, 42)).is_err());
    }

    #[test]
    fn test_predictions_are_strictly_out_of_sample() {
        let dataset = make_dataset(100);
        let result = evaluate_walk_forward(&dataset, &config(2, 42)).unwrap();

        // folds=2, block=50: fold 0 tests [50, 100), fold 1's window would
        // run past the dataset and iteration breaks.
        assert_eq!(result.logreg_predictions.len(), 50);
        for (p, ts) in result.logreg_predictions.iter().zip(50..100i64) {
            assert_eq!(p.timestamp, ts);
        }
        assert_eq!(result.logreg.total(), 50);
        assert_eq!(result.baseline_no_trade.total(), 50);
        assert_eq!(result.baseline_random.total(), 50);
    }

    #[test]
    fn test_short_train_prefix_folds_are_skipped() {
        // 120 rows / 10 folds -> block 12; folds 0 and 1 have train prefixes
        // of 12 and 24 rows, below the 30-row minimum, and fold 9's test
        // window would run past the dataset. Folds 2..=8 evaluate.
        let dataset = make_dataset(120);
        let result = evaluate_walk_forward(&dataset, &config(10, 42)).unwrap();
        assert_eq!(result.logreg_predictions.len(), 7 * 12);
        assert_eq!(result.logreg_predictions[0].timestamp, 36);
        assert_eq!(result.logreg_predictions.last().unwrap().timestamp, 119);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let dataset = make_dataset(100);
        let result = evaluate_walk_forward(&dataset, &config(4, 42)).unwrap();
        for p in &result.logreg_predictions {
            let sum = p.p_up + p.p_down + p.p_no_trade;
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_run_is_reproducible_given_seed() {
        let dataset = make_dataset(100);
        let a = evaluate_walk_forward(&dataset, &config(4, 7)).unwrap();
        let b = evaluate_walk_forward(&dataset, &config(4, 7)).unwrap();
        assert_eq!(a.baseline_random.m, b.baseline_random.m);
        assert_eq!(a.logreg.m, b.logreg.m);
    }
}
