use rand::Rng;

use crate::dataset::{Class, DatasetRow, NUM_CLASSES};

/// Lower-bound comparator that abstains on every row.
pub fn predict_always_no_trade(n: usize) -> Vec<Class> {
    vec![Class::NoTrade; n]
}

/// Draws each test prediction from the empirical class distribution of the
/// training partition. The RNG is seeded once per evaluation run and shared
/// across folds; an empty training partition degrades to always-NO_TRADE.
pub fn predict_random_by_train_distribution<R: Rng>(
    train: &[DatasetRow],
    n_test: usize,
    rng: &mut R,
) -> Vec<Class> {
    let mut counts = [0usize; NUM_CLASSES];
    for row in train {
        counts[row.label.index()] += 1;
    }
    let total: usize = counts.iter().sum();
    if total == 0 {
        return predict_always_no_trade(n_test);
    }

    let p_up = counts[Class::Up.index()] as f64 / total as f64;
    let p_down = counts[Class::Down.index()] as f64 / total as f64;
    // NO_TRADE takes the remainder.

    let mut out = Vec::with_capacity(n_test);
    for _ in 0..n_test {
        let u: f64 = rng.gen();
        out.push(if u < p_up {
            Class::Up
        } else if u < p_up + p_down {
            Class::Down
        } else {
            Class::NoTrade
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn row_with_label(label: Class) -> DatasetRow {
        DatasetRow {
            exchange: "binance".to_string(),
            symbol: "BTCUSDT".to_string(),
            timeframe: "4h".to_string(),
            timestamp: 0,
            ret_1: 0.0,
            vol_20: 0.0,
            mom_6: 0.0,
            ema_spread: 0.0,
            range_hl: 0.0,
            range_co: 0.0,
            vol_chg: 0.0,
            label,
            forward_return: 0.0,
        }
    }

    #[test]
    fn test_always_no_trade() {
        let pred = predict_always_no_trade(4);
        assert_eq!(pred, vec![Class::NoTrade; 4]);
    }

    #[test]
    fn test_empty_train_degrades_to_no_trade() {
        let mut rng = StdRng::seed_from_u64(42);
        let pred = predict_random_by_train_distribution(&[], 3, &mut rng);
        assert_eq!(pred, vec![Class::NoTrade; 3]);
    }

    #[test]
    fn test_single_class_train_always_predicts_it() {
        let train: Vec<DatasetRow> = (0..10).map(|_| row_with_label(Class::Up)).collect();
        let mut rng = StdRng::seed_from_u64(42);
        let pred = predict_random_by_train_distribution(&train, 20, &mut rng);
        assert!(pred.iter().all(|&c| c == Class::Up));
    }

    #[test]
    fn test_deterministic_given_seed() {
        let train = vec![
            row_with_label(Class::Up),
            row_with_label(Class::Down),
            row_with_label(Class::NoTrade),
            row_with_label(Class::NoTrade),
        ];
        let mut rng_a = StdRng::seed_from_u64(7);
        let mut rng_b = StdRng::seed_from_u64(7);
        let a = predict_random_by_train_distribution(&train, 50, &mut rng_a);
        let b = predict_random_by_train_distribution(&train, 50, &mut rng_b);
        assert_eq!(a, b);
    }
}
