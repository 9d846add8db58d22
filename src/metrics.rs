use serde::Serialize;

use crate::dataset::{Class, NUM_CLASSES};

/// 3x3 actual-vs-predicted count table accumulated across folds.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ConfusionMatrix {
    /// rows = actual, cols = predicted
    pub m: [[u64; NUM_CLASSES]; NUM_CLASSES],
}

impl ConfusionMatrix {
    pub fn add(&mut self, actual: Class, predicted: Class) {
        self.m[actual.index()][predicted.index()] += 1;
    }

    pub fn total(&self) -> u64 {
        self.m.iter().flatten().sum()
    }

    pub fn accuracy(&self) -> f64 {
        let correct: u64 = (0..NUM_CLASSES).map(|k| self.m[k][k]).sum();
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        correct as f64 / total as f64
    }

    /// Precision and recall for one class; both default to 0 when their
    /// denominator is empty.
    pub fn precision_recall(&self, class: Class) -> (f64, f64) {
        let k = class.index();
        let tp = self.m[k][k];

        let fp: u64 = (0..NUM_CLASSES)
            .filter(|&actual| actual != k)
            .map(|actual| self.m[actual][k])
            .sum();
        let fn_: u64 = (0..NUM_CLASSES)
            .filter(|&predicted| predicted != k)
            .map(|predicted| self.m[k][predicted])
            .sum();

        let precision = if tp + fp > 0 {
            tp as f64 / (tp + fp) as f64
        } else {
            0.0
        };
        let recall = if tp + fn_ > 0 {
            tp as f64 / (tp + fn_) as f64
        } else {
            0.0
        };
        (precision, recall)
    }

    /// One-line human-readable render: accuracy, UP/DOWN precision and
    /// recall, and the raw counts.
    pub fn summary_string(&self) -> String {
        let (up_p, up_r) = self.precision_recall(Class::Up);
        let (down_p, down_r) = self.precision_recall(Class::Down);
        format!(
            "accuracy={:.4} | UP(p={:.4} r={:.4}) | DOWN(p={:.4} r={:.4}) | cm=[[ {} {} {} ],[ {} {} {} ],[ {} {} {} ]]",
            self.accuracy(),
            up_p,
            up_r,
            down_p,
            down_r,
            self.m[0][0],
            self.m[0][1],
            self.m[0][2],
            self.m[1][0],
            self.m[1][1],
            self.m[1][2],
            self.m[2][0],
            self.m[2][1],
            self.m[2][2],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_matrix_defaults() {
        let cm = ConfusionMatrix::default();
        assert_eq!(cm.total(), 0);
        assert_eq!(cm.accuracy(), 0.0);
        assert_eq!(cm.precision_recall(Class::Up), (0.0, 0.0));
    }

    #[test]
    fn test_accuracy_precision_recall_scenario() {
        let mut cm = ConfusionMatrix::default();
        for _ in 0..3 {
            cm.add(Class::Up, Class::Up);
        }
        cm.add(Class::Up, Class::Down);
        for _ in 0..2 {
            cm.add(Class::Down, Class::Down);
        }

        assert_eq!(cm.total(), 6);
        assert!((cm.accuracy() - 5.0 / 6.0).abs() < 1e-12);

        let (up_p, up_r) = cm.precision_recall(Class::Up);
        assert!((up_p - 1.0).abs() < 1e-12);
        assert!((up_r - 0.75).abs() < 1e-12);

        let (down_p, down_r) = cm.precision_recall(Class::Down);
        assert!((down_p - 2.0 / 3.0).abs() < 1e-12);
        assert!((down_r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_summary_string_renders_counts() {
        let mut cm = ConfusionMatrix::default();
        cm.add(Class::Up, Class::NoTrade);
        let s = cm.summary_string();
        assert!(s.starts_with("accuracy=0.0000"));
        assert!(s.contains("cm=[[ 0 0 1 ]"));
    }
}
