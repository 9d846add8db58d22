use serde::{Deserialize, Serialize};

use crate::features::FeatureRow;
use crate::labels::LabelRow;

/// Number of model features in a [`DatasetRow`].
pub const NUM_FEATURES: usize = 7;
/// Number of label classes.
pub const NUM_CLASSES: usize = 3;

/// Closed three-class label. The ordinal (0, 1, 2) doubles as the matrix
/// index in the classifier and the confusion matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Class {
    #[serde(rename = "UP")]
    Up,
    #[serde(rename = "DOWN")]
    Down,
    #[serde(rename = "NO_TRADE")]
    NoTrade,
}

impl Class {
    pub fn index(self) -> usize {
        match self {
            Class::Up => 0,
            Class::Down => 1,
            Class::NoTrade => 2,
        }
    }

    pub fn from_index(index: usize) -> Class {
        match index {
            0 => Class::Up,
            1 => Class::Down,
            _ => Class::NoTrade,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Class::Up => "UP",
            Class::Down => "DOWN",
            Class::NoTrade => "NO_TRADE",
        }
    }

    /// Unknown strings map to NO_TRADE.
    pub fn parse(label: &str) -> Class {
        match label {
            "UP" => Class::Up,
            "DOWN" => Class::Down,
            _ => Class::NoTrade,
        }
    }
}

impl std::fmt::Display for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One modeling row: the 7-feature tuple joined with its label, complete
/// (every lookback window satisfied) and ordered ascending by timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRow {
    pub exchange: String,
    pub symbol: String,
    pub timeframe: String,
    pub timestamp: i64,

    pub ret_1: f64,
    pub vol_20: f64,
    pub mom_6: f64,
    pub ema_spread: f64,
    pub range_hl: f64,
    pub range_co: f64,
    pub vol_chg: f64,

    pub label: Class,
    /// Realized forward log return carried along for the paper backtest.
    pub forward_return: f64,
}

impl DatasetRow {
    pub fn features(&self) -> [f64; NUM_FEATURES] {
        [
            self.ret_1,
            self.vol_20,
            self.mom_6,
            self.ema_spread,
            self.range_hl,
            self.range_co,
            self.vol_chg,
        ]
    }
}

/// Joins features and labels on timestamp, keeping only rows where every
/// lookback-dependent feature is present. Output order follows the feature
/// sequence (ascending by timestamp for ordered input).
pub fn assemble_dataset(features: &[FeatureRow], labels: &[LabelRow]) -> Vec<DatasetRow> {
    let mut rows = Vec::new();
    let mut label_iter = labels.iter().peekable();

    for feature in features {
        // Both sequences are timestamp-ordered; advance labels to the match.
        while let Some(label) = label_iter.peek() {
            if label.timestamp < feature.timestamp {
                label_iter.next();
            } else {
                break;
            }
        }
        let label = match label_iter.peek() {
            Some(l) if l.timestamp == feature.timestamp => *l,
            _ => continue,
        };

        let (ret_1, vol_20, mom_6, ema_spread, range_hl, range_co, vol_chg) = match (
            feature.ret_1,
            feature.vol_20,
            feature.mom_6,
            feature.ema_spread,
            feature.range_hl,
            feature.range_co,
            feature.vol_chg,
        ) {
            (Some(a), Some(b), Some(c), Some(d), Some(e), Some(f), Some(g)) => {
                (a, b, c, d, e, f, g)
            }
            _ => continue,
        };

        rows.push(DatasetRow {
            exchange: feature.exchange.clone(),
            symbol: feature.symbol.clone(),
            timeframe: feature.timeframe.clone(),
            timestamp: feature.timestamp,
            ret_1,
            vol_20,
            mom_6,
            ema_spread,
            range_hl,
            range_co,
            vol_chg,
            label: label.label,
            forward_return: label.forward_return,
        });
    }

    rows
}
