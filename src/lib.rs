pub mod backtest;
pub mod baselines;
pub mod candles;
pub mod confidence;
pub mod dataset;
pub mod error;
pub mod features;
pub mod io;
pub mod labels;
pub mod matrix;
pub mod metrics;
pub mod report;
pub mod softmax;
pub mod validate;
pub mod walkforward;

pub use error::PipelineError;
