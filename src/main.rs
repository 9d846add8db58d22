use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use candle_pipeline::backtest::{attach_forward_returns, run_paper_backtest, PaperConfig};
use candle_pipeline::candles::{periods_per_year, timeframe_to_millis, Candle};
use candle_pipeline::confidence::{build_thresholds, compute_confidence_stats};
use candle_pipeline::dataset::{assemble_dataset, DatasetRow};
use candle_pipeline::features::build_features;
use candle_pipeline::io::read_candles_csv;
use candle_pipeline::labels::build_forward_return_labels;
use candle_pipeline::report::{write_report, PredictorSummary, RunReport};
use candle_pipeline::validate::validate_continuity;
use candle_pipeline::walkforward::{evaluate_walk_forward, TrainConfig, WalkForwardResult};

#[derive(Parser)]
#[command(name = "candle_pipeline")]
#[command(about = "Walk-forward classifier and paper backtest over OHLCV candles")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct DataArgs {
    /// Candle file with columns timestamp,open,high,low,close,volume
    #[arg(long)]
    input: PathBuf,

    #[arg(long, default_value = "binance")]
    exchange: String,

    /// Symbol (e.g. BTCUSDT)
    #[arg(long, default_value = "BTCUSDT")]
    symbol: String,

    /// Timeframe (e.g. 4h)
    #[arg(long, default_value = "4h")]
    timeframe: String,
}

#[derive(Args)]
struct TrainArgs {
    /// Deadband threshold b as decimal return (e.g. 0.006 = 0.6%)
    #[arg(long, default_value_t = 0.006)]
    b: f64,

    /// Number of walk-forward folds
    #[arg(long, default_value_t = 5)]
    folds: usize,

    /// Training epochs for logistic regression
    #[arg(long, default_value_t = 500)]
    epochs: usize,

    /// Learning rate
    #[arg(long, default_value_t = 0.5)]
    lr: f64,

    /// L2 regularization strength
    #[arg(long, default_value_t = 0.001)]
    l2: f64,

    /// Random seed for baselines
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Model name recorded on prediction rows
    #[arg(long, default_value = "logreg_softmax")]
    model: String,
}

#[derive(Args)]
struct PaperArgs {
    /// Comma-separated confidence thresholds
    #[arg(long, default_value = "0.40,0.45,0.50")]
    thresholds: String,

    /// Fee per side (e.g. 0.0004 = 4 bps)
    #[arg(long, default_value_t = 0.0004)]
    fee: f64,

    /// Slippage (round-trip) as decimal
    #[arg(long, default_value_t = 0.0)]
    slippage: f64,

    /// Output directory for equity CSV files and the run report
    #[arg(long, default_value = "reports")]
    out: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Check candle continuity and report gaps
    Validate {
        #[command(flatten)]
        data: DataArgs,
    },
    /// Walk-forward baselines + multinomial logistic regression
    Train {
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        train: TrainArgs,
    },
    /// Train, then paper-trade the out-of-sample predictions
    Paper {
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        train: TrainArgs,
        #[command(flatten)]
        paper: PaperArgs,
    },
    /// Sweep confidence thresholds: coverage, directional precision/recall
    /// and average forward return of the out-of-sample predictions
    Confidence {
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        train: TrainArgs,

        /// Minimum confidence threshold
        #[arg(long, default_value_t = 0.40)]
        min: f64,

        /// Maximum confidence threshold
        #[arg(long, default_value_t = 0.80)]
        max: f64,

        /// Step size for thresholds
        #[arg(long, default_value_t = 0.05)]
        step: f64,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Validate { data } => run_validate(&data),
        Command::Train { data, train } => {
            let (_dataset, result) = run_train(&data, &train)?;
            print_train_summary(&result);
            Ok(())
        }
        Command::Paper { data, train, paper } => run_paper(&data, &train, &paper),
        Command::Confidence {
            data,
            train,
            min,
            max,
            step,
        } => run_confidence(&data, &train, min, max, step),
    }
}

fn load_candles(data: &DataArgs) -> Result<Vec<Candle>> {
    let candles = read_candles_csv(&data.input, &data.exchange, &data.symbol, &data.timeframe)
        .with_context(|| format!("reading candles from {}", data.input.display()))?;
    println!("candles: {}", candles.len());
    Ok(candles)
}

fn run_validate(data: &DataArgs) -> Result<()> {
    let candles = load_candles(data)?;
    let interval = timeframe_to_millis(&data.timeframe)?;
    let result = validate_continuity(&candles, interval)?;

    println!(
        "count={} first_ts={} last_ts={} gaps={}",
        result.count,
        result.first_ts,
        result.last_ts,
        result.gaps.len()
    );
    for gap in &result.gaps {
        println!(
            "gap after ts={}: expected={} actual={} missing={}",
            gap.previous_ts, gap.expected_ts, gap.actual_ts, gap.missing
        );
    }
    Ok(())
}

fn run_train(data: &DataArgs, train: &TrainArgs) -> Result<(Vec<DatasetRow>, WalkForwardResult)> {
    let candles = load_candles(data)?;

    let features = build_features(&candles)?;
    let labels = build_forward_return_labels(&candles, train.b)?;
    let dataset = assemble_dataset(&features, &labels);
    if dataset.is_empty() {
        bail!("dataset is empty after joining features and labels");
    }
    println!("dataset rows: {}", dataset.len());

    let result = evaluate_walk_forward(
        &dataset,
        &TrainConfig {
            folds: train.folds,
            epochs: train.epochs,
            learning_rate: train.lr,
            l2_lambda: train.l2,
            seed: train.seed,
            model_name: train.model.clone(),
        },
    )?;

    Ok((dataset, result))
}

fn print_train_summary(result: &WalkForwardResult) {
    println!("always NO_TRADE: {}", result.baseline_no_trade.summary_string());
    println!("random baseline: {}", result.baseline_random.summary_string());
    println!("logreg softmax:  {}", result.logreg.summary_string());
}

fn parse_thresholds(value: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for part in value.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let threshold: f64 = part
            .parse()
            .with_context(|| format!("invalid threshold {:?}", part))?;
        out.push(threshold);
    }
    if out.is_empty() {
        bail!("no thresholds provided");
    }
    Ok(out)
}

fn run_confidence(data: &DataArgs, train: &TrainArgs, min: f64, max: f64, step: f64) -> Result<()> {
    let thresholds = build_thresholds(min, max, step)?;

    let (dataset, result) = run_train(data, train)?;
    print_train_summary(&result);
    println!();

    let predictions = attach_forward_returns(&result.logreg_predictions, &dataset);
    let stats = compute_confidence_stats(&predictions, &thresholds);

    println!(
        "{:<8} {:<10} {:<10} {:<12} {:<14} {:<14} {:<14}",
        "thr", "trades", "coverage", "dir_prec", "dir_recall", "avg_fwd_ret", "notes"
    );
    for s in &stats {
        let note = if s.trades < 50 { "low-n" } else { "" };
        println!(
            "{:<8.2} {:<10} {:<10.3} {:<12.3} {:<14.3} {:<14.5} {:<14}",
            s.threshold,
            s.trades,
            s.coverage,
            s.directional_precision,
            s.directional_recall,
            s.average_forward_return,
            note
        );
    }

    println!();
    println!("coverage = trades / predictions; dir_prec = P(actual matches direction | traded)");
    println!("avg_fwd_ret uses the label forward return (horizon proxy, not a full trading sim)");

    Ok(())
}

fn run_paper(data: &DataArgs, train: &TrainArgs, paper: &PaperArgs) -> Result<()> {
    let thresholds = parse_thresholds(&paper.thresholds)?;

    let (dataset, result) = run_train(data, train)?;
    print_train_summary(&result);
    println!();

    let predictions = attach_forward_returns(&result.logreg_predictions, &dataset);
    let per_year = periods_per_year(&data.timeframe)?;

    println!(
        "{:<8} {:<10} {:<10} {:<12} {:<12} {:<12}",
        "thr", "trades", "coverage", "total_ret", "sharpe", "max_dd"
    );

    let mut backtests = Vec::new();
    for threshold in thresholds {
        let csv_path = paper.out.join(format!(
            "equity_{}_{}_thr{:.2}.csv",
            data.symbol.to_lowercase(),
            data.timeframe.to_lowercase(),
            threshold
        ));

        let paper_result = run_paper_backtest(
            &predictions,
            &PaperConfig {
                threshold,
                fee_per_side: paper.fee,
                slippage: paper.slippage,
                periods_per_year: per_year,
                equity_csv_path: Some(csv_path),
            },
        )?;

        println!(
            "{:<8.2} {:<10} {:<10.3} {:<12.4} {:<12.4} {:<12.4}",
            paper_result.threshold,
            paper_result.trades,
            paper_result.coverage,
            paper_result.total_return,
            paper_result.sharpe,
            paper_result.max_drawdown
        );
        backtests.push(paper_result);
    }

    let report = RunReport {
        symbol: data.symbol.clone(),
        timeframe: data.timeframe.clone(),
        model_name: train.model.clone(),
        dataset_rows: dataset.len(),
        predictors: vec![
            PredictorSummary::from_matrix("always_no_trade", &result.baseline_no_trade),
            PredictorSummary::from_matrix("random_by_train_dist", &result.baseline_random),
            PredictorSummary::from_matrix(&train.model, &result.logreg),
        ],
        backtests,
    };
    let report_path = paper.out.join("run_report.json");
    write_report(&report, &report_path)?;
    println!();
    println!("report written to {}", report_path.display());

    Ok(())
}
