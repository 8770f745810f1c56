//! GridLab CLI — single backtests, grid-search optimization and walk-forward.
//!
//! Commands:
//! - `backtest` — run one strategy over a CSV or synthetic bar feed
//! - `optimize` — run a TOML/JSON optimize request and print the response envelope
//! - `walk-forward` — evaluate one parameter set on train/validate/test folds
//!
//! Results go to stdout as JSON; logs go to stderr (`RUST_LOG`, default `info`).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gridlab_core::data::{load_csv, synthetic_bars};
use gridlab_core::strategy::{BuiltinFactory, StrategyFactory};
use gridlab_core::{run_backtest, Bar, CashMode, EngineOptions, Params};
use gridlab_runner::{
    run_walk_forward, CancelToken, OptimizeRequest, OptimizeResponse, Optimizer, OptimizerConfig, TracingSink,
    WalkForwardConfig,
};

#[derive(Parser)]
#[command(name = "gridlab", about = "GridLab CLI — bar-driven backtests and grid search")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one backtest and print the result as JSON.
    Backtest {
        #[command(flatten)]
        feed: FeedArgs,

        #[command(flatten)]
        strategy: StrategyArgs,

        #[command(flatten)]
        engine: EngineArgs,

        /// Print metrics only, without fills and equity history.
        #[arg(long, default_value_t = false)]
        summary: bool,
    },
    /// Run a grid search from a request file and print the response envelope.
    Optimize {
        /// Optimize request (.toml or .json).
        #[arg(long)]
        request: PathBuf,

        #[command(flatten)]
        feed: FeedArgs,
    },
    /// Evaluate one parameter set with walk-forward validation.
    WalkForward {
        #[command(flatten)]
        feed: FeedArgs,

        #[command(flatten)]
        strategy: StrategyArgs,

        #[command(flatten)]
        engine: EngineArgs,

        #[arg(long, default_value_t = 0.6)]
        train: f64,

        #[arg(long, default_value_t = 0.2)]
        validate: f64,

        #[arg(long, default_value_t = 0.2)]
        test: f64,

        /// Slide the window across the feed instead of a single split.
        #[arg(long, default_value_t = false)]
        rolling: bool,

        /// Window step as a fraction of the feed (with --rolling).
        #[arg(long, default_value_t = 0.2)]
        step: f64,
    },
}

#[derive(Args)]
struct FeedArgs {
    /// CSV file with timestamp,open,high,low,close,volume columns.
    #[arg(long, conflicts_with = "synthetic")]
    bars: Option<PathBuf>,

    /// Generate this many synthetic bars instead of reading a file.
    #[arg(long)]
    synthetic: Option<usize>,

    /// Label seeding the synthetic series.
    #[arg(long, default_value = "SYNTH")]
    seed: String,

    /// Synthetic bar interval in milliseconds.
    #[arg(long, default_value_t = 3_600_000)]
    interval_ms: i64,
}

impl FeedArgs {
    fn load(&self) -> Result<Vec<Bar>> {
        match (&self.bars, self.synthetic) {
            (Some(path), _) => load_csv(path).with_context(|| format!("loading bars from {}", path.display())),
            (None, Some(n)) => Ok(synthetic_bars(&self.seed, n, 0, self.interval_ms)),
            (None, None) => bail!("either --bars or --synthetic is required"),
        }
    }
}

#[derive(Args)]
struct StrategyArgs {
    /// Strategy name: sma_cross, buy_and_hold.
    #[arg(long, default_value = "sma_cross")]
    strategy: String,

    /// Strategy parameter as key=value; values are parsed as JSON when possible.
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, Value)>,
}

impl StrategyArgs {
    fn factory(&self) -> Result<BuiltinFactory> {
        Ok(BuiltinFactory::from_name(&self.strategy)?)
    }

    fn params(&self) -> Params {
        self.params.iter().cloned().collect()
    }
}

#[derive(Args)]
struct EngineArgs {
    #[arg(long, default_value_t = 10_000.0)]
    initial_cash: f64,

    #[arg(long, default_value_t = 0.0)]
    fee_bps: f64,

    #[arg(long, default_value_t = 0.0)]
    slippage_bps: f64,

    /// Allow cash to go negative.
    #[arg(long, default_value_t = false)]
    margin: bool,

    /// Reject buys that would take the position above this size.
    #[arg(long)]
    max_position: Option<f64>,

    /// Fill market orders at the submitting bar's close instead of the next open.
    #[arg(long, default_value_t = false)]
    same_bar_close: bool,
}

impl EngineArgs {
    fn options(&self) -> EngineOptions {
        let mut opts = EngineOptions::new(self.initial_cash)
            .with_costs(self.fee_bps, self.slippage_bps)
            .with_next_bar_open(!self.same_bar_close);
        if self.margin {
            opts = opts.with_cash_mode(CashMode::Margin);
        }
        if let Some(max) = self.max_position {
            opts = opts.with_max_position(max);
        }
        opts
    }
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Backtest {
            feed,
            strategy,
            engine,
            summary,
        } => run_single(&feed, &strategy, &engine, summary),
        Commands::Optimize { request, feed } => run_optimize(request, &feed),
        Commands::WalkForward {
            feed,
            strategy,
            engine,
            train,
            validate,
            test,
            rolling,
            step,
        } => {
            let cfg = WalkForwardConfig {
                train_ratio: train,
                validate_ratio: validate,
                test_ratio: test,
                rolling_window: rolling,
                step,
            };
            run_walk(&feed, &strategy, &engine, &cfg)
        }
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_single(feed: &FeedArgs, strategy: &StrategyArgs, engine: &EngineArgs, summary: bool) -> Result<ExitCode> {
    let bars = feed.load()?;
    let params = strategy.params();
    let mut instance = strategy.factory()?.build(&params)?;
    info!(strategy = %strategy.strategy, bars = bars.len(), "running backtest");

    let mut result = run_backtest(&bars, instance.as_mut(), &engine.options())?;
    if summary {
        result.fills.clear();
        result.equity_history.clear();
    }
    print_json(&result)?;
    Ok(ExitCode::SUCCESS)
}

fn run_optimize(path: PathBuf, feed: &FeedArgs) -> Result<ExitCode> {
    let request = OptimizeRequest::from_file(&path)?;
    let config = OptimizerConfig::from_env()?;
    let factory = BuiltinFactory::from_name(&request.strategy)?;
    let bars = feed.load()?;
    info!(
        symbol = %request.symbol,
        bars = bars.len(),
        max_combinations = config.max_combinations,
        max_concurrency = config.max_concurrency,
        "optimize request loaded"
    );

    let optimizer = Optimizer::new(config).with_sink(std::sync::Arc::new(TracingSink));
    let response = OptimizeResponse::from(optimizer.optimize(&bars, &request, &factory, &CancelToken::new()));
    print_json(&response)?;
    Ok(if response.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_walk(feed: &FeedArgs, strategy: &StrategyArgs, engine: &EngineArgs, cfg: &WalkForwardConfig) -> Result<ExitCode> {
    let bars = feed.load()?;
    let factory = strategy.factory()?;
    let result = run_walk_forward(&bars, &factory, &strategy.params(), &engine.options(), cfg)?;
    print_json(&result)?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn params_parse_as_json_or_string() {
        assert_eq!(parse_param("fast=5").unwrap(), ("fast".into(), serde_json::json!(5)));
        assert_eq!(parse_param("mode=fast").unwrap(), ("mode".into(), serde_json::json!("fast")));
        assert!(parse_param("novalue").is_err());
    }

    #[test]
    fn engine_flags_build_options() {
        let cli = Cli::parse_from([
            "gridlab",
            "backtest",
            "--synthetic",
            "10",
            "--fee-bps",
            "10",
            "--margin",
            "--same-bar-close",
        ]);
        let Commands::Backtest { engine, .. } = cli.command else {
            panic!("expected backtest");
        };
        let opts = engine.options();
        assert_eq!(opts.fee_bps, 10.0);
        assert_eq!(opts.cash_mode, CashMode::Margin);
        assert!(!opts.use_next_bar_open);
    }
}
