//! Criterion benchmarks for the single-run hot path.
//!
//! Benchmarks:
//! 1. Bar event loop with an SMA crossover strategy
//! 2. Metrics over a finished equity curve

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use gridlab_core::data::synthetic_bars;
use gridlab_core::engine::{run_backtest, EngineOptions};
use gridlab_core::metrics::{max_drawdown, sharpe_ratio};
use gridlab_core::strategy::SmaCrossover;

fn bench_event_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_loop");
    let opts = EngineOptions::new(100_000.0).with_costs(5.0, 2.0);
    for n in [1_000usize, 10_000, 50_000] {
        let bars = synthetic_bars("BENCH", n, 0, 60_000);
        group.bench_with_input(BenchmarkId::new("sma_cross", n), &bars, |b, bars| {
            b.iter(|| {
                let mut strategy = SmaCrossover::new(10, 30, 1.0).unwrap();
                black_box(run_backtest(black_box(bars), &mut strategy, &opts).unwrap())
            })
        });
    }
    group.finish();
}

fn bench_metrics(c: &mut Criterion) {
    let bars = synthetic_bars("BENCH-METRICS", 50_000, 0, 60_000);
    let equity: Vec<f64> = bars.iter().map(|b| b.close * 100.0).collect();
    c.bench_function("metrics/max_drawdown_50k", |b| b.iter(|| max_drawdown(black_box(&equity))));
    c.bench_function("metrics/sharpe_50k", |b| b.iter(|| sharpe_ratio(black_box(&equity))));
}

criterion_group!(benches, bench_event_loop, bench_metrics);
criterion_main!(benches);
