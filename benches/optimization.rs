use std::hint::black_box;
use std::time::Duration;

use chrono::Days;
use chrono::NaiveDate;
use criterion::criterion_group;
use criterion::criterion_main;
use criterion::BenchmarkId;
use criterion::Criterion;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use rand_distr::Normal;
use vartools::risk::historical_cvar;
use vartools::OptimizerConfig;
use vartools::PortfolioOptimizer;
use vartools::Position;
use vartools::ReturnMatrix;
use vartools::Strategy;

fn synthetic_returns(rows: usize, assets: usize, seed: u64) -> ReturnMatrix {
  let mut rng = StdRng::seed_from_u64(seed);
  let noise = Normal::new(0.0003, 0.012).expect("valid normal params");
  let values = Array2::from_shape_fn((rows, assets), |_| noise.sample(&mut rng));
  let start = NaiveDate::from_ymd_opt(2015, 1, 1).expect("valid date");
  let dates = (0..rows).map(|i| start + Days::new(i as u64)).collect();
  let tickers = (0..assets).map(|j| format!("S{j:02}")).collect();
  ReturnMatrix::new(dates, tickers, values).expect("finite returns")
}

fn bench_strategies(c: &mut Criterion) {
  let mut group = c.benchmark_group("PortfolioOptimizer");
  group.measurement_time(Duration::from_secs(3));
  group.warm_up_time(Duration::from_millis(500));

  for &assets in &[5usize, 20usize] {
    let returns = synthetic_returns(252, assets, 7);
    let optimizer = PortfolioOptimizer::new(returns, 0.02, OptimizerConfig::default()).expect("optimizer");

    for strategy in [
      Strategy::MinVariance,
      Strategy::MaxSharpe,
      Strategy::MinCvar,
      Strategy::MinCvarContribution,
    ] {
      group.bench_with_input(BenchmarkId::new(strategy.name(), assets), &assets, |b, _| {
        b.iter(|| {
          let outcome = optimizer.optimize(strategy, 95.0).expect("solved");
          black_box((outcome.objective, outcome.iterations))
        });
      });
    }
  }

  group.finish();
}

fn bench_tail_estimates(c: &mut Criterion) {
  let mut group = c.benchmark_group("HistoricalCvar");
  group.measurement_time(Duration::from_secs(2));

  for &rows in &[252usize, 2_520usize] {
    let returns = synthetic_returns(rows, 10, 11);
    let weights = vec![0.1; 10];
    group.bench_with_input(BenchmarkId::new("long", rows), &rows, |b, _| {
      b.iter(|| black_box(historical_cvar(&returns, &weights, 95.0, Position::Long).expect("cvar")));
    });
  }

  group.finish();
}

criterion_group!(benches, bench_strategies, bench_tail_estimates);
criterion_main!(benches);
