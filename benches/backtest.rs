use std::hint::black_box;
use std::time::Duration;

use chrono::Days;
use chrono::NaiveDate;
use criterion::criterion_group;
use criterion::criterion_main;
use criterion::BenchmarkId;
use criterion::Criterion;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use rand_distr::Normal;
use vartools::portfolio::simulate_portfolio;
use vartools::BacktestConfig;
use vartools::DynamicBacktest;
use vartools::PriceTable;

fn random_walk_prices(days: usize, tickers: &[&str], seed: u64) -> PriceTable {
  let mut rng = StdRng::seed_from_u64(seed);
  let noise = Normal::new(0.0002, 0.01).expect("valid normal params");
  let start = NaiveDate::from_ymd_opt(2016, 1, 4).expect("valid date");
  let dates = (0..days).map(|i| start + Days::new(i as u64)).collect();
  let columns: Vec<(&str, Vec<f64>)> = tickers
    .iter()
    .map(|&ticker| {
      let mut price = 100.0;
      let path: Vec<f64> = (0..days)
        .map(|_| {
          price *= 1.0 + noise.sample(&mut rng);
          price
        })
        .collect();
      (ticker, path)
    })
    .collect();
  PriceTable::from_columns(dates, columns).expect("aligned columns")
}

fn bench_backtest(c: &mut Criterion) {
  let mut group = c.benchmark_group("DynamicBacktest");
  group.sample_size(10);
  group.measurement_time(Duration::from_secs(10));

  let prices = random_walk_prices(756, &["AAA", "BBB", "CCC", "DDD", "EEE"], 3);
  let benchmark = random_walk_prices(756, &["IDX"], 5);

  for parallel in [false, true] {
    let config = BacktestConfig {
      parallel,
      ..BacktestConfig::default()
    };
    let backtest = DynamicBacktest::new(prices.clone(), benchmark.clone(), config).expect("valid backtest");
    let label = if parallel { "parallel" } else { "sequential" };

    group.bench_with_input(BenchmarkId::new("run", label), &parallel, |b, _| {
      b.iter(|| {
        let result = backtest.run().expect("backtest");
        black_box(result.final_values())
      });
    });
  }

  group.finish();
}

fn bench_simulation(c: &mut Criterion) {
  let mut group = c.benchmark_group("SimulatePortfolio");
  group.measurement_time(Duration::from_secs(3));

  let prices = random_walk_prices(504, &["AAA", "BBB", "CCC", "DDD"], 9);
  for &paths in &[1_000usize, 10_000usize] {
    group.bench_with_input(BenchmarkId::new("paths", paths), &paths, |b, &paths| {
      b.iter(|| black_box(simulate_portfolio(&prices, &[0.25; 4], 252, paths, 42).expect("simulated")));
    });
  }

  group.finish();
}

criterion_group!(benches, bench_backtest, bench_simulation);
criterion_main!(benches);
