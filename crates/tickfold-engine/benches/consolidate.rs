// Performance benchmarks for stream consolidation
//
// Target: 1M ticks through a time-window consolidator well under 100ms.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tickfold_core::NumericArray;
use tickfold_engine::{Consolidator, ConsolidatorConfig, TickBarAggregator};

fn create_test_ticks(count: usize, base_price: f64, volatility: f64) -> Vec<(i64, NumericArray)> {
    let mut ticks = Vec::with_capacity(count);
    let mut price = base_price;
    let mut rng = 0x12345678u64; // Simple deterministic RNG

    for i in 0..count {
        // Simple LCG for deterministic "random" price movements
        rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
        let random = (rng >> 16) as f64 / 65536.0; // [0, 1)
        price += (random - 0.5) * volatility * 2.0;

        let sample = NumericArray::from_slice(&[price, 1.0], 2).unwrap();
        ticks.push((1_640_995_200_000 + (i as i64 * 100), sample)); // 100ms intervals
    }

    ticks
}

fn bench_consolidation(c: &mut Criterion) {
    let mut group = c.benchmark_group("consolidation");

    for size in [1_000, 10_000, 100_000].iter() {
        let ticks = create_test_ticks(*size, 50_000.0, 10.0);

        group.bench_with_input(BenchmarkId::new("time_mode", size), size, |b, _| {
            b.iter(|| {
                let mut consolidator =
                    Consolidator::new(&ConsolidatorConfig::period(60_000), TickBarAggregator)
                        .unwrap();
                for (time, sample) in &ticks {
                    black_box(consolidator.update(*time, sample));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("mixed_mode", size), size, |b, _| {
            b.iter(|| {
                let mut consolidator = Consolidator::new(
                    &ConsolidatorConfig::mixed(60_000, 500),
                    TickBarAggregator,
                )
                .unwrap();
                for (time, sample) in &ticks {
                    black_box(consolidator.update(*time, sample));
                }
            });
        });
    }

    group.finish();
}

fn bench_array_reductions(c: &mut Criterion) {
    let mut group = c.benchmark_group("array_reductions");

    let array = {
        let ticks = create_test_ticks(10_000, 50_000.0, 10.0);
        let mut flat = Vec::with_capacity(ticks.len() * 2);
        for (_, sample) in &ticks {
            flat.extend_from_slice(sample.as_slice());
        }
        NumericArray::from_slice(&flat, 2).unwrap()
    };

    group.bench_function("column_mean", |b| {
        b.iter(|| black_box(array.mean_property(black_box(0))));
    });

    group.bench_function("column_median", |b| {
        b.iter(|| black_box(array.median_property(black_box(0))));
    });

    group.finish();
}

criterion_group!(benches, bench_consolidation, bench_array_reductions);
criterion_main!(benches);
