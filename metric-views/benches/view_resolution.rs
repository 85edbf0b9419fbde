//! Cost of resolving an instrument against a list of views.
//!
//! Run with:
//! cargo bench --bench view_resolution

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use metric_views::metrics::{Aggregation, ManualReader, SdkMeterProvider, Stream, ViewRule};

fn views(count: usize) -> Vec<ViewRule> {
    (0..count)
        .map(|i| {
            ViewRule::builder()
                .with_instrument_name(format!("unmatched_{i}_*"))
                .with_stream(
                    Stream::builder()
                        .with_aggregation(Aggregation::ExplicitBucketHistogram {
                            boundaries: vec![1.0, 2.0, 4.0],
                            record_min_max: false,
                        })
                        .build()
                        .unwrap(),
                )
                .build()
                .unwrap()
        })
        .collect()
}

fn first_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("View_Resolution");
    for view_count in [1usize, 10, 100] {
        group.bench_with_input(
            BenchmarkId::from_parameter(view_count),
            &view_count,
            |b, &view_count| {
                b.iter_batched(
                    || {
                        views(view_count)
                            .into_iter()
                            .fold(
                                SdkMeterProvider::builder()
                                    .with_reader(ManualReader::builder().build()),
                                |builder, view| builder.with_view(view),
                            )
                            .build()
                    },
                    |provider| {
                        let histogram = provider
                            .meter("benchmarks")
                            .f64_histogram("custom_histogram")
                            .build()
                            .unwrap();
                        // Shutdown on drop stays out of the measurement.
                        (provider, histogram)
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

fn cached_resolution(c: &mut Criterion) {
    let provider = views(100)
        .into_iter()
        .fold(
            SdkMeterProvider::builder().with_reader(ManualReader::builder().build()),
            |builder, view| builder.with_view(view),
        )
        .build();
    let meter = provider.meter("benchmarks");
    c.bench_function("View_Resolution_Cached", |b| {
        b.iter(|| meter.f64_histogram("custom_histogram").build().unwrap());
    });
}

criterion_group!(benches, first_resolution, cached_resolution);
criterion_main!(benches);
