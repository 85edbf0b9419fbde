//! Recording into explicit-bucket histograms, with and without a view.
//!
//! Run with:
//! cargo bench --bench metrics_histogram

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use metric_views::{
    metrics::{Aggregation, Histogram, ManualReader, SdkMeterProvider, Stream, ViewRule},
    KeyValue,
};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::cell::RefCell;

thread_local! {
    static CURRENT_RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_os_rng());
}

static ATTRIBUTE_VALUES: [&str; 10] = [
    "value1", "value2", "value3", "value4", "value5", "value6", "value7", "value8", "value9",
    "value10",
];

fn create_histogram(provider: &SdkMeterProvider, name: &'static str) -> Histogram<f64> {
    provider
        .meter("benchmarks")
        .f64_histogram(name)
        .build()
        .unwrap()
}

fn provider_with_boundaries(boundaries: Option<Vec<f64>>) -> SdkMeterProvider {
    let builder = SdkMeterProvider::builder().with_reader(ManualReader::builder().build());
    match boundaries {
        Some(boundaries) => builder
            .with_view(
                ViewRule::builder()
                    .with_instrument_name("latency")
                    .with_stream(
                        Stream::builder()
                            .with_name("latency.custom")
                            .with_aggregation(Aggregation::ExplicitBucketHistogram {
                                boundaries,
                                record_min_max: true,
                            })
                            .build()
                            .unwrap(),
                    )
                    .build()
                    .unwrap(),
            )
            .build(),
        None => builder.build(),
    }
}

fn random_attributes() -> [KeyValue; 4] {
    // 4*4*10*10 = 1600 attribute sets.
    let rands = CURRENT_RNG.with(|rng| {
        let mut rng = rng.borrow_mut();
        [
            rng.random_range(0..4),
            rng.random_range(0..4),
            rng.random_range(0..10),
            rng.random_range(0..10),
        ]
    });
    [
        KeyValue::new("attribute1", ATTRIBUTE_VALUES[rands[0]]),
        KeyValue::new("attribute2", ATTRIBUTE_VALUES[rands[1]]),
        KeyValue::new("attribute3", ATTRIBUTE_VALUES[rands[2]]),
        KeyValue::new("attribute4", ATTRIBUTE_VALUES[rands[3]]),
    ]
}

fn histogram_record(c: &mut Criterion) {
    let provider = provider_with_boundaries(None);
    let histogram = create_histogram(&provider, "Histogram_Record");
    c.bench_function("Histogram_Record", |b| {
        b.iter(|| {
            let value = CURRENT_RNG.with(|rng| rng.borrow_mut().random_range(0.0..10_000.0));
            histogram.record(value, &random_attributes()).unwrap();
        });
    });
}

fn histogram_record_bucket_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("Histogram_Record_Buckets");
    for bucket_count in [8usize, 64, 512] {
        let boundaries: Vec<f64> = (1..=bucket_count).map(|b| (b * 10) as f64).collect();
        let provider = provider_with_boundaries(Some(boundaries));
        let histogram = create_histogram(&provider, "latency");
        let attributes = [KeyValue::new("attribute1", "value1")];
        group.bench_with_input(
            BenchmarkId::from_parameter(bucket_count),
            &bucket_count,
            |b, &bucket_count| {
                let max = (bucket_count * 10) as f64;
                b.iter(|| {
                    let value = CURRENT_RNG.with(|rng| rng.borrow_mut().random_range(0.0..max));
                    histogram.record(value, &attributes).unwrap();
                });
            },
        );
    }
    group.finish();
}

fn criterion_benchmark(c: &mut Criterion) {
    histogram_record(c);
    histogram_record_bucket_count(c);
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
