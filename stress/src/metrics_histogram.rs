/*
    Records into a histogram renamed and re-bucketed by a view, from every
    core, with 1600 distinct attribute sets.

    Run with:
    cargo run --release --bin metrics_histogram -- --duration-secs 30
*/

use std::cell::RefCell;
use std::sync::OnceLock;

use metric_views::{
    metrics::{Aggregation, Histogram, ManualReader, SdkMeterProvider, Stream, ViewRule},
    KeyValue,
};
use rand::{rngs::SmallRng, Rng, SeedableRng};

mod throughput;

static PROVIDER: OnceLock<SdkMeterProvider> = OnceLock::new();
static HISTOGRAM: OnceLock<Histogram<f64>> = OnceLock::new();

thread_local! {
    /// Store random number generator for each thread
    static CURRENT_RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_os_rng());
}

static ATTRIBUTE_VALUES: [&str; 10] = [
    "value1", "value2", "value3", "value4", "value5", "value6", "value7", "value8", "value9",
    "value10",
];

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
        .init();

    let view = ViewRule::builder()
        .with_instrument_name("custom_histogram")
        .with_stream(
            Stream::builder()
                .with_name("bar")
                .with_aggregation(Aggregation::ExplicitBucketHistogram {
                    boundaries: vec![64.0, 128.0, 256.0, 512.0, 1024.0, 2048.0, 4096.0],
                    record_min_max: true,
                })
                .build()
                .expect("valid stream"),
        )
        .build()
        .expect("valid view");
    let provider = PROVIDER.get_or_init(|| {
        SdkMeterProvider::builder()
            .with_reader(ManualReader::builder().build())
            .with_view(view)
            .build()
    });
    HISTOGRAM.get_or_init(|| {
        provider
            .meter("stress")
            .f64_histogram("custom_histogram")
            .build()
            .expect("valid instrument")
    });

    throughput::test_throughput(test_histogram);
}

fn test_histogram() {
    let Some(histogram) = HISTOGRAM.get() else {
        return;
    };
    let (value, rands) = CURRENT_RNG.with(|rng| {
        let mut rng = rng.borrow_mut();
        (
            rng.random_range(0.0..5000.0),
            [
                rng.random_range(0..4),
                rng.random_range(0..4),
                rng.random_range(0..10),
                rng.random_range(0..10),
            ],
        )
    });
    let _ = histogram.record(
        value,
        &[
            KeyValue::new("attribute1", ATTRIBUTE_VALUES[rands[0]]),
            KeyValue::new("attribute2", ATTRIBUTE_VALUES[rands[1]]),
            KeyValue::new("attribute3", ATTRIBUTE_VALUES[rands[2]]),
            KeyValue::new("attribute4", ATTRIBUTE_VALUES[rands[3]]),
        ],
    );
}
