/*
    Builds instruments concurrently against a provider with many views.
    After the first build of each name the resolution is cached, so this
    measures the registration path: name validation, conflict checks and
    the cache lookup.

    Run with:
    cargo run --release --bin view_resolution
*/

use std::cell::RefCell;
use std::sync::OnceLock;

use metric_views::metrics::{Aggregation, ManualReader, SdkMeterProvider, Stream, ViewRule};
use rand::{rngs::SmallRng, Rng, SeedableRng};

mod throughput;

const VIEW_COUNT: usize = 50;
const INSTRUMENT_NAMES: [&str; 4] = [
    "custom_histogram",
    "custom_histogram1",
    "custom_histogram2",
    "unmatched_histogram",
];

static PROVIDER: OnceLock<SdkMeterProvider> = OnceLock::new();

thread_local! {
    /// Store random number generator for each thread
    static CURRENT_RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_os_rng());
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
        .init();

    let views = (0..VIEW_COUNT).map(|i| {
        ViewRule::builder()
            .with_instrument_name(format!("custom_histogram{i}"))
            .with_stream(
                Stream::builder()
                    .with_aggregation(Aggregation::ExplicitBucketHistogram {
                        boundaries: (1..=i + 1).map(|b| (b * 4) as f64).collect(),
                        record_min_max: true,
                    })
                    .build()
                    .expect("valid stream"),
            )
            .build()
            .expect("valid view")
    });
    let builder = views.fold(
        SdkMeterProvider::builder().with_reader(ManualReader::builder().build()),
        |builder, view| builder.with_view(view),
    );
    PROVIDER.get_or_init(|| builder.build());

    throughput::test_throughput(test_view_resolution);
}

fn test_view_resolution() {
    let Some(provider) = PROVIDER.get() else {
        return;
    };
    let index = CURRENT_RNG.with(|rng| rng.borrow_mut().random_range(0..INSTRUMENT_NAMES.len()));
    let _ = provider
        .meter("stress")
        .f64_histogram(INSTRUMENT_NAMES[index])
        .build();
}
