/*
    Records unbounded attribute sets into a histogram. Memory must stay flat:
    past the cardinality limit every new set lands in the overflow point, and
    the limit warning is logged once per stream.

    Run with:
    cargo run --release --bin metrics_overflow
*/

use std::cell::RefCell;
use std::sync::OnceLock;

use metric_views::{
    metrics::{Histogram, ManualReader, SdkMeterProvider},
    KeyValue,
};
use rand::{rngs::SmallRng, Rng, SeedableRng};

mod throughput;

static PROVIDER: OnceLock<SdkMeterProvider> = OnceLock::new();
static HISTOGRAM: OnceLock<Histogram<u64>> = OnceLock::new();

thread_local! {
    /// Store random number generator for each thread
    static CURRENT_RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_os_rng());
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
        .init();

    let provider = PROVIDER.get_or_init(|| {
        SdkMeterProvider::builder()
            .with_reader(ManualReader::builder().build())
            .build()
    });
    HISTOGRAM.get_or_init(|| {
        provider
            .meter("stress")
            .u64_histogram("request.size")
            .build()
            .expect("valid instrument")
    });

    throughput::test_throughput(test_overflow);
}

fn test_overflow() {
    let Some(histogram) = HISTOGRAM.get() else {
        return;
    };
    let rand = CURRENT_RNG.with(|rng| rng.borrow_mut().random_range(0..100_000_000i64));
    let _ = histogram.record(rand as u64 % 4096, &[KeyValue::new("A", rand)]);
}
