//! Tracing subscriber setup

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a formatting subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Subscriber for tests, writing through the test harness capture
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info,order_engine=debug,sqlx=warn")
        .with_test_writer()
        .try_init();
}
