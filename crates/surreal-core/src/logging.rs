//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Default filter: everything from Surreal crates, info for the rest.
pub const DEFAULT_FILTER: &str = "info,surreal_core=trace,surreal_assets=trace";

/// Install the global fmt subscriber.
///
/// `RUST_LOG` overrides [`DEFAULT_FILTER`] when set. Calling this more than
/// once is harmless; later calls leave the first subscriber in place.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Install the global fmt subscriber with an explicit filter directive.
///
/// Returns `false` if the directive is invalid or a subscriber is already set.
pub fn init_with_filter(directives: &str) -> bool {
    let Ok(filter) = EnvFilter::try_new(directives) else {
        return false;
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

/// Install a test-friendly subscriber that writes through the test harness.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("trace"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_is_rejected() {
        assert!(!init_with_filter("surreal_assets=notalevel[[["));
    }

    #[test]
    fn test_init_is_repeatable() {
        init_for_tests();
        init();
        init_for_tests();
    }
}
