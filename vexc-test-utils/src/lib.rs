//! Helpers shared by the workspace's test binaries.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize tracing for test binaries. Safe to call multiple times.
///
/// Honors `RUST_LOG` and defaults to `info`.
pub fn init_tracing_for_tests() {
    INIT.call_once(|| {
        use tracing_subscriber::filter::EnvFilter;
        use tracing_subscriber::fmt;
        let filter = match std::env::var("RUST_LOG") {
            Ok(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            Err(_) => EnvFilter::new("info"),
        };
        // Another harness may have installed a subscriber already.
        let _ = fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_test_writer()
            .try_init();
    });
}

/// Deterministic row values for `n` rows where every `null_every`-th row is
/// `None`. `null_every == 0` yields no nulls.
pub fn nullable_sequence(n: usize, null_every: usize, f: impl Fn(usize) -> i64) -> Vec<Option<i64>> {
    (0..n)
        .map(|i| {
            if null_every != 0 && i % null_every == 0 {
                None
            } else {
                Some(f(i))
            }
        })
        .collect()
}

#[cfg(feature = "auto-init")]
mod auto {
    use ctor::ctor;

    #[ctor]
    fn init() {
        super::init_tracing_for_tests();
    }
}
