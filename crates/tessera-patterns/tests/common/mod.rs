//! Shared helpers for integration tests

use std::sync::Once;

static INIT: Once = Once::new();

/// Install a test-writer subscriber once per binary
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}
