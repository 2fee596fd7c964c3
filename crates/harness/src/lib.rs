pub mod backend;

pub use backend::TestBackend;

use std::sync::Once;

static LOGGING: Once = Once::new();

/// Opt-in tracing output for test debugging, honoring `RUST_LOG`.
/// Safe to call from every test; installs the subscriber once.
pub fn init_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
