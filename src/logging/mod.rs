//! Console and file logging built on `tracing`.
//!
//! [`init_subscriber`] installs the global subscriber once per process;
//! [`Logger`] is the [`Log`] implementation handed to the engine and keeps
//! the per-module summary.

mod logger;
pub mod style;
mod subscriber;
mod types;
mod utils;

pub use logger::Logger;
pub(crate) use subscriber::DRY_RUN_TARGET;
pub use subscriber::init_subscriber;
pub use types::{Log, ModuleEntry, ModuleStatus};

/// Guards `XDG_CACHE_HOME` while a test points it at a temp dir.
#[cfg(test)]
pub(crate) static TEST_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// A [`Logger`] whose log file lives in a fresh temp dir, with a
/// thread-local subscriber feeding that file.
///
/// Keep the returned guard alive for the whole test.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn isolated_logger() -> (Logger, tempfile::TempDir, tracing::dispatcher::DefaultGuard) {
    use tracing_subscriber::{Layer as _, filter::LevelFilter, layer::SubscriberExt as _};

    let cache = tempfile::tempdir().expect("temp cache dir");
    let (log, layer) = {
        let _env = TEST_ENV_MUTEX
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        // SAFETY: every test that touches XDG_CACHE_HOME holds TEST_ENV_MUTEX.
        #[allow(unsafe_code)]
        unsafe {
            std::env::set_var("XDG_CACHE_HOME", cache.path());
        }
        let layer = subscriber::FileLayer::new("test").expect("file layer");
        let log = Logger::new("test");
        // SAFETY: as above.
        #[allow(unsafe_code)]
        unsafe {
            std::env::remove_var("XDG_CACHE_HOME");
        }
        (log, layer)
    };

    let dispatch = tracing::Dispatch::new(
        tracing_subscriber::registry().with(layer.with_filter(LevelFilter::DEBUG)),
    );
    let guard = tracing::dispatcher::set_default(&dispatch);
    (log, cache, guard)
}
