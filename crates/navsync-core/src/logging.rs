//! Logging shims.
//!
//! With the `tracing` feature the macros below are `tracing`'s own. Without
//! it they expand to nothing, so call sites never need their own `cfg`.
//! The `tracing-json` feature adds [`init_json`] for production hosts that
//! want newline-delimited JSON on stderr.

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, warn};

#[cfg(not(feature = "tracing"))]
macro_rules! __debug {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(feature = "tracing"))]
macro_rules! __warn {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use {__debug as debug, __warn as warn};

/// Install a global JSON subscriber.
///
/// `RUST_LOG` wins over `default_filter` when set. Fails if a global
/// subscriber is already installed.
#[cfg(feature = "tracing-json")]
pub fn init_json(default_filter: &str) -> crate::Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|err| crate::SyncError::invalid_config("RUST_LOG", err.to_string()))?;

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| crate::SyncError::LoggingInit {
            reason: err.to_string(),
        })
}
