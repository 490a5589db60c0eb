//! Logging helpers.
//!
//! The crate logs through `tracing` and never installs a subscriber on its own.
//! Applications that want console output can call [`init_logging`] (feature
//! `logging`) or install their own subscriber.
//!
//! ```toml
//! conjur-api = { version = "0.1", features = ["logging"] }
//! ```

mod spans;

pub use spans::RequestSpan;

/// Install a console subscriber.
///
/// `debug` selects the `debug` level for this crate, otherwise only warnings and
/// errors are shown. `RUST_LOG` takes precedence when set. Returns `false` when
/// a global subscriber was already installed.
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub fn init_logging(debug: bool) -> bool {
    use tracing_subscriber::EnvFilter;

    let default_directive = if debug { "conjur_api=debug,warn" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .try_init()
        .is_ok()
}
