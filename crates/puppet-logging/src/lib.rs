//! # puppet-logging
//!
//! Structured logging with `tracing`.
//!
//! Everything goes to stderr so the interactive prompt on stdout stays
//! readable. `RUST_LOG` wins over the configured level; an unparsable
//! configured level falls back to `info`. Before settings are loaded,
//! [`with_bootstrap`] gives startup code a plain stderr subscriber.

#![deny(unsafe_code)]

use puppet_settings::LoggingSettings;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Filter used when neither `RUST_LOG` nor the settings give a usable one.
pub const FALLBACK_FILTER: &str = "info";

/// Build the env filter: `RUST_LOG` first, then the configured directive.
pub fn build_filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| configured_filter(&settings.level))
}

/// Parse a configured directive, falling back to [`FALLBACK_FILTER`].
pub fn configured_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER))
}

/// Run `f` under a temporary stderr subscriber.
///
/// Settings decide the real subscriber, so anything logged while loading them
/// needs somewhere to go first.
pub fn with_bootstrap<T>(f: impl FnOnce() -> T) -> T {
    tracing::subscriber::with_default(bootstrap_subscriber(std::io::stderr), f)
}

fn bootstrap_subscriber<W>(writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER));
    tracing_subscriber::registry().with(
        fmt::layer()
            .with_target(false)
            .with_writer(writer)
            .with_filter(filter),
    )
}

/// Install the global subscriber. Call once at startup.
///
/// A second call (or a subscriber installed by a test harness) is reported on
/// stderr and otherwise ignored.
pub fn init(settings: &LoggingSettings) {
    let filter = build_filter(settings);

    let layer = if settings.json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed()
    };

    if let Err(e) = tracing_subscriber::registry().with(layer).try_init() {
        eprintln!("puppet-logging: subscriber already installed: {e}");
    }
}
