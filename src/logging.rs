//! Logging setup.
//!
//! Logs go to **stderr** so stdout stays free for whatever host drives the
//! provider. Filtering follows `RUST_LOG`.
//!
//! ```bash
//! # Per-poll detail from the waiters
//! RUST_LOG=hcp_provider::wait=debug ./my-provider
//!
//! # Request logging from the HTTP client
//! RUST_LOG=info,hcp_provider::client=debug ./my-provider
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Install the global subscriber at `info` unless `RUST_LOG` says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Like [`init_logging`], with a different default level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Install the global subscriber if none is set yet.
///
/// Returns `false` if a subscriber was already installed, which is the usual
/// case when several tests in one process call this.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(filter("info"))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("hcp_provider=debug").is_ok());
        assert!(EnvFilter::try_new("warn,hcp_provider::wait=debug").is_ok());
    }

    #[test]
    fn test_try_init_twice() {
        try_init_logging();
        assert!(!try_init_logging());
    }
}
