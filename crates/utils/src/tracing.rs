//! Logging initialisation
//!
//! Library crates only emit `tracing` events; binaries call [`init`] once to
//! install a subscriber.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use ::tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};

/// Default filter directive when neither `CAIRN_LOG` nor `RUST_LOG` is set
pub const DEFAULT_FILTER: &str = "info";

/// Install a compact stderr subscriber
///
/// The filter is read from `CAIRN_LOG`, then `RUST_LOG`, then falls back to
/// [`DEFAULT_FILTER`]. `verbosity` raises the fallback level: 1 selects
/// `debug`, 2 or more selects `trace`.
pub fn init(verbosity: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = build_filter(verbosity)?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(is_tty())
        .compact()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

fn build_filter(verbosity: u8) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
    if let Ok(directives) = std::env::var(cairn_core::CAIRN_LOG_VAR) {
        return EnvFilter::try_new(directives);
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(fallback_directive(verbosity))
}

fn fallback_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => DEFAULT_FILTER,
        1 => "debug",
        _ => "trace",
    }
}

/// Check if stderr is attached to a terminal
fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

/// Span covering one background sync pass of a location
pub fn sync_span(location: &str) -> Span {
    span!(Level::INFO, "sync", location = %location)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_levels() {
        assert_eq!(fallback_directive(0), "info");
        assert_eq!(fallback_directive(1), "debug");
        assert_eq!(fallback_directive(5), "trace");
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
