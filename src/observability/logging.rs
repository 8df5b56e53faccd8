//! Structured logging.
//!
//! Filter precedence: `RUST_LOG`, then the configured base level applied to
//! this crate and `tower_http`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default directive used when neither `RUST_LOG` nor a level is given.
pub const DEFAULT_FILTER: &str = "api_gateway=info,tower_http=info";

/// Build the filter directive for a configured level.
pub fn filter_directive(level: &str) -> String {
    let level = level.trim();
    if level.is_empty() {
        DEFAULT_FILTER.to_string()
    } else {
        format!("api_gateway={level},tower_http={level}")
    }
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive(""), DEFAULT_FILTER);
        assert_eq!(
            filter_directive("debug"),
            "api_gateway=debug,tower_http=debug"
        );
    }
}
