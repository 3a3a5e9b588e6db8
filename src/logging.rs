// Subscriber setup for the binary

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset or empty.
pub const DEFAULT_DIRECTIVE: &str = "coordinated_await=info";

/// Filter from a `RUST_LOG`-style spec, falling back to [`DEFAULT_DIRECTIVE`].
pub fn env_filter(spec: Option<&str>) -> Result<EnvFilter> {
    match spec.map(str::trim).filter(|s| !s.is_empty()) {
        Some(spec) => EnvFilter::try_new(spec)
            .map_err(|e| anyhow!("invalid RUST_LOG directive `{}`: {}", spec, e)),
        None => Ok(EnvFilter::new(DEFAULT_DIRECTIVE)),
    }
}

/// Install the global fmt subscriber, writing to stderr.
pub fn init() -> Result<()> {
    let spec = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(spec.as_deref())?)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    fn enabled_under(spec: Option<&str>, level: Level) -> bool {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(env_filter(spec).unwrap())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            if level == Level::INFO {
                tracing::enabled!(Level::INFO)
            } else if level == Level::DEBUG {
                tracing::enabled!(Level::DEBUG)
            } else {
                tracing::enabled!(Level::TRACE)
            }
        })
    }

    #[test]
    fn default_shows_info_but_not_debug() {
        assert!(enabled_under(None, Level::INFO));
        assert!(!enabled_under(None, Level::DEBUG));
        assert!(!enabled_under(Some("   "), Level::DEBUG));
    }

    #[test]
    fn rust_log_can_raise_the_level() {
        assert!(enabled_under(Some("coordinated_await=debug"), Level::DEBUG));
        assert!(enabled_under(Some("debug"), Level::DEBUG));
        assert!(!enabled_under(Some("coordinated_await=debug"), Level::TRACE));
    }

    #[test]
    fn malformed_directive_is_an_error() {
        assert!(env_filter(Some("coordinated_await=notalevel")).is_err());
    }
}
