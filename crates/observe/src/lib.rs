use tandem_core::config::LogConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Filter used when neither `RUST_LOG` nor the config names one.
pub const DEFAULT_FILTER: &str = "info,tandem_core=debug";

/// Installs the global subscriber described by `config`.
///
/// `RUST_LOG` wins over `config.filter` when set. Fails if the filter does
/// not parse or a global subscriber is already installed.
pub fn init_tracing(config: &LogConfig) -> Result<(), anyhow::Error> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => parse_filter(&config.filter)?,
    };

    let registry = Registry::default().with(filter);
    if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()?;
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    }

    tracing::debug!(json = config.json, "Tracing initialised");
    Ok(())
}

/// Parses a filter directive string, falling back to [`DEFAULT_FILTER`] when empty.
pub fn parse_filter(directives: &str) -> Result<EnvFilter, anyhow::Error> {
    let directives = match directives.trim() {
        "" => DEFAULT_FILTER,
        other => other,
    };
    EnvFilter::try_new(directives)
        .map_err(|e| anyhow::anyhow!("invalid log filter `{directives}`: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_uses_default() {
        let filter = parse_filter("  ").unwrap().to_string();
        assert!(filter.contains("tandem_core=debug"));
    }

    #[test]
    fn bad_level_is_rejected() {
        let err = parse_filter("tandem_core=loud").unwrap_err();
        assert!(err.to_string().contains("tandem_core=loud"));
    }
}
