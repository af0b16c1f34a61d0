//! Tracing setup for the refund desk.

use crate::config::TelemetryConfig;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

/// Dependencies whose per-request debug output drowns assessment logs when
/// the service itself runs at `debug`.
const QUIET_DEPENDENCIES: &[&str] = &["hyper=warn", "tower=warn"];

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{directive}'")]
    Filter {
        directive: String,
        #[source]
        source: ParseError,
    },
    #[error("failed to install tracing subscriber: {0}")]
    Install(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Expand a bare level from config into the service filter, capping the
/// noisier dependencies.
fn filter_from_level(level: &str) -> Result<EnvFilter, TelemetryError> {
    let directive = std::iter::once(level)
        .chain(QUIET_DEPENDENCIES.iter().copied())
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::try_new(&directive).map_err(|source| TelemetryError::Filter { directive, source })
}

/// Install the process-wide subscriber. `RUST_LOG` wins when set; otherwise
/// the configured level applies.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => filter_from_level(&config.log_level)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Install)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_expands_to_a_filter_with_dependency_caps() {
        filter_from_level("debug").expect("bare level builds");
        filter_from_level("refund_desk=trace").expect("explicit directive builds");
    }

    #[test]
    fn malformed_level_is_rejected_with_the_offending_directive() {
        let err = filter_from_level("not a directive").unwrap_err();
        assert!(matches!(err, TelemetryError::Filter { .. }));
        assert!(err.to_string().contains("not a directive"));
    }
}
