//! Tracing setup for the crew match service.

use crate::config::TelemetryConfig;
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
pub enum TelemetryError {
    Filter { directives: String, source: ParseError },
    Init(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::Filter { directives, .. } => {
                write!(f, "invalid log filter directives '{directives}'")
            }
            TelemetryError::Init(err) => write!(f, "failed to install subscriber: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::Filter { source, .. } => Some(source),
            TelemetryError::Init(err) => Some(&**err),
        }
    }
}

/// Directives applied when `RUST_LOG` is absent: the configured level, with
/// the HTTP stack quieted so assessment and matching events stay readable.
fn default_directives(config: &TelemetryConfig) -> String {
    format!(
        "{level},crew_match={level},hyper=warn,tower=warn",
        level = config.log_level
    )
}

/// Install the global subscriber. `RUST_LOG` wins over the configured
/// level; either source failing to parse is a startup error, not a silent
/// fallback.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let directives = default_directives(config);
            EnvFilter::try_new(&directives)
                .map_err(|source| TelemetryError::Filter { directives, source })?
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Init)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_scope_the_crate_and_quiet_the_http_stack() {
        let config = TelemetryConfig {
            log_level: "debug".to_string(),
        };
        let directives = default_directives(&config);
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("crew_match=debug"));
        assert!(directives.contains("hyper=warn"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn unparseable_directives_surface_as_a_filter_error() {
        let config = TelemetryConfig {
            log_level: "no=such=level".to_string(),
        };
        let directives = default_directives(&config);
        let err = EnvFilter::try_new(&directives).expect_err("directives rejected");
        let wrapped = TelemetryError::Filter {
            directives: directives.clone(),
            source: err,
        };
        assert!(wrapped.to_string().contains(&directives));
    }
}
