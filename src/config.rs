//! Environment-driven configuration helpers
//!
//! Every setting has a default; a variable that is set but unparseable or
//! out of range is an error rather than silently falling back.

use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name}: cannot parse '{value}'")]
    Parse { name: String, value: String },

    #[error("{name}: {reason}")]
    Invalid { name: String, reason: String },
}

/// Read and parse an environment variable, falling back to `default` when unset
pub fn env_or<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

pub fn parse_value<T: FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Parse {
        name: name.to_string(),
        value: raw.to_string(),
    })
}

/// Fractional seconds, which must be finite and positive
pub fn parse_positive_secs(name: &str, raw: &str) -> Result<Duration, ConfigError> {
    let secs: f64 = parse_value(name, raw)?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ConfigError::Invalid {
            name: name.to_string(),
            reason: format!("must be a positive number of seconds, got {}", raw),
        });
    }
    Ok(Duration::from_secs_f64(secs))
}

pub fn require_positive(name: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            name: name.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}
