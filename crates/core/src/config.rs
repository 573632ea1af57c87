//! Typed environment-variable lookup with defaults.

use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{key} must be a valid {expected}, got {value:?}")]
pub struct ConfigError {
    pub key: String,
    pub value: String,
    pub expected: &'static str,
}

/// Parse `raw` as `T`, falling back to `default` when unset or blank.
pub fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError {
            key: key.to_string(),
            value: value.to_string(),
            expected: std::any::type_name::<T>(),
        }),
    }
}

/// Read `key` from the environment as `T`, or `default` when unset.
pub fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    parse_or(key, std::env::var(key).ok(), default)
}

/// Read `key` as a whole number of seconds.
pub fn env_secs(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    env_or(key, default.as_secs()).map(Duration::from_secs)
}

/// Read `key` as a string, or `default` when unset or blank.
pub fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
