pub mod tracing;

use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },
}

/// Application environment
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Reads `APP_ENV`, defaulting to development when unset or unknown.
    pub fn from_env() -> Self {
        Self::explicit_from_env().unwrap_or(Environment::Development)
    }

    /// Reads `APP_ENV` without applying a default.
    ///
    /// Returns `None` unless the variable is set to `development` or
    /// `production` (case-insensitive). Use this for decisions that must
    /// only happen when an operator opted in, such as relaxing certificate
    /// validation for a local mail relay.
    pub fn explicit_from_env() -> Option<Self> {
        let app_env = env::var("APP_ENV").ok()?;

        if app_env.eq_ignore_ascii_case("production") {
            Some(Environment::Production)
        } else if app_env.eq_ignore_ascii_case("development") {
            Some(Environment::Development)
        } else {
            None
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Trait for configuration that can be loaded from environment variables
pub trait FromEnv: Sized {
    fn from_env() -> Result<Self, ConfigError>;
}

/// Helper to load an environment variable with a default value.
///
/// Blank values fall back to the default, like unset ones.
pub fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

/// Reads an environment variable, treating blank values as unset.
pub fn env_optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parses an environment variable, falling back to `default` when it is unset.
///
/// A value that is present but does not parse is an error rather than a
/// silent fallback.
pub fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_optional(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::ParseError {
            key: key.to_string(),
            details: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Interprets `1`, `true`, `yes` and `on` (case-insensitive) as true.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
