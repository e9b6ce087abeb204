//! API server configuration.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use crm_core::auth::jwt::{DEFAULT_TOKEN_TTL_HOURS, SecretError, resolve_jwt_secret};
use thiserror::Error;

/// Deployment mode. Production refuses weak signing secrets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "dev" | "development" => Ok(Environment::Development),
            "prod" | "production" => Ok(Environment::Production),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }
}

/// Startup misconfiguration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("CRM_ENV must be 'development' or 'production', got '{0}'")]
    InvalidEnvironment(String),

    #[error("SESSION_TTL_HOURS must be a positive integer, got '{0}'")]
    InvalidTtl(String),

    #[error(transparent)]
    Secret(#[from] SecretError),
}

/// Configuration for the API server.
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    pub environment: Environment,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Lifetime of issued tokens and their sessions.
    pub session_ttl: Duration,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("pg_connection_url", &self.pg_connection_url)
            .field("environment", &self.environment)
            .field("jwt_secret", &"<redacted>")
            .field("session_ttl", &self.session_ttl)
            .finish()
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable            | Default                           |
    /// |---------------------|-----------------------------------|
    /// | `BIND_ADDR`         | `127.0.0.1:3100`                  |
    /// | `DATABASE_URL`      | `postgres://localhost:5432/crm`   |
    /// | `CRM_ENV`           | `development`                     |
    /// | `JWT_SECRET`        | required in production            |
    /// | `SESSION_TTL_HOURS` | `24`                              |
    pub fn from_env() -> Result<Self, ConfigError> {
        let var = |name: &str| std::env::var(name).ok();
        Self::from_vars(var)
    }

    /// Same as [`ApiConfig::from_env`] over an arbitrary variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let environment = var("CRM_ENV")
            .map(|v| v.parse::<Environment>())
            .transpose()?
            .unwrap_or_default();

        let session_ttl = match var("SESSION_TTL_HOURS") {
            None => Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(hours) if hours > 0 => Duration::hours(hours),
                _ => return Err(ConfigError::InvalidTtl(raw)),
            },
        };

        let jwt_secret = resolve_jwt_secret(
            var("JWT_SECRET").as_deref(),
            environment == Environment::Production,
        )?;

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3100".into()),
            pg_connection_url: var("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost:5432/crm".into()),
            environment,
            jwt_secret,
            session_ttl,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_in_development() {
        let config = ApiConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.bind_addr, "127.0.0.1:3100");
        assert_eq!(config.session_ttl, Duration::hours(24));
        assert_eq!(config.jwt_secret.len(), 64);
    }

    #[test]
    fn production_without_secret_refuses_to_start() {
        let err = ApiConfig::from_vars(vars(&[("CRM_ENV", "production")])).unwrap_err();
        assert!(matches!(err, ConfigError::Secret(SecretError::Missing)));
    }

    #[test]
    fn production_with_strong_secret() {
        let secret = "s".repeat(48);
        let config = ApiConfig::from_vars(vars(&[
            ("CRM_ENV", "prod"),
            ("JWT_SECRET", secret.as_str()),
            ("SESSION_TTL_HOURS", "8"),
        ]))
        .unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.jwt_secret, secret);
        assert_eq!(config.session_ttl, Duration::hours(8));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            ApiConfig::from_vars(vars(&[("CRM_ENV", "staging")])),
            Err(ConfigError::InvalidEnvironment(_))
        ));
        assert!(matches!(
            ApiConfig::from_vars(vars(&[("SESSION_TTL_HOURS", "0")])),
            Err(ConfigError::InvalidTtl(_))
        ));
    }

    #[test]
    fn debug_redacts_secret() {
        let config = ApiConfig::from_vars(vars(&[("JWT_SECRET", "hunter2")])).unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
