//! Process configuration read from the environment.

use std::fmt::Display;
use std::fs::read_to_string;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::rate_limit::{Quota, QuotaParseError};
use crate::upstream::RetryPolicy;
use crate::Secret;

const SECRETS_DIR: &str = "/run/secrets";

/// Configuration errors reported at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required key was neither in the environment nor in the secrets directory.
    #[error("{0} is not set")]
    Missing(&'static str),

    /// A key was present but could not be parsed.
    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
        /// Parser message.
        reason: String,
    },

    /// A rate-limit string could not be parsed.
    #[error("invalid {key}: {source}")]
    Quota {
        /// Variable name.
        key: &'static str,
        /// Parser error.
        source: QuotaParseError,
    },
}

/// Where search results are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// In-process vector; nothing survives a restart.
    Memory,
    /// SQLite database at the given `sqlite:` url.
    Sqlite(String),
}

/// Everything the binary needs to start serving.
#[derive(Debug)]
pub struct Config {
    /// Listen address (`BIND_ADDR`).
    pub bind_addr: SocketAddr,
    /// Upstream search endpoint (`UPSTREAM_URL`).
    pub upstream_url: String,
    /// Bearer credential for the upstream (`UPSTREAM_API_KEY`).
    pub upstream_api_key: Secret<String>,
    /// Result persistence (`DATABASE_URL`).
    pub storage: StorageBackend,
    /// Items requested per search (`RESULT_LIMIT`).
    pub result_limit: u32,
    /// Upstream retry behaviour.
    pub retry: RetryPolicy,
    /// Longest accepted query (`MAX_QUERY_LEN`).
    pub max_query_len: usize,
    /// Quotas applied to every route (`RATE_LIMIT_DEFAULT`).
    pub default_limits: Vec<Quota>,
    /// Extra quotas for `/search` (`RATE_LIMIT_SEARCH`).
    pub search_limits: Vec<Quota>,
    /// Maximum number of tracked sessions (`SESSION_CAPACITY`).
    pub session_capacity: usize,
}

impl Config {
    /// Reads the configuration from the process environment, falling back to
    /// `/run/secrets/<NAME>` for the API key.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the API key is absent or a value is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), read_secret)
    }

    /// Builds the configuration from arbitrary lookups.
    ///
    /// `env` answers plain variables; `secret` is consulted for the API key
    /// when `env` has none.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn from_lookup<E, S>(env: E, secret: S) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
        S: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup: &env };

        let upstream_api_key = env("UPSTREAM_API_KEY")
            .or_else(|| secret("UPSTREAM_API_KEY"))
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::Missing("UPSTREAM_API_KEY"))?;

        let database_url: String = vars.parse("DATABASE_URL", "sqlite://products.db")?;
        let storage = if database_url.eq_ignore_ascii_case("memory") {
            StorageBackend::Memory
        } else {
            StorageBackend::Sqlite(database_url)
        };

        let retry = RetryPolicy {
            max_attempts: vars.parse_with("RETRY_MAX_ATTEMPTS", "3", positive)?,
            delay: Duration::from_millis(vars.parse("RETRY_DELAY_MS", "2000")?),
            attempt_timeout: vars
                .optional::<u64>("UPSTREAM_TIMEOUT_MS")?
                .map(Duration::from_millis),
        };

        Ok(Self {
            bind_addr: vars.parse("BIND_ADDR", "127.0.0.1:5000")?,
            upstream_url: vars.parse(
                "UPSTREAM_URL",
                "https://api.ebay.com/buy/browse/v1/item_summary/search",
            )?,
            upstream_api_key: Secret::new(upstream_api_key),
            storage,
            result_limit: vars.parse_with("RESULT_LIMIT", "10", positive)?,
            retry,
            max_query_len: vars.parse_with("MAX_QUERY_LEN", "256", positive)?,
            default_limits: vars.quotas("RATE_LIMIT_DEFAULT", "100 per day; 10 per minute")?,
            search_limits: vars.quotas("RATE_LIMIT_SEARCH", "10 per minute")?,
            session_capacity: vars.parse_with("SESSION_CAPACITY", "10000", positive)?,
        })
    }
}

struct Vars<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Vars<'_> {
    fn raw(&self, key: &'static str, default: &str) -> String {
        (self.lookup)(key).unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
    }

    fn parse<T: FromStr>(&self, key: &'static str, default: &str) -> Result<T, ConfigError>
    where
        T::Err: Display,
    {
        self.parse_with(key, default, |_| Ok(()))
    }

    fn parse_with<T: FromStr>(
        &self,
        key: &'static str,
        default: &str,
        check: impl Fn(&T) -> Result<(), &'static str>,
    ) -> Result<T, ConfigError>
    where
        T::Err: Display,
    {
        let value = self.raw(key, default);
        let parsed = value
            .trim()
            .parse::<T>()
            .map_err(|e| e.to_string())
            .and_then(|v| check(&v).map(|()| v).map_err(str::to_string));

        parsed.map_err(|reason| {
            warn!("Invalid {key} value: {reason}");
            ConfigError::Invalid { key, value, reason }
        })
    }

    fn optional<T: FromStr>(&self, key: &'static str) -> Result<Option<T>, ConfigError>
    where
        T::Err: Display,
    {
        match (self.lookup)(key) {
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|e: T::Err| ConfigError::Invalid {
                    key,
                    reason: e.to_string(),
                    value,
                }),
            None => Ok(None),
        }
    }

    fn quotas(&self, key: &'static str, default: &str) -> Result<Vec<Quota>, ConfigError> {
        Quota::parse_list(&self.raw(key, default)).map_err(|source| ConfigError::Quota { key, source })
    }
}

fn positive<T: PartialEq + Default>(value: &T) -> Result<(), &'static str> {
    if *value == T::default() {
        Err("must be greater than zero")
    } else {
        Ok(())
    }
}

fn read_secret(name: &str) -> Option<String> {
    let path = format!("{SECRETS_DIR}/{name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {name} from {SECRETS_DIR}: {e}");
        })
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn no_secrets(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = Config::from_lookup(env_of(&[("UPSTREAM_API_KEY", "k")]), no_secrets)
            .expect("valid config");

        assert_eq!(config.bind_addr, "127.0.0.1:5000".parse().unwrap());
        assert_eq!(
            config.upstream_url,
            "https://api.ebay.com/buy/browse/v1/item_summary/search"
        );
        assert_eq!(config.upstream_api_key.expose_secret(), "k");
        assert_eq!(
            config.storage,
            StorageBackend::Sqlite("sqlite://products.db".to_string())
        );
        assert_eq!(config.result_limit, 10);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.max_query_len, 256);
        assert_eq!(
            config.default_limits,
            vec![Quota::per_day(100), Quota::per_minute(10)]
        );
        assert_eq!(config.search_limits, vec![Quota::per_minute(10)]);
        assert_eq!(config.session_capacity, 10_000);
    }

    #[test]
    fn missing_key_is_an_error() {
        let result = Config::from_lookup(env_of(&[]), no_secrets);
        assert!(matches!(result, Err(ConfigError::Missing("UPSTREAM_API_KEY"))));
    }

    #[test]
    fn blank_key_is_treated_as_missing() {
        let result = Config::from_lookup(env_of(&[("UPSTREAM_API_KEY", "  ")]), no_secrets);
        assert!(matches!(result, Err(ConfigError::Missing(_))));
    }

    #[test]
    fn key_can_come_from_secrets() {
        let config = Config::from_lookup(env_of(&[]), |name| {
            (name == "UPSTREAM_API_KEY").then(|| "from-file\n".to_string())
        })
        .expect("secret provides key");

        assert_eq!(config.upstream_api_key.expose_secret(), "from-file");
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(
            env_of(&[
                ("UPSTREAM_API_KEY", "k"),
                ("BIND_ADDR", "0.0.0.0:8080"),
                ("DATABASE_URL", "memory"),
                ("RETRY_MAX_ATTEMPTS", "5"),
                ("RETRY_DELAY_MS", "0"),
                ("UPSTREAM_TIMEOUT_MS", "1500"),
                ("RATE_LIMIT_SEARCH", "2/second"),
            ]),
            no_secrets,
        )
        .expect("valid overrides");

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.delay, Duration::ZERO);
        assert_eq!(config.retry.attempt_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.search_limits, vec![Quota::per_second(2)]);
    }

    #[test]
    fn invalid_numbers_are_reported_with_key() {
        let err = Config::from_lookup(
            env_of(&[("UPSTREAM_API_KEY", "k"), ("RESULT_LIMIT", "ten")]),
            no_secrets,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { key: "RESULT_LIMIT", .. }));
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let err = Config::from_lookup(
            env_of(&[("UPSTREAM_API_KEY", "k"), ("RETRY_MAX_ATTEMPTS", "0")]),
            no_secrets,
        )
        .unwrap_err();

        assert!(err.to_string().contains("RETRY_MAX_ATTEMPTS"));
    }

    #[test]
    fn invalid_quota_is_reported() {
        let err = Config::from_lookup(
            env_of(&[("UPSTREAM_API_KEY", "k"), ("RATE_LIMIT_DEFAULT", "lots per day")]),
            no_secrets,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Quota { key: "RATE_LIMIT_DEFAULT", .. }));
    }

    #[test]
    fn debug_does_not_leak_key() {
        let config = Config::from_lookup(env_of(&[("UPSTREAM_API_KEY", "sk-live")]), no_secrets)
            .expect("valid config");

        assert!(!format!("{:?}", config).contains("sk-live"));
    }
}
