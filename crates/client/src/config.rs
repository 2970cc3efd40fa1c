//! Client configuration from the environment.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use salesdesk_observability::LogFormat;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:54321";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub backend_url: String,
    pub api_key: Option<String>,
    /// Upper bound on the connectivity probe. Bulk fetches are not bounded by it.
    pub probe_timeout: Duration,
    /// Optional HTTP timeout for every request, bulk fetches included.
    pub request_timeout: Option<Duration>,
    pub check_interval: Duration,
    /// Age after which the periodic check re-syncs on its own.
    pub stale_after: Duration,
    /// Overrides the default `{data_dir}/salesdesk/mirror.db`.
    pub cache_db: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            api_key: None,
            probe_timeout: Duration::from_secs(5),
            request_timeout: None,
            check_interval: Duration::from_secs(60),
            stale_after: Duration::from_secs(60 * 60),
            cache_db: None,
            log_format: LogFormat::Json,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("{var} must be an http(s) URL, got {value:?}")]
    InvalidUrl { var: &'static str, value: String },
    #[error("SALESDESK_LOG_FORMAT: {0}")]
    InvalidLogFormat(String),
}

impl ClientConfig {
    /// Read `SALESDESK_*` variables, falling back to defaults for unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend_url = match get("SALESDESK_BACKEND_URL") {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => url,
            Some(url) => {
                return Err(ConfigError::InvalidUrl {
                    var: "SALESDESK_BACKEND_URL",
                    value: url,
                });
            }
            None => defaults.backend_url,
        };

        let number = |var: &'static str| -> Result<Option<u64>, ConfigError> {
            match get(var) {
                None => Ok(None),
                Some(value) => value
                    .trim()
                    .parse::<u64>()
                    .map(Some)
                    .map_err(|_| ConfigError::InvalidNumber { var, value }),
            }
        };

        let log_format = match get("SALESDESK_LOG_FORMAT") {
            Some(value) => value.parse().map_err(ConfigError::InvalidLogFormat)?,
            None => defaults.log_format,
        };

        Ok(Self {
            backend_url,
            api_key: get("SALESDESK_API_KEY"),
            probe_timeout: number("SALESDESK_PROBE_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.probe_timeout),
            request_timeout: number("SALESDESK_REQUEST_TIMEOUT_SECS")?.map(Duration::from_secs),
            check_interval: number("SALESDESK_CHECK_INTERVAL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.check_interval),
            stale_after: number("SALESDESK_STALE_AFTER_MINS")?
                .map(|m| Duration::from_secs(m * 60))
                .unwrap_or(defaults.stale_after),
            cache_db: get("SALESDESK_CACHE_DB").map(PathBuf::from),
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn values_are_parsed() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("SALESDESK_BACKEND_URL", "https://abc.example.co"),
            ("SALESDESK_API_KEY", "anon"),
            ("SALESDESK_PROBE_TIMEOUT_MS", "1500"),
            ("SALESDESK_CHECK_INTERVAL_SECS", "30"),
            ("SALESDESK_STALE_AFTER_MINS", "5"),
            ("SALESDESK_CACHE_DB", "/tmp/m.db"),
            ("SALESDESK_LOG_FORMAT", "pretty"),
        ]))
        .unwrap();

        assert_eq!(config.backend_url, "https://abc.example.co");
        assert_eq!(config.api_key.as_deref(), Some("anon"));
        assert_eq!(config.probe_timeout, Duration::from_millis(1500));
        assert_eq!(config.check_interval, Duration::from_secs(30));
        assert_eq!(config.stale_after, Duration::from_secs(300));
        assert_eq!(config.cache_db, Some(PathBuf::from("/tmp/m.db")));
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.request_timeout, None);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = ClientConfig::from_lookup(lookup(&[("SALESDESK_API_KEY", "  ")])).unwrap();
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn bad_number_is_reported_with_its_variable() {
        let err = ClientConfig::from_lookup(lookup(&[("SALESDESK_PROBE_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                var: "SALESDESK_PROBE_TIMEOUT_MS",
                value: "soon".into()
            }
        );
    }

    #[test]
    fn non_http_backend_url_is_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[("SALESDESK_BACKEND_URL", "ftp://x")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }
}
