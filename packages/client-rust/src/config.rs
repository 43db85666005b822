//! Client configuration.

use std::time::Duration;

use crate::cache::QueryOptions;

/// Default API origin, matching a locally running backend.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Environment variable overriding [`ClientConfig::base_url`].
pub const API_URL_ENV: &str = "CROSSPOINT_API_URL";

/// Environment variable overriding [`ClientConfig::request_timeout`] (milliseconds).
pub const REQUEST_TIMEOUT_ENV: &str = "CROSSPOINT_REQUEST_TIMEOUT_MS";

/// Top-level configuration for a [`CrossPoint`](crate::CrossPoint) client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API origin without a trailing slash.
    pub base_url: String,
    /// Maximum time for a single HTTP request, enforced by the transport pipeline.
    pub request_timeout: Duration,
    /// Freshness policy for queries that do not specify their own.
    pub default_query: QueryOptions,
    /// Interval between cache garbage collection sweeps in milliseconds.
    pub gc_interval_ms: u64,
    /// Initial search page size; "load more" grows by the same amount.
    pub search_page_size: usize,
    /// Rows requested per explore category.
    pub explore_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            default_query: QueryOptions::default(),
            gc_interval_ms: 60_000,
            search_page_size: 50,
            explore_limit: 20,
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `CROSSPOINT_API_URL` and `CROSSPOINT_REQUEST_TIMEOUT_MS`.
    ///
    /// Unparseable timeout values are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup(API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            config = config.with_base_url(url);
        }
        if let Some(raw) = lookup(REQUEST_TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.request_timeout = Duration::from_millis(ms),
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid {REQUEST_TIMEOUT_ENV}"),
            }
        }
        config
    }

    /// Sets the API origin, dropping any trailing slash.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Absolute URL for an API path such as `/games/42`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn client_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.gc_interval_ms, 60_000);
        assert_eq!(config.search_page_size, 50);
        assert_eq!(config.explore_limit, 20);
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            (API_URL_ENV, "https://api.example.com/"),
            (REQUEST_TIMEOUT_ENV, "1500"),
        ]
        .into_iter()
        .collect();
        let config = ClientConfig::from_lookup(|k| env.get(k).map(ToString::to_string));
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.request_timeout, Duration::from_millis(1500));
        assert_eq!(config.url("/games/1"), "https://api.example.com/games/1");
    }

    #[test]
    fn invalid_timeout_keeps_default() {
        let config = ClientConfig::from_lookup(|k| {
            (k == REQUEST_TIMEOUT_ENV).then(|| "soon".to_string())
        });
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }
}
