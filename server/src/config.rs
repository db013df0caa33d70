//! Process configuration from environment variables
//!
//! Absent provider credentials or site identity are valid: they select the
//! heuristic-only and analytics-unavailable modes respectively.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{key} must be a non-negative integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} must be a valid URL, got {value:?}: {source}")]
    InvalidUrl {
        key: &'static str,
        value: String,
        source: url::ParseError,
    },

    #[error("{key} must be a socket address, got {value:?}")]
    InvalidAddr { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: Url,
    pub meta_cache_ttl: Duration,
    pub generation_timeout: Duration,
    pub gsc_site_url: Option<String>,
    pub gsc_lookback_days: u32,
    pub gsc_cache_ttl: Duration,
    pub gsc_access_token: Option<String>,
    pub gsc_api_base: Url,
    pub web_base_url: Url,
    pub cors_origin: String,
    pub sitemap_revalidate: Duration,
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let string = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let seconds = |key: &'static str, default: u64| -> Result<Duration, ConfigError> {
            match get(key) {
                None => Ok(Duration::from_secs(default)),
                Some(value) => value
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| ConfigError::InvalidNumber { key, value }),
            }
        };

        let url = |key: &'static str, default: &str| -> Result<Url, ConfigError> {
            let value = string(key, default);
            Url::parse(&value).map_err(|source| ConfigError::InvalidUrl { key, value, source })
        };

        let bind_addr = {
            let value = string("SEOMAP_BIND_ADDR", "127.0.0.1:4000");
            value
                .parse::<SocketAddr>()
                .map_err(|_| ConfigError::InvalidAddr {
                    key: "SEOMAP_BIND_ADDR",
                    value,
                })?
        };

        let gsc_lookback_days = match get("GSC_LOOKBACK_DAYS") {
            None => 28,
            Some(value) => value.parse::<u32>().map_err(|_| ConfigError::InvalidNumber {
                key: "GSC_LOOKBACK_DAYS",
                value,
            })?,
        };

        Ok(Self {
            bind_addr,
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: string("OPENAI_MODEL", "gpt-4o-mini"),
            openai_base_url: url("OPENAI_BASE_URL", "https://api.openai.com/v1")?,
            meta_cache_ttl: seconds("META_CACHE_TTL_SECONDS", 43_200)?,
            generation_timeout: seconds("GENERATION_TIMEOUT_SECONDS", 5)?,
            gsc_site_url: get("GSC_SITE_URL"),
            gsc_lookback_days,
            gsc_cache_ttl: seconds("GSC_CACHE_TTL_SECONDS", 1_800)?,
            gsc_access_token: get("GSC_ACCESS_TOKEN"),
            gsc_api_base: url("GSC_API_BASE", "https://www.googleapis.com/webmasters/v3")?,
            web_base_url: url("WEB_BASE_URL", "http://localhost:3000")?,
            cors_origin: string("CORS_ORIGIN", "http://localhost:3000"),
            sitemap_revalidate: seconds("SITEMAP_REVALIDATE_SECONDS", 3_600)?,
        })
    }
}
