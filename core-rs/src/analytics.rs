//! Search analytics for known pages
//!
//! One batched query per (site, lookback window) fetches per-page metrics; the
//! batch is cached for a short TTL. Any failure makes the whole lookup
//! `Unavailable` so callers can tell "no data at all" from "no data for this
//! page".

use crate::cache::ExpiringCache;
use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

/// Largest row count the analytics service accepts in one query
pub const MAX_ROW_LIMIT: u32 = 25_000;

pub const DEFAULT_LOOKBACK_DAYS: u32 = 28;

/// Default lifetime of a cached batch (30 minutes)
pub const DEFAULT_ANALYTICS_TTL: Duration = Duration::from_secs(1_800);

/// Error type for analytics retrieval
#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Request failed: {0}")]
    Transport(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("Analytics service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed analytics response: {0}")]
    Malformed(String),

    #[error("Cannot resolve page path {path:?}: {source}")]
    InvalidPath {
        path: String,
        source: url::ParseError,
    },
}

/// Search metrics for one page over the lookback window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalyticsMetrics {
    pub clicks: u64,
    pub impressions: u64,
    /// Click-through rate in [0, 1]
    pub ctr: f64,
    /// Average search result position, 0 when unknown
    pub position: f64,
}

impl AnalyticsMetrics {
    /// Build metrics from raw service values, clamping noise into range
    pub fn from_raw(clicks: f64, impressions: f64, ctr: f64, position: f64) -> Self {
        Self {
            clicks: non_negative(clicks).round() as u64,
            impressions: non_negative(impressions).round() as u64,
            ctr: non_negative(ctr).min(1.0),
            position: non_negative(position),
        }
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

/// One row returned by the analytics service
#[derive(Debug, Clone, PartialEq)]
pub struct PageMetrics {
    /// Absolute page URL as reported by the service
    pub page: String,
    pub metrics: AnalyticsMetrics,
}

/// Parameters of one batched analytics query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsQuery {
    pub site_url: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub row_limit: u32,
}

/// External search analytics service
#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    /// Fetch per-page rows for the query's site and date range
    async fn query_pages(&self, query: &AnalyticsQuery) -> Result<Vec<PageMetrics>, AnalyticsError>;
}

/// Result of resolving a set of paths against the analytics batch
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsLookup {
    /// No analytics for any page (not configured, or the fetch failed)
    Unavailable,
    /// Metrics per requested path; `None` when the page has no recorded traffic
    Resolved(HashMap<String, Option<AnalyticsMetrics>>),
}

impl MetricsLookup {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, MetricsLookup::Unavailable)
    }

    /// Metrics for a path, `None` both when absent and when unavailable
    pub fn metrics_for(&self, path: &str) -> Option<&AnalyticsMetrics> {
        match self {
            MetricsLookup::Unavailable => None,
            MetricsLookup::Resolved(map) => map.get(path).and_then(Option::as_ref),
        }
    }
}

/// Settings for the analytics fetcher
#[derive(Debug, Clone)]
pub struct AnalyticsSettings {
    /// Site identity as registered with the analytics service
    pub site_url: Option<String>,
    /// Public base URL pages are served under
    pub base_url: Url,
    pub lookback_days: u32,
    pub cache_ttl: Duration,
    pub row_limit: u32,
}

impl AnalyticsSettings {
    pub fn new(site_url: Option<String>, base_url: Url) -> Self {
        Self {
            site_url: site_url.filter(|site| !site.trim().is_empty()),
            base_url,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            cache_ttl: DEFAULT_ANALYTICS_TTL,
            row_limit: MAX_ROW_LIMIT,
        }
    }
}

type PageMap = Arc<HashMap<String, AnalyticsMetrics>>;

/// Cached, batched analytics lookups
pub struct AnalyticsFetcher {
    source: Option<Arc<dyn AnalyticsSource>>,
    settings: AnalyticsSettings,
    cache: ExpiringCache<PageMap>,
}

impl AnalyticsFetcher {
    pub fn new(source: Option<Arc<dyn AnalyticsSource>>, settings: AnalyticsSettings) -> Self {
        Self {
            source,
            settings,
            cache: ExpiringCache::new(),
        }
    }

    /// A fetcher with nothing configured; every lookup is `Unavailable`
    pub fn disabled(base_url: Url) -> Self {
        Self::new(None, AnalyticsSettings::new(None, base_url))
    }

    /// Resolve each relative path to its metrics
    pub async fn fetch_metrics(&self, paths: &[String]) -> MetricsLookup {
        let (Some(site_url), Some(source)) = (&self.settings.site_url, self.source.as_deref()) else {
            debug!("Analytics not configured, skipping metrics lookup");
            return MetricsLookup::Unavailable;
        };

        match self.resolve_paths(site_url, source, paths).await {
            Ok(resolved) => MetricsLookup::Resolved(resolved),
            Err(e) => {
                warn!("Analytics unavailable for {}: {}", site_url, e);
                MetricsLookup::Unavailable
            }
        }
    }

    /// Absolute URL a relative path is served under
    pub fn page_url(&self, path: &str) -> Result<Url, AnalyticsError> {
        let relative = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        self.settings
            .base_url
            .join(&relative)
            .map_err(|source| AnalyticsError::InvalidPath {
                path: path.to_string(),
                source,
            })
    }

    /// Forget the cached batch so the next lookup queries again
    pub fn invalidate(&self) {
        if let Some(site_url) = &self.settings.site_url {
            self.cache.delete(&self.cache_key(site_url));
        }
    }

    fn cache_key(&self, site_url: &str) -> String {
        format!("gsc:{}:{}", site_url, self.settings.lookback_days)
    }

    async fn resolve_paths(
        &self,
        site_url: &str,
        source: &dyn AnalyticsSource,
        paths: &[String],
    ) -> Result<HashMap<String, Option<AnalyticsMetrics>>, AnalyticsError> {
        let pages = self.page_metrics(site_url, source).await?;

        let mut resolved = HashMap::with_capacity(paths.len());
        for path in paths {
            let url = self.page_url(path)?;
            resolved.insert(path.clone(), pages.get(url.as_str()).copied());
        }
        Ok(resolved)
    }

    async fn page_metrics(
        &self,
        site_url: &str,
        source: &dyn AnalyticsSource,
    ) -> Result<PageMap, AnalyticsError> {
        let key = self.cache_key(site_url);
        if let Some(pages) = self.cache.get(&key) {
            debug!("Analytics cache hit: {}", key);
            return Ok(pages);
        }

        let query = self.build_query(site_url);
        info!(
            "Querying analytics for {} ({} to {})",
            site_url, query.start_date, query.end_date
        );
        let rows = source.query_pages(&query).await?;

        let mut pages = HashMap::with_capacity(rows.len());
        for row in rows {
            if row.page.is_empty() {
                continue;
            }
            pages.insert(row.page, row.metrics);
        }
        debug!("Fetched analytics for {} pages", pages.len());

        let pages = Arc::new(pages);
        self.cache.set(key, pages.clone(), self.settings.cache_ttl);
        Ok(pages)
    }

    fn build_query(&self, site_url: &str) -> AnalyticsQuery {
        let end_date = Utc::now().date_naive();
        let start_date = end_date
            .checked_sub_days(Days::new(u64::from(self.settings.lookback_days)))
            .unwrap_or(NaiveDate::MIN);
        AnalyticsQuery {
            site_url: site_url.to_string(),
            start_date,
            end_date,
            row_limit: self.settings.row_limit.min(MAX_ROW_LIMIT),
        }
    }
}

impl std::fmt::Debug for AnalyticsFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsFetcher")
            .field("source", &self.source.as_ref().map(|_| "<dyn AnalyticsSource>"))
            .field("settings", &self.settings)
            .field("cache", &self.cache)
            .finish()
    }
}
