//! Search Console analytics client

use super::truncate_body;
use async_trait::async_trait;
use reqwest::Client;
use seomap_core::{AnalyticsError, AnalyticsMetrics, AnalyticsQuery, AnalyticsSource, PageMetrics};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Token endpoint of the cloud metadata server for the default service account
pub const METADATA_TOKEN_URL: &str = "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

const READONLY_SCOPE: &str = "https://www.googleapis.com/auth/webmasters.readonly";

/// Where bearer tokens come from
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// A token supplied through configuration
    Static(String),
    /// Fetched from the metadata server on every query
    MetadataServer(Url),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody {
    start_date: String,
    end_date: String,
    dimensions: [&'static str; 1],
    row_limit: u32,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    rows: Vec<QueryRow>,
}

#[derive(Deserialize)]
struct QueryRow {
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    clicks: f64,
    #[serde(default)]
    impressions: f64,
    #[serde(default)]
    ctr: f64,
    #[serde(default)]
    position: f64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Analytics source backed by the Search Console `searchAnalytics.query` API
pub struct SearchConsoleSource {
    client: Client,
    api_base: Url,
    token: TokenSource,
}

impl SearchConsoleSource {
    pub fn new(api_base: Url, token: TokenSource, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        info!("Analytics source configured: api_base={}", api_base);
        Ok(Self {
            client,
            api_base,
            token,
        })
    }

    /// `{base}/sites/{site}/searchAnalytics/query` with the site percent-encoded
    fn query_url(&self, site_url: &str) -> Result<Url, AnalyticsError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| AnalyticsError::Malformed(format!("API base {} cannot carry a path", self.api_base)))?
            .pop_if_empty()
            .extend(["sites", site_url, "searchAnalytics", "query"]);
        Ok(url)
    }

    async fn access_token(&self) -> Result<String, AnalyticsError> {
        let token_url = match &self.token {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::MetadataServer(url) => url,
        };

        let response = self
            .client
            .get(token_url.clone())
            .query(&[("scopes", READONLY_SCOPE)])
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| AnalyticsError::Auth(format!("metadata server unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(AnalyticsError::Auth(format!(
                "metadata server returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AnalyticsError::Auth(format!("unreadable token response: {}", e)))?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl AnalyticsSource for SearchConsoleSource {
    async fn query_pages(&self, query: &AnalyticsQuery) -> Result<Vec<PageMetrics>, AnalyticsError> {
        let token = self.access_token().await?;
        let url = self.query_url(&query.site_url)?;
        let body = QueryBody {
            start_date: query.start_date.format("%Y-%m-%d").to_string(),
            end_date: query.end_date.format("%Y-%m-%d").to_string(),
            dimensions: ["page"],
            row_limit: query.row_limit,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalyticsError::Transport(Box::new(e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AnalyticsError::Auth(format!("analytics service returned {}", status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyticsError::Status {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| AnalyticsError::Malformed(e.to_string()))?;

        let rows: Vec<PageMetrics> = parsed
            .rows
            .into_iter()
            .filter_map(|row| {
                let page = row.keys.into_iter().next().filter(|page| !page.is_empty())?;
                Some(PageMetrics {
                    page,
                    metrics: AnalyticsMetrics::from_raw(row.clicks, row.impressions, row.ctr, row.position),
                })
            })
            .collect();

        debug!("Analytics query returned {} page rows", rows.len());
        Ok(rows)
    }
}

impl std::fmt::Debug for SearchConsoleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = match &self.token {
            TokenSource::Static(_) => "static".to_string(),
            TokenSource::MetadataServer(url) => url.to_string(),
        };
        f.debug_struct("SearchConsoleSource")
            .field("api_base", &self.api_base.as_str())
            .field("token", &token)
            .finish()
    }
}
