#![allow(dead_code)]

use async_trait::async_trait;
use seomap_core::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

pub const WEB_BASE: &str = "http://localhost:3000";

pub fn web_base() -> Url {
    Url::parse(WEB_BASE).unwrap()
}

/// Valid generated metadata as the provider would return it
pub fn valid_payload() -> String {
    serde_json::json!({
        "title": "Квартиры в Москве: цены и фото",
        "description": "Актуальные предложения квартир в Москве с фото, ценами и описанием районов.",
        "keywords": "квартиры, москва, купить",
        "ogTitle": "Квартиры в Москве",
        "ogDescription": "Подборка квартир в Москве: фото, цены, районы и удобный поиск."
    })
    .to_string()
}

/// What a scripted provider does on each call
pub enum Reply {
    Content(String),
    Fail,
    Hang,
}

/// Provider that counts calls and answers from a script
pub struct ScriptedProvider {
    reply: Reply,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetaProvider for ScriptedProvider {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Reply::Content(content) => Ok(content.clone()),
            Reply::Fail => Err(GenerationError::Status {
                status: 429,
                body: "quota exceeded".to_string(),
            }),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(valid_payload())
            }
        }
    }
}

/// Analytics source returning fixed rows, or failing
pub struct StubSource {
    rows: Option<Vec<PageMetrics>>,
    calls: AtomicUsize,
}

impl StubSource {
    pub fn with_rows(rows: Vec<PageMetrics>) -> Arc<Self> {
        Arc::new(Self {
            rows: Some(rows),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            rows: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalyticsSource for StubSource {
    async fn query_pages(&self, _query: &AnalyticsQuery) -> Result<Vec<PageMetrics>, AnalyticsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.rows
            .clone()
            .ok_or_else(|| AnalyticsError::Auth("no credentials".to_string()))
    }
}

pub fn row(path: &str, clicks: u64, position: f64, ctr: f64) -> PageMetrics {
    PageMetrics {
        page: format!("{}/{}", WEB_BASE, path),
        metrics: AnalyticsMetrics {
            clicks,
            impressions: clicks * 10,
            ctr,
            position,
        },
    }
}

pub fn fetcher_with(source: Arc<StubSource>) -> Arc<AnalyticsFetcher> {
    let settings = AnalyticsSettings::new(Some("sc-domain:example.com".to_string()), web_base());
    Arc::new(AnalyticsFetcher::new(Some(source), settings))
}
