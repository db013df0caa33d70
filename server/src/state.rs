use crate::config::Config;
use crate::listings::{DemoListings, ListingsSource};
use crate::upstream::{OpenAiMetaProvider, SearchConsoleSource, TokenSource};
use crate::SeoState;
use seomap_core::{
    AnalyticsFetcher, AnalyticsSettings, AnalyticsSource, ExpiringCache, MetaGenerator,
    MetaProvider, SitemapRegistry,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use url::Url;

/// Upper bound on one analytics HTTP exchange
const ANALYTICS_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid metadata server URL: {0}")]
    TokenUrl(#[from] url::ParseError),
}

impl SeoState {
    /// Assemble the services and seed the sitemap registry
    pub fn new(
        generator: MetaGenerator,
        analytics: Arc<AnalyticsFetcher>,
        listings: Box<dyn ListingsSource>,
        web_base_url: Url,
    ) -> Self {
        let registry = SitemapRegistry::new(analytics.clone());
        registry.seed_defaults();
        Self {
            generator,
            registry,
            analytics,
            listings,
            web_base_url,
            cors_origin: None,
            sitemap_documents: ExpiringCache::new(),
            sitemap_revalidate: Duration::from_secs(3_600),
        }
    }

    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origin = Some(origin.into());
        self
    }

    pub fn with_sitemap_revalidate(mut self, window: Duration) -> Self {
        self.sitemap_revalidate = window;
        self
    }

    /// Build the production services described by `config`
    pub fn from_config(config: &Config) -> Result<Self, StateError> {
        let provider: Option<Arc<dyn MetaProvider>> = match &config.openai_api_key {
            Some(api_key) => Some(Arc::new(OpenAiMetaProvider::new(
                api_key.clone(),
                config.openai_model.clone(),
                &config.openai_base_url,
                config.generation_timeout,
            )?)),
            None => {
                info!("OPENAI_API_KEY not set, metadata will use heuristic templates");
                None
            }
        };
        let generator = MetaGenerator::new(provider)
            .with_ttl(config.meta_cache_ttl)
            .with_timeout(config.generation_timeout);

        let mut settings = AnalyticsSettings::new(config.gsc_site_url.clone(), config.web_base_url.clone());
        settings.lookback_days = config.gsc_lookback_days;
        settings.cache_ttl = config.gsc_cache_ttl;

        let source: Option<Arc<dyn AnalyticsSource>> = if settings.site_url.is_some() {
            let token = match &config.gsc_access_token {
                Some(token) => TokenSource::Static(token.clone()),
                None => TokenSource::MetadataServer(Url::parse(
                    crate::upstream::search_console::METADATA_TOKEN_URL,
                )?),
            };
            Some(Arc::new(SearchConsoleSource::new(
                config.gsc_api_base.clone(),
                token,
                ANALYTICS_HTTP_TIMEOUT,
            )?))
        } else {
            info!("GSC_SITE_URL not set, sitemap priorities will use stored defaults");
            None
        };
        let analytics = Arc::new(AnalyticsFetcher::new(source, settings));

        let listings = Box::new(DemoListings::new(config.web_base_url.clone()));

        Ok(Self::new(generator, analytics, listings, config.web_base_url.clone())
            .with_cors_origin(config.cors_origin.clone())
            .with_sitemap_revalidate(config.sitemap_revalidate))
    }
}
