pub mod config;
pub mod listings;
pub mod pages;
pub mod server;
pub mod state;
pub mod upstream;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use listings::{DemoListings, ListingsSource};
pub use state::StateError;

use seomap_core::{AnalyticsFetcher, ExpiringCache, MetaGenerator, SitemapRegistry};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub type AppState = Arc<SeoState>;

pub struct SeoState {
    pub generator: MetaGenerator,
    pub registry: SitemapRegistry,
    pub analytics: Arc<AnalyticsFetcher>,
    pub listings: Box<dyn ListingsSource>,
    pub web_base_url: Url,
    pub cors_origin: Option<String>,
    // Rendered sitemap.xml, regenerated at most once per window
    pub sitemap_documents: ExpiringCache<String>,
    pub sitemap_revalidate: Duration,
}

impl std::fmt::Debug for SeoState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeoState")
            .field("generator", &self.generator)
            .field("registry", &self.registry)
            .field("listings", &"<dyn ListingsSource>")
            .field("web_base_url", &self.web_base_url.as_str())
            .field("cors_origin", &self.cors_origin)
            .field("sitemap_revalidate", &self.sitemap_revalidate)
            .finish()
    }
}

#[cfg(test)]
mod server_test;
