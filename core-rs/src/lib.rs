pub mod analytics;
pub mod cache;
pub mod generator;
pub mod meta;
pub mod registry;
pub mod scoring;

pub use analytics::{
    AnalyticsError, AnalyticsFetcher, AnalyticsMetrics, AnalyticsQuery, AnalyticsSettings,
    AnalyticsSource, MetricsLookup, PageMetrics,
};
pub use cache::ExpiringCache;
pub use generator::{
    GenerationError, GenerationRequest, MetaGenerator, MetaOutcome, MetaProvider, MetaSource,
};
pub use meta::{MetaValidationError, SeoMeta};
pub use registry::{SitemapEntry, SitemapRegistry};
pub use scoring::{ChangeFreq, Score};
