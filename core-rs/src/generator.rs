//! Metadata generation with validation and heuristic fallback
//!
//! A cache miss costs at most one call to the generation service. Whatever the
//! service returns is parsed and validated; anything short of a valid
//! `SeoMeta` selects the heuristic instead. The accepted result is cached.

use crate::cache::ExpiringCache;
use crate::meta::{MetaValidationError, SeoMeta};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::form_urlencoded;

/// Bumped whenever the prompt or the `SeoMeta` shape changes
pub const META_SCHEMA_VERSION: &str = "v1";

/// Default lifetime of cached metadata (12 hours)
pub const DEFAULT_META_TTL: Duration = Duration::from_secs(43_200);

/// Default upper bound on a single generation call
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Model identifier used in cache keys when no provider is configured
const HEURISTIC_MODEL: &str = "heuristic";

const SYSTEM_PROMPT: &str = "You are an SEO assistant for a real estate landing page. \
    Return ONLY a JSON object with fields: title, description, keywords, ogTitle, ogDescription. \
    Language: Russian. Audience: buyers of real estate. \
    Constraints: title and ogTitle 10-120 chars, description and ogDescription 30-320 chars, \
    keywords 5-512 chars, natural language, no clickbait, include city and type context. \
    Keywords: comma-separated, include locality and property type.";

const USER_INSTRUCTIONS: &str = "Generate SEO meta for list page of real estate offers.";

/// Error type for a single generation attempt
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Provider request failed: {0}")]
    Transport(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Provider returned empty content")]
    EmptyContent,

    #[error("Provider did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Provider returned non-JSON content: {0}")]
    Unparsable(#[from] serde_json::Error),

    #[error("Generated metadata rejected: {0}")]
    Invalid(#[from] MetaValidationError),
}

/// One request to the generation service
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Instruction fixing language, field names and length limits
    pub system: String,
    /// JSON payload naming the city and type
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationRequest {
    pub fn for_page(city: &str, kind: &str) -> Self {
        let user = serde_json::json!({
            "city": city,
            "type": kind,
            "instructions": USER_INSTRUCTIONS,
        })
        .to_string();

        Self {
            system: SYSTEM_PROMPT.to_string(),
            user,
            temperature: 0.4,
            max_tokens: 300,
        }
    }
}

/// External text generation service
///
/// Implementations return the raw text of the first completion; parsing and
/// validation happen in the generator.
#[async_trait]
pub trait MetaProvider: Send + Sync {
    /// Model identifier, part of the cache key
    fn model(&self) -> &str;

    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Where a returned `SeoMeta` came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaSource {
    Cached,
    Generated,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaOutcome {
    pub meta: SeoMeta,
    pub source: MetaSource,
}

/// Cached, validated metadata generator
pub struct MetaGenerator {
    provider: Option<Arc<dyn MetaProvider>>,
    cache: ExpiringCache<SeoMeta>,
    ttl: Duration,
    timeout: Duration,
}

impl MetaGenerator {
    /// Create a generator. With no provider every miss uses the heuristic.
    pub fn new(provider: Option<Arc<dyn MetaProvider>>) -> Self {
        Self {
            provider,
            cache: ExpiringCache::new(),
            ttl: DEFAULT_META_TTL,
            timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        self.provider
            .as_deref()
            .map(|provider| provider.model())
            .unwrap_or(HEURISTIC_MODEL)
    }

    /// Cache key covering schema version, model and the lower-cased pair
    ///
    /// City and type are form-encoded so a `:` inside either cannot move the
    /// boundary between them.
    pub fn cache_key(&self, city: &str, kind: &str) -> String {
        format!(
            "meta:{}:{}:{}:{}",
            META_SCHEMA_VERSION,
            self.model(),
            key_part(city),
            key_part(kind)
        )
    }

    /// Metadata for a (city, type) pair. Never fails.
    pub async fn get_meta(&self, city: &str, kind: &str) -> SeoMeta {
        self.resolve(city, kind).await.meta
    }

    /// Like `get_meta`, also reporting which path produced the result
    pub async fn resolve(&self, city: &str, kind: &str) -> MetaOutcome {
        let key = self.cache_key(city, kind);
        if let Some(meta) = self.cache.get(&key) {
            debug!("Meta cache hit: {}", key);
            return MetaOutcome {
                meta,
                source: MetaSource::Cached,
            };
        }

        let outcome = match self.provider.as_deref() {
            None => {
                debug!("No generation provider configured, using heuristic for {}", key);
                MetaOutcome {
                    meta: SeoMeta::heuristic(city, kind),
                    source: MetaSource::Heuristic,
                }
            }
            Some(provider) => match self.generate(provider, city, kind).await {
                Ok(meta) => {
                    info!("Generated meta for {}/{} with {}", city, kind, provider.model());
                    MetaOutcome {
                        meta,
                        source: MetaSource::Generated,
                    }
                }
                Err(e) => {
                    warn!("Meta generation failed for {}/{}, using heuristic: {}", city, kind, e);
                    MetaOutcome {
                        meta: SeoMeta::heuristic(city, kind),
                        source: MetaSource::Heuristic,
                    }
                }
            },
        };

        self.cache.set(key, outcome.meta.clone(), self.ttl);
        outcome
    }

    async fn generate(
        &self,
        provider: &dyn MetaProvider,
        city: &str,
        kind: &str,
    ) -> Result<SeoMeta, GenerationError> {
        let request = GenerationRequest::for_page(city, kind);
        let content = tokio::time::timeout(self.timeout, provider.complete(&request))
            .await
            .map_err(|_| GenerationError::Timeout(self.timeout))??;

        if content.trim().is_empty() {
            return Err(GenerationError::EmptyContent);
        }

        let meta: SeoMeta = serde_json::from_str(&content)?;
        meta.validate()?;
        Ok(meta)
    }
}

fn key_part(value: &str) -> String {
    form_urlencoded::byte_serialize(value.to_lowercase().as_bytes()).collect()
}

impl std::fmt::Debug for MetaGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaGenerator")
            .field("model", &self.model())
            .field("cache", &self.cache)
            .field("ttl", &self.ttl)
            .field("timeout", &self.timeout)
            .finish()
    }
}
