//! In-memory sitemap registry
//!
//! Seed entries plus every path discovered through the metadata pipeline, in
//! insertion order and unique by path. Priorities stored here are defaults;
//! readers get values recomputed from analytics when analytics are available.

use crate::analytics::{AnalyticsFetcher, MetricsLookup};
use crate::scoring::{self, ChangeFreq};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Paths present from process start
pub const SEED_PATHS: [&str; 2] = ["moskva/kvartiry", "spb/kvartiry"];

const SEED_PRIORITY: f64 = 0.8;
const SEED_CHANGEFREQ: ChangeFreq = ChangeFreq::Daily;

const DEFAULT_PRIORITY: f64 = 0.5;
const DEFAULT_CHANGEFREQ: ChangeFreq = ChangeFreq::Weekly;

/// A page known to the sitemap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapEntry {
    /// Relative path without a leading slash
    pub path: String,
    pub priority: f64,
    pub changefreq: ChangeFreq,
    pub last_modified: DateTime<Utc>,
}

pub struct SitemapRegistry {
    entries: Mutex<Vec<SitemapEntry>>,
    fetcher: Arc<AnalyticsFetcher>,
}

impl SitemapRegistry {
    /// Create an empty registry; see `seed_defaults`
    pub fn new(fetcher: Arc<AnalyticsFetcher>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            fetcher,
        }
    }

    /// Insert the fixed seed entries that are not already present
    pub fn seed_defaults(&self) {
        let now = Utc::now();
        let mut entries = self.lock();
        for path in SEED_PATHS {
            if entries.iter().any(|e| e.path == path) {
                continue;
            }
            entries.push(SitemapEntry {
                path: path.to_string(),
                priority: SEED_PRIORITY,
                changefreq: SEED_CHANGEFREQ,
                last_modified: now,
            });
        }
        info!("Seeded sitemap registry with {} entries", entries.len());
    }

    /// All known paths, in insertion order
    pub fn list_paths(&self) -> Vec<String> {
        self.lock().iter().map(|e| e.path.clone()).collect()
    }

    /// Snapshot of the stored entries, without analytics applied
    pub fn entries(&self) -> Vec<SitemapEntry> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Touch an existing path or register a new one with default hints
    pub fn add_or_update_entry(&self, path: &str) -> SitemapEntry {
        let path = path.trim_start_matches('/');
        let now = Utc::now();
        let mut entries = self.lock();

        if let Some(entry) = entries.iter_mut().find(|e| e.path == path) {
            entry.last_modified = now;
            return entry.clone();
        }

        let entry = SitemapEntry {
            path: path.to_string(),
            priority: DEFAULT_PRIORITY,
            changefreq: DEFAULT_CHANGEFREQ,
            last_modified: now,
        };
        entries.push(entry.clone());
        debug!("Registered sitemap path: {}", path);
        entry
    }

    /// Entries with priority and change frequency recomputed from analytics
    ///
    /// When analytics are unavailable the stored entries are returned as-is.
    pub async fn get_prioritized_entries(&self) -> Vec<SitemapEntry> {
        let paths = self.list_paths();
        let lookup = self.fetcher.fetch_metrics(&paths).await;

        // Re-read: entries may have been added while the fetch was in flight
        let entries = self.entries();
        match lookup {
            MetricsLookup::Unavailable => entries,
            lookup @ MetricsLookup::Resolved(_) => entries
                .into_iter()
                .map(|entry| {
                    let score = scoring::score(lookup.metrics_for(&entry.path));
                    SitemapEntry {
                        priority: score.priority,
                        changefreq: score.changefreq,
                        ..entry
                    }
                })
                .collect(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SitemapEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SitemapRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SitemapRegistry")
            .field("entries", &self.len())
            .field("fetcher", &self.fetcher)
            .finish()
    }
}
