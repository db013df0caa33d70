//! Sitemap priority and change frequency from search analytics

use crate::analytics::AnalyticsMetrics;
use serde::{Deserialize, Serialize};

/// Priority for pages without metrics
pub const NEUTRAL_PRIORITY: f64 = 0.5;

pub const MIN_PRIORITY: f64 = 0.1;
pub const MAX_PRIORITY: f64 = 1.0;

const BASE_OFFSET: f64 = 0.3;
const CLICKS_WEIGHT: f64 = 0.5;
const POSITION_WEIGHT: f64 = 0.2;
const CTR_WEIGHT: f64 = 0.1;

const CLICKS_SATURATION: f64 = 100.0;
const CTR_SATURATION: f64 = 0.3;
const BEST_POSITION: f64 = 1.0;
const WORST_POSITION: f64 = 10.0;
const POSITION_CLAMP: f64 = 50.0;

const DAILY_THRESHOLD: f64 = 0.85;
const WEEKLY_THRESHOLD: f64 = 0.60;

/// Sitemap `changefreq` hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFreq {
    Daily,
    Weekly,
    Monthly,
}

impl ChangeFreq {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeFreq::Daily => "daily",
            ChangeFreq::Weekly => "weekly",
            ChangeFreq::Monthly => "monthly",
        }
    }

    pub fn from_priority(priority: f64) -> Self {
        if priority >= DAILY_THRESHOLD {
            ChangeFreq::Daily
        } else if priority >= WEEKLY_THRESHOLD {
            ChangeFreq::Weekly
        } else {
            ChangeFreq::Monthly
        }
    }
}

impl std::fmt::Display for ChangeFreq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub priority: f64,
    pub changefreq: ChangeFreq,
}

/// Score a page from its metrics, or from their absence
pub fn score(metrics: Option<&AnalyticsMetrics>) -> Score {
    let priority = priority(metrics);
    Score {
        priority,
        changefreq: ChangeFreq::from_priority(priority),
    }
}

/// Priority in [0.1, 1.0]; clicks dominate, then position, then CTR
pub fn priority(metrics: Option<&AnalyticsMetrics>) -> f64 {
    let Some(metrics) = metrics else {
        return NEUTRAL_PRIORITY;
    };

    let raw = BASE_OFFSET
        + CLICKS_WEIGHT * clicks_norm(metrics.clicks)
        + POSITION_WEIGHT * position_norm(metrics.position)
        + CTR_WEIGHT * ctr_norm(metrics.ctr);
    raw.clamp(MIN_PRIORITY, MAX_PRIORITY)
}

fn clicks_norm(clicks: u64) -> f64 {
    (clicks as f64 / CLICKS_SATURATION).min(1.0)
}

/// 1.0 at position 1 or better, 0.0 at 10 or worse; unknown (0) is neutral
fn position_norm(position: f64) -> f64 {
    if !(position > 0.0) {
        return 0.5;
    }
    let position = position.min(POSITION_CLAMP);
    ((WORST_POSITION - position) / (WORST_POSITION - BEST_POSITION)).clamp(0.0, 1.0)
}

fn ctr_norm(ctr: f64) -> f64 {
    if !ctr.is_finite() {
        return 0.0;
    }
    (ctr.max(0.0) / CTR_SATURATION).min(1.0)
}
