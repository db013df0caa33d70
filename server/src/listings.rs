//! Listings shown on landing pages

use crate::pages::page_url;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Number of demo offers per landing page
pub const DEMO_LISTING_COUNT: usize = 12;

#[derive(Error, Debug)]
pub enum ListingsError {
    #[error("Listings source unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub short: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingsPage {
    pub h1: String,
    pub intro: String,
    pub items: Vec<Listing>,
}

/// Source of offers for a (city, type) pair
#[async_trait]
pub trait ListingsSource: Send + Sync {
    async fn listings(&self, city: &str, kind: &str) -> Result<ListingsPage, ListingsError>;
}

/// Deterministic placeholder offers
pub struct DemoListings {
    web_base_url: Url,
}

impl DemoListings {
    pub fn new(web_base_url: Url) -> Self {
        Self { web_base_url }
    }
}

#[async_trait]
impl ListingsSource for DemoListings {
    async fn listings(&self, city: &str, kind: &str) -> Result<ListingsPage, ListingsError> {
        let items = (1..=DEMO_LISTING_COUNT)
            .map(|i| -> Result<Listing, ListingsError> {
                let path = format!("{city}/{kind}/listing-{i}");
                let url = page_url(&self.web_base_url, &path)
                    .map_err(|e| ListingsError::Unavailable(format!("bad listing path {path:?}: {e}")))?;
                Ok(Listing {
                    id: format!("{city}-{kind}-{i}"),
                    title: format!("Предложение {i}: {kind} — {city}"),
                    short: format!("Краткое описание объекта №{i} в {city}."),
                    url: url.into(),
                })
            })
            .collect::<Result<Vec<_>, ListingsError>>()?;

        Ok(ListingsPage {
            h1: format!("Лучшие {kind} в {city}"),
            intro: format!("Актуальные предложения {kind} в {city}."),
            items,
        })
    }
}
