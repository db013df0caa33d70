//! SEO metadata for a (city, type) landing page
//!
//! Every `SeoMeta` handed out by the generator has passed `validate`, whether
//! it came from the generation service or from the heuristic templates.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use thiserror::Error;

pub const TITLE_LEN: RangeInclusive<usize> = 10..=120;
pub const DESCRIPTION_LEN: RangeInclusive<usize> = 30..=320;
pub const KEYWORDS_LEN: RangeInclusive<usize> = 5..=512;

/// Longest city or type fragment the heuristic templates will embed
const MAX_FRAGMENT_CHARS: usize = 40;

/// A field whose length falls outside its accepted range
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field} has {len} characters, expected {min}..={max}")]
pub struct MetaValidationError {
    pub field: &'static str,
    pub len: usize,
    pub min: usize,
    pub max: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoMeta {
    pub title: String,
    pub description: String,
    pub keywords: String,
    pub og_title: String,
    pub og_description: String,
}

impl SeoMeta {
    /// Check every field against its length bounds, counted in characters
    pub fn validate(&self) -> Result<(), MetaValidationError> {
        check_len("title", &self.title, &TITLE_LEN)?;
        check_len("description", &self.description, &DESCRIPTION_LEN)?;
        check_len("keywords", &self.keywords, &KEYWORDS_LEN)?;
        check_len("ogTitle", &self.og_title, &TITLE_LEN)?;
        check_len("ogDescription", &self.og_description, &DESCRIPTION_LEN)?;
        Ok(())
    }

    /// Deterministic template metadata in Russian
    ///
    /// City and type are trimmed and lower-cased; known type codes map to a
    /// display word. Fragments are clipped so the result always validates.
    pub fn heuristic(city: &str, kind: &str) -> Self {
        let norm_city = normalize(city);
        let norm_type = normalize(kind);

        let display_type = match norm_type.as_str() {
            "kvartiry" => "квартиры".to_string(),
            "doma" => "дома".to_string(),
            "" => "недвижимость".to_string(),
            other => clip(other),
        };
        let display_city = if norm_city.is_empty() {
            "вашем городе".to_string()
        } else {
            clip(&norm_city)
        };

        let title = format!("Купить {display_type} в {display_city} — цены, фото, районы");
        let description = format!(
            "Подборка актуальных предложений {display_type} в {display_city}. \
             Смотрите фото, цены и расположение районов. Обновление ежедневно."
        );
        let keywords = [clip(&norm_type), clip(&norm_city)]
            .into_iter()
            .filter(|part| !part.is_empty())
            .chain(["недвижимость", "купить", "цены", "фото"].map(String::from))
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            og_title: title.clone(),
            og_description: description.clone(),
            title,
            description,
            keywords,
        }
    }
}

fn check_len(
    field: &'static str,
    value: &str,
    bounds: &RangeInclusive<usize>,
) -> Result<(), MetaValidationError> {
    let len = value.chars().count();
    if bounds.contains(&len) {
        Ok(())
    } else {
        Err(MetaValidationError {
            field,
            len,
            min: *bounds.start(),
            max: *bounds.end(),
        })
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn clip(value: &str) -> String {
    value.chars().take(MAX_FRAGMENT_CHARS).collect::<String>().trim_end().to_string()
}
