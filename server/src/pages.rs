//! Server-rendered documents: landing pages, sitemap.xml and robots.txt

use crate::listings::{Listing, ListingsPage};
use seomap_core::{SeoMeta, SitemapEntry};
use std::fmt::Write;
use tracing::warn;
use url::Url;

/// Listings embedded in the structured data block
const MAX_JSON_LD_ITEMS: usize = 12;

/// Escape text for HTML element content and quoted attribute values
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Absolute, percent-encoded URL of a relative page path
///
/// Resolves the same way analytics rows are matched.
pub fn page_url(web_base_url: &Url, path: &str) -> Result<Url, url::ParseError> {
    web_base_url.join(&format!("/{}", path.trim_start_matches('/')))
}

/// Like `page_url`, falling back to the site root for unresolvable paths
fn page_url_or_root(web_base_url: &Url, path: &str) -> String {
    page_url(web_base_url, path)
        .map(String::from)
        .unwrap_or_else(|_| web_base_url.to_string())
}

/// schema.org ItemList describing the offers on a landing page
pub fn item_list_json_ld(city: &str, kind: &str, items: &[Listing]) -> serde_json::Value {
    let elements: Vec<serde_json::Value> = items
        .iter()
        .take(MAX_JSON_LD_ITEMS)
        .enumerate()
        .map(|(idx, item)| {
            serde_json::json!({
                "@type": "ListItem",
                "position": idx + 1,
                "url": item.url,
                "name": item.title,
            })
        })
        .collect();

    serde_json::json!({
        "@context": "https://schema.org",
        "@type": "ItemList",
        "name": format!("Подборка: {kind} в {city}"),
        "itemListElement": elements,
    })
}

/// Render a landing page
///
/// `listings` is `None` when the listings source could not be reached; the
/// page then carries placeholder copy and an empty offer grid.
pub fn render_landing(
    web_base_url: &Url,
    city: &str,
    kind: &str,
    meta: &SeoMeta,
    listings: Option<&ListingsPage>,
) -> String {
    let canonical = page_url_or_root(web_base_url, &format!("{city}/{kind}"));
    let items: &[Listing] = listings.map(|page| page.items.as_slice()).unwrap_or(&[]);

    // Keep "</script>" out of the inline JSON
    let json_ld = item_list_json_ld(city, kind, items)
        .to_string()
        .replace("</", "<\\/");

    let (h1, intro) = match listings {
        Some(page) => (page.h1.clone(), page.intro.clone()),
        None => (
            format!("Лучшие {kind} в {city}"),
            format!("Подборка актуальных предложений {kind} в {city}. Предложения временно недоступны."),
        ),
    };

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"ru\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>{}</title>", escape_html(&meta.title));
    let _ = writeln!(html, "<meta name=\"description\" content=\"{}\">", escape_html(&meta.description));
    let _ = writeln!(html, "<meta name=\"keywords\" content=\"{}\">", escape_html(&meta.keywords));
    let _ = writeln!(html, "<link rel=\"canonical\" href=\"{}\">", escape_html(&canonical));
    let _ = writeln!(html, "<meta property=\"og:title\" content=\"{}\">", escape_html(&meta.og_title));
    let _ = writeln!(
        html,
        "<meta property=\"og:description\" content=\"{}\">",
        escape_html(&meta.og_description)
    );
    let _ = writeln!(html, "<meta property=\"og:url\" content=\"{}\">", escape_html(&canonical));
    html.push_str("<meta property=\"og:type\" content=\"website\">\n");
    let _ = writeln!(html, "<script type=\"application/ld+json\">{}</script>", json_ld);
    html.push_str("</head>\n<body>\n<main>\n");
    let _ = writeln!(html, "<h1>{}</h1>", escape_html(&h1));
    let _ = writeln!(html, "<p>{}</p>", escape_html(&intro));
    html.push_str("<section class=\"listings\">\n");
    for item in items {
        let _ = writeln!(
            html,
            "<article><h2>{}</h2><p>{}</p></article>",
            escape_html(&item.title),
            escape_html(&item.short)
        );
    }
    html.push_str("</section>\n</main>\n</body>\n</html>\n");
    html
}

/// Render a sitemap in registry order
pub fn render_sitemap(web_base_url: &Url, entries: &[SitemapEntry]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for entry in entries {
        let loc = match page_url(web_base_url, &entry.path) {
            Ok(loc) => loc,
            Err(e) => {
                warn!("Leaving {:?} out of the sitemap: {}", entry.path, e);
                continue;
            }
        };
        let _ = write!(
            xml,
            "<url>\n<loc>{}</loc>\n<lastmod>{}</lastmod>\n<changefreq>{}</changefreq>\n<priority>{:.2}</priority>\n</url>\n",
            escape_html(loc.as_str()),
            entry.last_modified.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            entry.changefreq,
            entry.priority
        );
    }
    xml.push_str("</urlset>\n");
    xml
}

/// Crawl rules: keep bots out of the API and parameterized URLs
pub fn render_robots(web_base_url: &Url) -> String {
    format!(
        "User-agent: *\nAllow: /\nDisallow: /api/\nDisallow: /_next/\nDisallow: /search\nDisallow: /*?*\n\nSitemap: {}\n",
        page_url_or_root(web_base_url, "sitemap.xml")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use seomap_core::{AnalyticsFetcher, ChangeFreq};

    fn base() -> Url {
        Url::parse("http://localhost:3000").unwrap()
    }

    fn listing(i: usize) -> Listing {
        Listing {
            id: format!("spb-doma-{i}"),
            title: format!("Предложение {i}"),
            short: "Коротко".to_string(),
            url: format!("http://localhost:3000/spb/doma/listing-{i}"),
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a href=\"x\">&'</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;");
    }

    #[test]
    fn test_item_list_json_ld() {
        let items: Vec<Listing> = (1..=15).map(listing).collect();
        let json = item_list_json_ld("spb", "doma", &items);
        assert_eq!(json["@type"], "ItemList");
        assert_eq!(json["name"], "Подборка: doma в spb");
        let elements = json["itemListElement"].as_array().unwrap();
        assert_eq!(elements.len(), 12);
        assert_eq!(elements[0]["position"], 1);
        assert_eq!(elements[0]["url"], "http://localhost:3000/spb/doma/listing-1");
    }

    #[test]
    fn test_landing_escapes_and_falls_back() {
        let mut meta = SeoMeta::heuristic("spb", "doma");
        meta.title = "Дома <script>alert(1)</script>".to_string();

        let html = render_landing(&base(), "spb", "doma", &meta, None);
        assert!(html.contains("<title>Дома &lt;script&gt;alert(1)&lt;/script&gt;</title>"));
        assert!(html.contains("<link rel=\"canonical\" href=\"http://localhost:3000/spb/doma\">"));
        assert!(html.contains("Предложения временно недоступны."));
        assert!(!html.contains("<article>"));
    }

    #[test]
    fn test_sitemap_rendering() {
        let entries = vec![SitemapEntry {
            path: "moskva/kvartiry".to_string(),
            priority: 0.8,
            changefreq: ChangeFreq::Daily,
            last_modified: Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap(),
        }];
        let xml = render_sitemap(&base(), &entries);
        assert!(xml.contains("<loc>http://localhost:3000/moskva/kvartiry</loc>"));
        assert!(xml.contains("<lastmod>2026-10-19T12:00:00Z</lastmod>"));
        assert!(xml.contains("<changefreq>daily</changefreq>"));
        assert!(xml.contains("<priority>0.80</priority>"));
    }

    #[test]
    fn test_sitemap_locations_are_percent_encoded() {
        let entry = |path: &str| SitemapEntry {
            path: path.to_string(),
            priority: 0.5,
            changefreq: ChangeFreq::Weekly,
            last_modified: Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap(),
        };
        let entries = vec![entry("nizhny novgorod/doma"), entry("москва/дома")];
        let xml = render_sitemap(&base(), &entries);

        assert!(xml.contains("<loc>http://localhost:3000/nizhny%20novgorod/doma</loc>"));
        assert!(xml.contains(
            "<loc>http://localhost:3000/%D0%BC%D0%BE%D1%81%D0%BA%D0%B2%D0%B0/%D0%B4%D0%BE%D0%BC%D0%B0</loc>"
        ));

        // Same URL the analytics lookup scores the page under
        let fetcher = AnalyticsFetcher::disabled(base());
        for entry in &entries {
            let scored = fetcher.page_url(&entry.path).unwrap();
            assert!(xml.contains(&format!("<loc>{}</loc>", scored)));
            assert_eq!(Url::parse(scored.as_str()).unwrap(), scored);
        }
    }

    #[test]
    fn test_landing_canonical_is_percent_encoded() {
        let meta = SeoMeta::heuristic("nizhny novgorod", "doma");
        let html = render_landing(&base(), "nizhny novgorod", "doma", &meta, None);
        assert!(html.contains(
            "<link rel=\"canonical\" href=\"http://localhost:3000/nizhny%20novgorod/doma\">"
        ));
        assert!(html.contains(
            "<meta property=\"og:url\" content=\"http://localhost:3000/nizhny%20novgorod/doma\">"
        ));
    }

    #[test]
    fn test_robots() {
        let robots = render_robots(&base());
        assert!(robots.contains("Disallow: /api/"));
        assert!(robots.ends_with("Sitemap: http://localhost:3000/sitemap.xml\n"));
    }
}
