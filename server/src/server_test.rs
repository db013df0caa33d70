#[cfg(test)]
mod tests {
    use crate::listings::{ListingsError, ListingsPage, ListingsSource};
    use crate::{AppState, DemoListings, SeoState, server};
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use seomap_core::{
        AnalyticsError, AnalyticsFetcher, AnalyticsMetrics, AnalyticsQuery, AnalyticsSettings,
        AnalyticsSource, GenerationError, GenerationRequest, MetaGenerator, MetaProvider,
        PageMetrics, SeoMeta,
    };
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;
    use url::Url;

    const WEB_BASE: &str = "http://localhost:3000";

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetaProvider for CountingProvider {
        fn model(&self) -> &str {
            "counting"
        }

        async fn complete(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(GenerationError::EmptyContent)
        }
    }

    struct FixedAnalytics(Vec<PageMetrics>);

    #[async_trait]
    impl AnalyticsSource for FixedAnalytics {
        async fn query_pages(&self, _query: &AnalyticsQuery) -> Result<Vec<PageMetrics>, AnalyticsError> {
            Ok(self.0.clone())
        }
    }

    struct DownListings;

    #[async_trait]
    impl ListingsSource for DownListings {
        async fn listings(&self, _city: &str, _kind: &str) -> Result<ListingsPage, ListingsError> {
            Err(ListingsError::Unavailable("connection refused".to_string()))
        }
    }

    fn web_base() -> Url {
        Url::parse(WEB_BASE).unwrap()
    }

    fn create_test_state(
        provider: Option<Arc<dyn MetaProvider>>,
        analytics: Option<Arc<dyn AnalyticsSource>>,
        listings: Box<dyn ListingsSource>,
    ) -> AppState {
        let site = analytics.as_ref().map(|_| "sc-domain:example.com".to_string());
        let fetcher = AnalyticsFetcher::new(analytics, AnalyticsSettings::new(site, web_base()));
        Arc::new(SeoState::new(
            MetaGenerator::new(provider),
            Arc::new(fetcher),
            listings,
            web_base(),
        ))
    }

    fn default_state() -> AppState {
        create_test_state(None, None, Box::new(DemoListings::new(web_base())))
    }

    async fn get(state: &AppState, uri: &str) -> (StatusCode, String) {
        let response = server::create_app(state.clone())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_meta_requires_city_and_type() {
        let state = default_state();
        for uri in ["/api/seo/meta", "/api/seo/meta?city=spb", "/api/seo/meta?city=spb&type=%20"] {
            let (status, body) = get(&state, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            let json: serde_json::Value = serde_json::from_str(&body).unwrap();
            assert_eq!(json["error"], "city and type are required");
        }
        assert_eq!(state.registry.len(), 2, "rejected requests must not register paths");
    }

    #[tokio::test]
    async fn test_meta_returns_valid_meta_and_registers_path() {
        let state = default_state();
        let (status, body) = get(&state, "/api/seo/meta?city=kazan&type=doma").await;
        assert_eq!(status, StatusCode::OK);

        let meta: SeoMeta = serde_json::from_str(&body).unwrap();
        assert!(meta.validate().is_ok());
        assert_eq!(meta.title, "Купить дома в kazan — цены, фото, районы");

        assert_eq!(
            state.registry.list_paths(),
            vec!["moskva/kvartiry", "spb/kvartiry", "kazan/doma"]
        );

        get(&state, "/api/seo/meta?city=kazan&type=doma").await;
        assert_eq!(state.registry.len(), 3);
    }

    #[tokio::test]
    async fn test_meta_is_cached_across_requests() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let state = create_test_state(
            Some(provider.clone()),
            None,
            Box::new(DemoListings::new(web_base())),
        );

        let (first_status, first) = get(&state, "/api/seo/meta?city=spb&type=doma").await;
        let (_, second) = get(&state, "/api/seo/meta?city=spb&type=doma").await;

        assert_eq!(first_status, StatusCode::OK);
        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sitemap_entries_without_analytics_keep_seed_values() {
        let state = default_state();
        let (status, body) = get(&state, "/api/seo/sitemap-entries").await;
        assert_eq!(status, StatusCode::OK);

        let entries: Vec<serde_json::Value> = serde_json::from_str(&body).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["path"], "moskva/kvartiry");
        assert_eq!(entries[0]["priority"], 0.8);
        assert_eq!(entries[0]["changefreq"], "daily");
        assert!(entries[0]["lastModified"].is_string());
    }

    #[tokio::test]
    async fn test_sitemap_entries_with_analytics_are_rescored() {
        let rows = vec![PageMetrics {
            page: format!("{WEB_BASE}/spb/kvartiry"),
            metrics: AnalyticsMetrics {
                clicks: 100,
                impressions: 2_000,
                ctr: 0.3,
                position: 1.0,
            },
        }];
        let state = create_test_state(
            None,
            Some(Arc::new(FixedAnalytics(rows))),
            Box::new(DemoListings::new(web_base())),
        );

        let (_, body) = get(&state, "/api/seo/sitemap-entries").await;
        let entries: Vec<serde_json::Value> = serde_json::from_str(&body).unwrap();
        assert_eq!(entries[0]["priority"], 0.5);
        assert_eq!(entries[0]["changefreq"], "monthly");
        assert_eq!(entries[1]["priority"], 1.0);
        assert_eq!(entries[1]["changefreq"], "daily");
    }

    #[tokio::test]
    async fn test_sitemap_xml_is_cached_until_rebuild() {
        let state = default_state();
        let (status, xml) = get(&state, "/sitemap.xml").await;
        assert_eq!(status, StatusCode::OK);
        assert!(xml.contains("<loc>http://localhost:3000/moskva/kvartiry</loc>"));
        assert!(xml.find("moskva/kvartiry") < xml.find("spb/kvartiry"));

        // A new path does not show up until the cached document is dropped
        get(&state, "/api/seo/meta?city=kazan&type=doma").await;
        let (_, cached) = get(&state, "/sitemap.xml").await;
        assert!(!cached.contains("kazan/doma"));

        let response = server::create_app(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/seo/rebuild-sitemap")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let (_, rebuilt) = get(&state, "/sitemap.xml").await;
        assert!(rebuilt.contains("<loc>http://localhost:3000/kazan/doma</loc>"));
    }

    #[tokio::test]
    async fn test_landing_page_renders_meta_and_json_ld() {
        let state = default_state();
        let (status, html) = get(&state, "/spb/kvartiry").await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("<title>Купить квартиры в spb — цены, фото, районы</title>"));
        assert!(html.contains("\"@type\":\"ItemList\""));
        assert!(html.contains("<h1>Лучшие kvartiry в spb</h1>"));
        assert_eq!(html.matches("<article>").count(), 12);
    }

    #[tokio::test]
    async fn test_landing_page_survives_listings_outage() {
        let state = create_test_state(None, None, Box::new(DownListings));
        let (status, html) = get(&state, "/kazan/doma").await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("Предложения временно недоступны."));
        assert!(state.registry.list_paths().contains(&"kazan/doma".to_string()));
    }

    #[tokio::test]
    async fn test_reserved_prefix_is_not_a_landing_page() {
        let state = default_state();
        let (status, _) = get(&state, "/api/unknown").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(state.registry.len(), 2);
    }

    #[tokio::test]
    async fn test_file_like_paths_are_not_landing_pages() {
        let state = default_state();
        for uri in ["/wp-admin/setup.php", "/favicon.ico/x", "/.env/x"] {
            let (status, _) = get(&state, uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        }

        let (_, xml) = get(&state, "/sitemap.xml").await;
        assert!(!xml.contains("wp-admin"));
        assert_eq!(state.registry.len(), 2);
    }

    #[tokio::test]
    async fn test_listings_endpoint() {
        let state = default_state();
        let (status, body) = get(&state, "/api/listings?city=spb&type=doma").await;
        assert_eq!(status, StatusCode::OK);
        let page: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(page["items"].as_array().unwrap().len(), 12);

        let (status, _) = get(&state, "/api/listings?type=doma").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let down = create_test_state(None, None, Box::new(DownListings));
        let (status, _) = get(&down, "/api/listings?city=spb&type=doma").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_health_and_robots() {
        let state = default_state();
        let (status, body) = get(&state, "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");

        let response = server::create_app(state.clone())
            .oneshot(Request::builder().uri("/robots.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }
}
