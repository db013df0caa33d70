use crate::pages::{render_landing, render_robots, render_sitemap};
use crate::AppState;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderValue, Method, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Cache key of the rendered sitemap document
const SITEMAP_DOCUMENT_KEY: &str = "sitemap.xml";

/// First path segments that never name a city
const RESERVED_SEGMENTS: [&str; 2] = ["api", "_next"];

pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(state.cors_origin.as_deref());

    Router::new()
        .route("/api/seo/meta", get(handle_meta))
        .route("/api/seo/sitemap-entries", get(handle_sitemap_entries))
        .route("/api/seo/rebuild-sitemap", post(handle_rebuild_sitemap))
        .route("/api/listings", get(handle_listings))
        .route("/health", get(handle_health))
        .route("/sitemap.xml", get(handle_sitemap_xml))
        .route("/robots.txt", get(handle_robots))
        .route("/{city}/{kind}", get(handle_landing))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods([Method::GET, Method::POST]);
    match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(e)) => {
            warn!("Ignoring invalid CORS origin: {}", e);
            layer
        }
        None => layer,
    }
}

/// `?city=&type=` parameters; both are required
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    city: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl PageQuery {
    fn pair(&self) -> Option<(&str, &str)> {
        let city = self.city.as_deref().map(str::trim).filter(|c| !c.is_empty())?;
        let kind = self.kind.as_deref().map(str::trim).filter(|k| !k.is_empty())?;
        Some((city, kind))
    }
}

fn missing_pair() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": "city and type are required" })),
    )
        .into_response()
}

async fn handle_meta(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Response {
    let Some((city, kind)) = query.pair() else {
        return missing_pair();
    };

    let meta = state.generator.get_meta(city, kind).await;
    state.registry.add_or_update_entry(&format!("{city}/{kind}"));
    Json(meta).into_response()
}

async fn handle_sitemap_entries(State(state): State<AppState>) -> impl IntoResponse {
    let entries = state.registry.get_prioritized_entries().await;
    debug!("Serving {} sitemap entries", entries.len());
    Json(entries)
}

async fn handle_rebuild_sitemap(State(state): State<AppState>) -> impl IntoResponse {
    info!("Sitemap rebuild requested, dropping cached analytics and document");
    state.analytics.invalidate();
    state.sitemap_documents.delete(SITEMAP_DOCUMENT_KEY);
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "accepted" })),
    )
}

async fn handle_listings(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Response {
    let Some((city, kind)) = query.pair() else {
        return missing_pair();
    };

    match state.listings.listings(city, kind).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => {
            warn!("Listings unavailable for {}/{}: {}", city, kind, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": "listings_unavailable" })),
            )
                .into_response()
        }
    }
}

async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "time": Utc::now().to_rfc3339() }))
}

async fn handle_sitemap_xml(State(state): State<AppState>) -> impl IntoResponse {
    let xml = match state.sitemap_documents.get(SITEMAP_DOCUMENT_KEY) {
        Some(xml) => xml,
        None => {
            let entries = state.registry.get_prioritized_entries().await;
            let xml = render_sitemap(&state.web_base_url, &entries);
            info!("Regenerated sitemap.xml with {} entries", entries.len());
            state
                .sitemap_documents
                .set(SITEMAP_DOCUMENT_KEY, xml.clone(), state.sitemap_revalidate);
            xml
        }
    };
    ([(header::CONTENT_TYPE, "application/xml; charset=utf-8")], xml)
}

async fn handle_robots(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        render_robots(&state.web_base_url),
    )
}

/// City and type slugs never contain dots; file-like paths come from scanners, not visitors
fn is_landing_path(city: &str, kind: &str) -> bool {
    !RESERVED_SEGMENTS.contains(&city) && !city.contains('.') && !kind.contains('.')
}

async fn handle_landing(
    State(state): State<AppState>,
    Path((city, kind)): Path<(String, String)>,
) -> Response {
    if !is_landing_path(&city, &kind) {
        debug!("Not a landing page: /{}/{}", city, kind);
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    }

    let meta = state.generator.get_meta(&city, &kind).await;
    state.registry.add_or_update_entry(&format!("{city}/{kind}"));

    let listings = match state.listings.listings(&city, &kind).await {
        Ok(page) => Some(page),
        Err(e) => {
            warn!("Rendering {}/{} without listings: {}", city, kind, e);
            None
        }
    };

    Html(render_landing(
        &state.web_base_url,
        &city,
        &kind,
        &meta,
        listings.as_ref(),
    ))
    .into_response()
}
