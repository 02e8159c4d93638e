use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::crawler::{FetchError, PageFetcher};
use crate::extractor::{self, ExtractionResult, PageInfo};
use crate::selectors::{self, FieldSelectors, SearchProfile};
use crate::url_builder::build_target_url;

pub struct AppState {
    pub config: AppConfig,
    pub fetcher: PageFetcher,
    pub search: SearchProfile,
    pub price: FieldSelectors,
    pub origin: Url,
}

impl AppState {
    /// Compiles the selector profiles; bad selector syntax fails here.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let fetcher = PageFetcher::new(&config)?;
        let search = SearchProfile::compile(&selectors::SEARCH_RESULTS)?;
        let price = FieldSelectors::compile("price", selectors::PRODUCT_PRICE)?;
        let origin = Url::parse(&config.site_origin)?;
        Ok(Self {
            config,
            fetcher,
            search,
            price,
            origin,
        })
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing required parameter `{0}`")]
    MissingParameter(&'static str),
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
}

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<ErrorDebug>,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorDebug {
    pub url: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::MissingParameter(_) => {
                warn!("Rejected request: {}", self);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorBody {
                        error: self.to_string(),
                        debug: None,
                    },
                )
            }
            AppError::Fetch { url, source } => {
                error!("Scrape failed for {}: {}", url, source);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: format!("failed to fetch page: {}", source),
                        debug: Some(ErrorDebug { url }),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ScrapeQuery {
    /// Search keyword, or a literal http(s) URL.
    pub keyword: Option<String>,
    /// Page URL, fetched exactly as given.
    pub url: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PriceQuery {
    /// Product page URL.
    pub url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PriceResponse {
    /// `null` when no price selector matched.
    pub price: Option<String>,
    pub url: String,
}

/// Scrape a search results page for a keyword.
#[utoipa::path(
    get,
    path = "/api/scrape",
    params(ScrapeQuery),
    responses(
        (status = 200, description = "Products, possibly none, with diagnostics", body = ExtractionResult),
        (status = 400, description = "Neither keyword nor url given", body = ErrorBody),
        (status = 500, description = "Upstream fetch failed", body = ErrorBody)
    ),
    tag = "scraper"
)]
pub async fn scrape_keyword(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScrapeQuery>,
) -> Result<Json<ExtractionResult>, AppError> {
    let url = keyword_target(&state, &query)
        .or_else(|| literal_target(&query))
        .ok_or(AppError::MissingParameter("keyword"))?;
    scrape(&state, url).await.map(Json)
}

/// Scrape a search results page given by URL.
#[utoipa::path(
    get,
    path = "/scrape",
    params(ScrapeQuery),
    responses(
        (status = 200, description = "Products, possibly none, with diagnostics", body = ExtractionResult),
        (status = 400, description = "Neither url nor keyword given", body = ErrorBody),
        (status = 500, description = "Upstream fetch failed", body = ErrorBody)
    ),
    tag = "scraper"
)]
pub async fn scrape_url(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScrapeQuery>,
) -> Result<Json<ExtractionResult>, AppError> {
    let url = literal_target(&query)
        .or_else(|| keyword_target(&state, &query))
        .ok_or(AppError::MissingParameter("url"))?;
    scrape(&state, url).await.map(Json)
}

/// `keyword` goes through the search template.
fn keyword_target(state: &AppState, query: &ScrapeQuery) -> Option<String> {
    non_blank(&query.keyword).and_then(|k| build_target_url(k, &state.config.search_template))
}

/// `url` is fetched as given; a malformed one ends as a fetch error.
fn literal_target(query: &ScrapeQuery) -> Option<String> {
    non_blank(&query.url).map(|u| u.trim().to_string())
}

async fn scrape(state: &AppState, url: String) -> Result<ExtractionResult, AppError> {
    let request_id = Uuid::new_v4();
    info!("[{}] Scraping {}", request_id, url);

    let page = state
        .fetcher
        .fetch(&url)
        .await
        .map_err(|source| AppError::Fetch {
            url: url.clone(),
            source,
        })?;
    if page.final_url != url {
        info!("[{}] Redirected to {}", request_id, page.final_url);
    }

    let result = extractor::extract_products(
        &page.html,
        &state.search,
        &state.origin,
        PageInfo {
            request_id,
            url,
            fetched_at: Utc::now(),
        },
    );
    info!("[{}] Returning {} products", request_id, result.products.len());
    Ok(result)
}

/// Read the price from a single product page.
#[utoipa::path(
    get,
    path = "/price",
    params(PriceQuery),
    responses(
        (status = 200, description = "Price, or null when not found", body = PriceResponse),
        (status = 400, description = "url missing", body = ErrorBody),
        (status = 500, description = "Upstream fetch failed", body = ErrorBody)
    ),
    tag = "scraper"
)]
pub async fn price(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PriceQuery>,
) -> Result<Json<PriceResponse>, AppError> {
    let url = non_blank(&query.url)
        .map(|u| u.trim().to_string())
        .ok_or(AppError::MissingParameter("url"))?;

    let page = state
        .fetcher
        .fetch(&url)
        .await
        .map_err(|source| AppError::Fetch {
            url: url.clone(),
            source,
        })?;

    let price = extractor::extract_single(&page.html, &state.price);
    if price.is_none() {
        warn!("No price found on {}", url);
    }
    Ok(Json(PriceResponse { price, url }))
}

/// Endpoint index.
#[utoipa::path(get, path = "/", responses((status = 200, description = "Available endpoints")), tag = "meta")]
pub async fn index(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            { "method": "GET", "path": "/api/scrape?keyword=<keyword|url>", "description": "Scrape search results for a keyword" },
            { "method": "GET", "path": "/scrape?url=<url>", "description": "Scrape a search results page by URL" },
            { "method": "GET", "path": "/price?url=<url>", "description": "Read the price from a product page" },
            { "method": "GET", "path": "/health", "description": "Liveness probe" },
            { "method": "GET", "path": "/docs", "description": "OpenAPI documentation" },
            { "method": "GET", "path": "/app/", "description": "Browser frontend" }
        ],
        "profiles": [state.search.summary()],
    }))
}

#[utoipa::path(get, path = "/health", responses((status = 200, description = "Service is up")), tag = "meta")]
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/scrape", get(scrape_keyword))
        .route("/scrape", get(scrape_url))
        .route("/price", get(price))
        .nest_service("/app", static_files)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
