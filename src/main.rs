mod api;
mod config;
mod crawler;
mod extractor;
mod frontend;
mod selectors;
mod url_builder;

use axum::Router;
use dotenv::dotenv;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::index,
        api::health,
        api::scrape_keyword,
        api::scrape_url,
        api::price
    ),
    components(
        schemas(
            extractor::Product,
            extractor::Diagnostics,
            extractor::ExtractionResult,
            api::PriceResponse,
            api::ErrorBody,
            api::ErrorDebug
        )
    ),
    tags(
        (name = "scraper", description = "Product search scraping"),
        (name = "meta", description = "Service information")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::AppConfig::from_env()?;
    frontend::verify_static_dir(&config.static_dir)?;

    let addr = config.bind_addr();
    let state = Arc::new(api::AppState::new(config)?);
    info!(
        "🔎 Search profile '{}' loaded ({} container selectors)",
        state.search.name,
        state.search.container.len()
    );

    let app = Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api::router(state));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
