//! tplhub HTTP API Server
//!
//! Serves the template store over HTTP: listing, download, upload and delete,
//! each guarded by an API-key capability check.

use axum::{Router, extract::DefaultBodyLimit, response::Json, routing::get};
use serde_json::{Value, json};
use std::{net::SocketAddr, sync::Arc};
use time::format_description::well_known::Rfc3339;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tplhub::{FileBlobStorage, GitRepository, TemplateStore};
use tracing::info;

mod auth;
mod config;
mod error;
mod routes;

use auth::ApiKeys;
use config::ServerConfig;
use error::{ApiError, Result};

/// Main application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TemplateStore>,
    pub keys: Arc<ApiKeys>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "tplhub=info,tplhub_server=debug,tower_http=debug".to_string());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::from_env()?;
    info!(
        "Starting tplhub server on {}:{} (data in {})",
        config.host,
        config.port,
        config.data_dir.display()
    );

    let vcs = Arc::new(GitRepository::new(config.git_config()));
    let blobs = Arc::new(FileBlobStorage::new(&config.data_dir));
    let store = TemplateStore::open(config.store_config(), blobs, vcs).await?;

    let state = AppState {
        store: Arc::new(store),
        keys: Arc::new(ApiKeys::new(&config.api_keys)),
    };

    let app = create_router(state);

    let host: std::net::IpAddr = config
        .host
        .parse()
        .map_err(|_| ApiError::Config(format!("Invalid HOST value: {}", config.host)))?;
    let addr = SocketAddr::from((host, config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/templates", routes::templates::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(50 * 1024 * 1024)),
        )
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> Json<Value> {
    let timestamp = time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    Json(json!({
        "status": "healthy",
        "service": "tplhub-server",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": timestamp
    }))
}
