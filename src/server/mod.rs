pub mod error;
pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use log::info;
use tower_http::cors::CorsLayer;

use crate::config::{QueryLimits, ServiceConfig};
use crate::payload::Thresholds;
use crate::store::Store;

/// State shared by all handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: Store,
    pub thresholds: Thresholds,
    pub query: QueryLimits,
}

impl AppState {
    pub fn new(store: Store, config: &ServiceConfig) -> Self {
        AppState {
            store,
            thresholds: config.thresholds,
            query: config.query,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/callback", post(handlers::receive_callback))
        .route("/api/readings", get(handlers::recent_readings))
        .route("/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind on all interfaces and serve until the task is dropped
pub async fn serve(state: AppState, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Server running on http://localhost:{}", port);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
