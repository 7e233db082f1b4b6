//! API Routes
//!
//! - `/api/chat` - chat endpoint streaming workflow events over SSE
//! - `/api/health` - health check

pub mod chat;
pub mod health;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let origins: Vec<HeaderValue> = state
        .config
        .server
        .cors_allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(chat::router(state))
        .merge(health::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
