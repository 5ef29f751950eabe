// Module: http
// Router assembly and the policies applied around it.

pub mod error;
pub mod health;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use moot_core::{Config, RoomRegistry};
use moot_sfu::SfuEngine;

pub use error::AppError;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RoomRegistry>,
    pub sfu: Arc<SfuEngine>,
    pub config: Arc<Config>,
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ws", get(crate::ws::ws_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Development is permissive; production checks each request's Origin against
/// the configured allow-list.
fn cors_layer(config: &Config) -> CorsLayer {
    if config.environment().is_production() {
        let config = config.clone();
        CorsLayer::new()
            .allow_origin(AllowOrigin::predicate(move |origin, _| {
                origin
                    .to_str()
                    .map_or(false, |origin| config.origin_allowed(origin))
            }))
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::permissive()
    }
}
