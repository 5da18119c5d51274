//! HTTP gateway for the Keepsake memory service.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /login` - Caregiver login
//! - `POST /upload_media` - Register a media item by URL
//! - `GET /media_list`, `GET /media/{id}`, `PATCH /media/{id}/caption`,
//!   `DELETE /media/{id}` - Item management
//! - `GET /random_memories?k=&exclude=` - Weighted draw without replacement
//! - `POST /update_weights_by_similarity` - Relevance-driven weight update
//! - `POST /reset_weights` - Restore every weight to the default
//! - `GET /generate_survey` - Recall questions built from the memories
//!
//! # Architecture
//!
//! ```text
//! Caregiver / patient apps
//!    │
//!    ▼
//! ┌─────────────────┐
//! │   API Gateway   │ ◄── This crate
//! │     (Axum)      │
//! └────────┬────────┘
//!          │
//!          ├──────────────────┬──────────────────┐
//!          ▼                  ▼                  ▼
//! ┌─────────────────┐ ┌─────────────────┐ ┌─────────────────┐
//! │ SamplingService │ │  WeightEngine   │ │ LLM oracle /    │
//! │  (draw, decay)  │ │ (update, reset) │ │ fuser / survey  │
//! └────────┬────────┘ └────────┬────────┘ └─────────────────┘
//!          └─────────┬─────────┘
//!                    ▼
//!              ┌───────────┐
//!              │ ItemStore │
//!              └───────────┘
//! ```

pub mod auth;
pub mod config;
pub mod routes;
pub mod state;

use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, patch, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use auth::{ApiKeyConfig, Credentials};
pub use config::KeepsakeConfig;
pub use state::AppState;

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    match origins {
        Some(list) if !list.iter().any(|o| o == "*") => {
            let parsed: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(origin = %origin, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            layer.allow_origin(AllowOrigin::list(parsed))
        }
        _ => layer.allow_origin(Any),
    }
}

/// Create the API router with all routes configured.
///
/// `cors_origins` of `None` (or containing `*`) allows any origin.
pub fn create_router(state: Arc<AppState>, cors_origins: Option<Vec<String>>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/login", post(routes::login))
        .route("/upload_media", post(routes::upload_media))
        .route("/media_list", get(routes::media_list))
        .route(
            "/media/{id}",
            get(routes::get_media).delete(routes::delete_media),
        )
        .route("/media/{id}/caption", patch(routes::update_caption))
        .route("/random_memories", get(routes::random_memories))
        .route(
            "/update_weights_by_similarity",
            post(routes::update_weights_by_similarity),
        )
        .route("/reset_weights", post(routes::reset_weights))
        .route("/generate_survey", get(routes::generate_survey))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins.as_deref()))
        .with_state(state)
}

/// Start the API server on the given address.
pub async fn serve(
    state: Arc<AppState>,
    addr: SocketAddr,
    cors_origins: Option<Vec<String>>,
) -> anyhow::Result<()> {
    let router = create_router(state, cors_origins);

    info!(%addr, "Starting Keepsake API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
