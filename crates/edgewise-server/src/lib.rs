pub mod api;
pub mod config;
pub mod error;
pub mod health;
pub mod rate_limit;
pub mod room_manager;
pub mod state;
pub mod ws;

use std::time::Duration;

use axum::Router;
use axum::http::{HeaderValue, header};
use axum::routing::{get, post};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use config::ServerConfig;
use state::AppState;

/// Buckets idle this long are dropped from the room-creation limiter.
const LIMITER_BUCKET_MAX_AGE: Duration = Duration::from_secs(600);

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let web_root = config.web_root.clone();
    let state = AppState::new(config);

    let api_routes = Router::new()
        .route("/rooms", post(api::create_room))
        .route("/rooms/{room}", get(api::get_room))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    let static_files = Router::new()
        .fallback_service(ServeDir::new(&web_root))
        .layer(CompressionLayer::new());

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health::health_check))
        .nest("/api/v1", api_routes)
        .merge(static_files)
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    (app, state)
}

/// Background task that expires reconnect sessions, closes abandoned or idle
/// rooms, and prunes stale rate-limit buckets.
pub fn spawn_room_janitor(state: AppState) -> tokio::task::JoinHandle<()> {
    let period = Duration::from_secs(state.config.rooms.idle_check_interval_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;

            let report = state.rooms.write().await.cleanup();
            if report.expired_sessions > 0 || report.closed_rooms > 0 {
                tracing::info!(
                    expired_sessions = report.expired_sessions,
                    closed_rooms = report.closed_rooms,
                    "Room cleanup"
                );
            }

            let pruned = state
                .room_create_limiter
                .cleanup(LIMITER_BUCKET_MAX_AGE)
                .await;
            if pruned > 0 {
                tracing::debug!(pruned, "Pruned rate-limit buckets");
            }
        }
    })
}
