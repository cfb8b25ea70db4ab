//! HTTP server setup and routing
//!
//! Sets up the Axum router for schedule CRUD, now-playing queries,
//! scanner status, and the SSE event stream.

use crate::scanner::ScanStatus;
use crate::sink::NotificationSink;
use axum::{
    routing::{delete, get, post},
    Router,
};
use cueflow_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub db_pool: SqlitePool,
    pub event_bus: EventBus,
    /// Notification sink, shared with the scanner; the debug publish
    /// endpoint pushes through the same one
    pub sink: Arc<dyn NotificationSink>,
    /// Read-only view of the scanner's heartbeat counters
    pub scan_status: Arc<ScanStatus>,
    /// Configured scan period, echoed by the status endpoint
    pub poll_rate_ms: u64,
}

/// Build application router
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        // Health and scanner status
        .route("/health", get(super::handlers::health))
        .route("/status", get(super::handlers::scanner_status))
        // Schedule CRUD
        .route("/api/schedules", post(super::handlers::create_schedule))
        .route("/api/schedules", get(super::handlers::list_schedules))
        .route("/api/schedules/upcoming", get(super::handlers::upcoming))
        .route("/api/schedules/now", get(super::handlers::get_now_playing))
        .route("/api/schedules/:id", get(super::handlers::get_schedule))
        .route("/api/schedules/:id", delete(super::handlers::delete_schedule))
        // Debug helpers
        .route(
            "/api/debug/publish-test",
            post(super::handlers::publish_test),
        )
        // SSE event stream
        .route("/events", get(super::sse::event_stream))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
