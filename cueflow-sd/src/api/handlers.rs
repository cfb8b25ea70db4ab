//! HTTP request handlers
//!
//! Implements the REST endpoints for schedule CRUD, now-playing
//! queries, scanner status, and the debug publish helper.

use crate::api::server::AppContext;
use crate::db::schedules;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use cueflow_common::db::models::{Recurrence, Schedule, DEFAULT_DURATION_MIN};
use cueflow_common::events::{PrePlaybackEvent, SchedulerEvent};
use cueflow_common::now_playing::{self, NowPlaying};
use cueflow_common::time;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct ScannerStatusResponse {
    last_scan: Option<DateTime<Utc>>,
    scan_count: u64,
    poll_rate_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateScheduleRequest {
    user_id: String,
    title: String,
    channel: String,
    /// Absolute start instant (RFC3339); normalized to UTC on the way in
    start_at: DateTime<Utc>,
    duration_min: Option<i64>,
    #[serde(default)]
    recurrence: Recurrence,
    program_url: Option<String>,
    notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    id: String,
    user_id: String,
    title: String,
    channel: String,
    start_at: Option<DateTime<Utc>>,
    duration_min: Option<i64>,
    recurrence: Recurrence,
    program_url: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<Schedule> for ScheduleResponse {
    fn from(s: Schedule) -> Self {
        ScheduleResponse {
            id: s.guid,
            user_id: s.user_id,
            title: s.title,
            channel: s.channel,
            start_at: s.start_at,
            duration_min: s.duration_min,
            recurrence: s.recurrence,
            program_url: s.program_url,
            notes: s.notes,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    user_id: Option<String>,
    channel: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    user_id: Option<String>,
    channel: Option<String>,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct NowQuery {
    user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PublishTestQuery {
    id: Option<String>,
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PublishTestResponse {
    status: String,
    schedule_id: String,
}

// ============================================================================
// Health and Status Endpoints
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "schedule_daemon".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /status - Scanner heartbeat counters
pub async fn scanner_status(State(ctx): State<AppContext>) -> Json<ScannerStatusResponse> {
    Json(ScannerStatusResponse {
        last_scan: ctx.scan_status.last_scan(),
        scan_count: ctx.scan_status.scan_count(),
        poll_rate_ms: ctx.poll_rate_ms,
    })
}

// ============================================================================
// Schedule CRUD Endpoints
// ============================================================================

/// POST /api/schedules - Create a schedule
pub async fn create_schedule(
    State(ctx): State<AppContext>,
    Json(req): Json<CreateScheduleRequest>,
) -> ApiResult<(StatusCode, Json<ScheduleResponse>)> {
    if req.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("user_id is required".to_string()));
    }
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title is required".to_string()));
    }
    if req.channel.trim().is_empty() {
        return Err(ApiError::BadRequest("channel is required".to_string()));
    }
    if let Some(duration) = req.duration_min {
        if duration < 1 {
            return Err(ApiError::BadRequest(
                "duration_min must be at least 1 minute".to_string(),
            ));
        }
    }

    let now = time::now();
    let schedule = Schedule {
        guid: Uuid::new_v4().to_string(),
        user_id: req.user_id,
        title: req.title,
        channel: req.channel,
        start_at: Some(req.start_at),
        duration_min: req.duration_min,
        recurrence: req.recurrence,
        program_url: req.program_url,
        notes: req.notes,
        preplay_published: Some(false),
        created_at: now,
        updated_at: now,
    };

    info!(
        "creating schedule user_id={} title={} start_at={:?}",
        schedule.user_id, schedule.title, schedule.start_at
    );
    schedules::insert(&ctx.db_pool, &schedule).await?;

    ctx.event_bus
        .emit(SchedulerEvent::ScheduleCreated {
            schedule_id: schedule.guid.clone(),
            user_id: schedule.user_id.clone(),
            channel: schedule.channel.clone(),
            start_at: schedule.start_at,
            timestamp: now,
        })
        .ok();

    Ok((StatusCode::CREATED, Json(schedule.into())))
}

/// GET /api/schedules - List schedules, optionally filtered
///
/// `user_id` takes precedence over `channel` when both are given.
pub async fn list_schedules(
    State(ctx): State<AppContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<ScheduleResponse>>> {
    let schedules = match (&query.user_id, &query.channel) {
        (Some(user_id), _) if !user_id.is_empty() => {
            schedules::find_by_user(&ctx.db_pool, user_id).await?
        }
        (_, Some(channel)) if !channel.is_empty() => {
            schedules::find_by_channel(&ctx.db_pool, channel).await?
        }
        _ => schedules::find_all(&ctx.db_pool).await?,
    };

    Ok(Json(schedules.into_iter().map(Into::into).collect()))
}

/// GET /api/schedules/upcoming - Future schedules, soonest first
pub async fn upcoming(
    State(ctx): State<AppContext>,
    Query(query): Query<UpcomingQuery>,
) -> ApiResult<Json<Vec<ScheduleResponse>>> {
    let limit = match query.limit {
        Some(l) if l > 0 => l as usize,
        _ => 10,
    };
    let now = time::now();

    let source = match (&query.user_id, &query.channel) {
        (Some(user_id), _) if !user_id.is_empty() => {
            schedules::find_by_user(&ctx.db_pool, user_id).await?
        }
        (_, Some(channel)) if !channel.is_empty() => {
            schedules::find_by_channel(&ctx.db_pool, channel).await?
        }
        _ => schedules::find_all(&ctx.db_pool).await?,
    };

    let mut future: Vec<(DateTime<Utc>, Schedule)> = source
        .into_iter()
        .filter_map(|s| s.start_at.map(|start| (start, s)))
        .filter(|(start, _)| *start >= now)
        .collect();
    future.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.guid.cmp(&b.1.guid)));

    Ok(Json(
        future
            .into_iter()
            .take(limit)
            .map(|(_, s)| s.into())
            .collect(),
    ))
}

/// GET /api/schedules/now - Now-playing resolution for a viewer
pub async fn get_now_playing(
    State(ctx): State<AppContext>,
    Query(query): Query<NowQuery>,
) -> ApiResult<Json<NowPlaying>> {
    let schedules = schedules::find_by_user(&ctx.db_pool, &query.user_id).await?;
    Ok(Json(now_playing::resolve(&schedules, time::now())))
}

/// GET /api/schedules/:id - Fetch one schedule
pub async fn get_schedule(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<ScheduleResponse>> {
    match schedules::find_by_id(&ctx.db_pool, &id).await? {
        Some(schedule) => Ok(Json(schedule.into())),
        None => Err(ApiError::NotFound(format!("schedule {}", id))),
    }
}

/// DELETE /api/schedules/:id - Delete a schedule
///
/// Deleting is idempotent; an id that no longer exists still returns
/// 204 (it may have raced another delete).
pub async fn delete_schedule(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let existed = schedules::delete(&ctx.db_pool, &id).await?;

    if existed {
        ctx.event_bus
            .emit(SchedulerEvent::ScheduleDeleted {
                schedule_id: id,
                timestamp: time::now(),
            })
            .ok();
    }

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Debug Endpoints
// ============================================================================

/// POST /api/debug/publish-test - Push a synthetic event through the sink
pub async fn publish_test(
    State(ctx): State<AppContext>,
    Query(query): Query<PublishTestQuery>,
) -> ApiResult<Json<PublishTestResponse>> {
    let schedule_id = query.id.unwrap_or_else(|| "manual1".to_string());
    let user_id = query.user_id.unwrap_or_else(|| "u1".to_string());

    let event = PrePlaybackEvent {
        schedule_id: schedule_id.clone(),
        user_id,
        channel: "debug-channel".to_string(),
        program_url: Some("http://example.com/video.mp4".to_string()),
        start_at: time::now() + Duration::minutes(5),
        duration_min: Some(DEFAULT_DURATION_MIN),
    };

    ctx.sink
        .publish(&event)
        .await
        .map_err(|e| ApiError::Internal(format!("publish failed: {}", e)))?;

    Ok(Json(PublishTestResponse {
        status: "published".to_string(),
        schedule_id,
    }))
}
