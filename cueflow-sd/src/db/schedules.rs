//! Schedule queries
//!
//! All timestamps are stored as RFC3339 UTC text. Time-window filtering
//! happens in code, not SQL, so these queries stay plain row fetches.
//! The one exception is `claim_preplay`, whose conditional UPDATE is the
//! scanner's claim primitive.

use chrono::{DateTime, Utc};
use cueflow_common::db::models::Schedule;
use cueflow_common::Result;
use sqlx::SqlitePool;

const SCHEDULE_COLUMNS: &str = "guid, user_id, title, channel, start_at, duration_min, \
     recurrence, program_url, notes, preplay_published, created_at, updated_at";

/// Insert a new schedule row
pub async fn insert(pool: &SqlitePool, schedule: &Schedule) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO schedules
            (guid, user_id, title, channel, start_at, duration_min,
             recurrence, program_url, notes, preplay_published, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&schedule.guid)
    .bind(&schedule.user_id)
    .bind(&schedule.title)
    .bind(&schedule.channel)
    .bind(schedule.start_at.map(|t| t.to_rfc3339()))
    .bind(schedule.duration_min)
    .bind(schedule.recurrence)
    .bind(&schedule.program_url)
    .bind(&schedule.notes)
    .bind(schedule.preplay_published)
    .bind(schedule.created_at.to_rfc3339())
    .bind(schedule.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch one schedule by id
pub async fn find_by_id(pool: &SqlitePool, guid: &str) -> Result<Option<Schedule>> {
    let schedule = sqlx::query_as::<_, Schedule>(&format!(
        "SELECT {} FROM schedules WHERE guid = ?",
        SCHEDULE_COLUMNS
    ))
    .bind(guid)
    .fetch_optional(pool)
    .await?;

    Ok(schedule)
}

/// Fetch every schedule
pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Schedule>> {
    let schedules = sqlx::query_as::<_, Schedule>(&format!(
        "SELECT {} FROM schedules",
        SCHEDULE_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(schedules)
}

/// Fetch all schedules owned by one user
pub async fn find_by_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Schedule>> {
    let schedules = sqlx::query_as::<_, Schedule>(&format!(
        "SELECT {} FROM schedules WHERE user_id = ?",
        SCHEDULE_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(schedules)
}

/// Fetch all schedules on one channel
pub async fn find_by_channel(pool: &SqlitePool, channel: &str) -> Result<Vec<Schedule>> {
    let schedules = sqlx::query_as::<_, Schedule>(&format!(
        "SELECT {} FROM schedules WHERE channel = ?",
        SCHEDULE_COLUMNS
    ))
    .bind(channel)
    .fetch_all(pool)
    .await?;

    Ok(schedules)
}

/// Delete a schedule; returns whether a row existed
///
/// Deleting mid-scan is tolerated: a claim racing this delete matches
/// zero rows and reports the entry as already handled.
pub async fn delete(pool: &SqlitePool, guid: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM schedules WHERE guid = ?")
        .bind(guid)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Atomically claim a schedule for pre-playback notification
///
/// Sets the claim flag and touches `updated_at`, but only when the flag
/// is still unset (0 or NULL). SQLite executes the single UPDATE
/// atomically, so under any number of concurrent attempts exactly one
/// caller sees `true`. That caller dispatches, everyone else must not.
pub async fn claim_preplay(pool: &SqlitePool, guid: &str, now: DateTime<Utc>) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE schedules
        SET preplay_published = 1, updated_at = ?
        WHERE guid = ? AND (preplay_published = 0 OR preplay_published IS NULL)
        "#,
    )
    .bind(now.to_rfc3339())
    .bind(guid)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}
