//! Database models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Duration applied wherever a schedule omits one, in minutes.
pub const DEFAULT_DURATION_MIN: i64 = 30;

/// Recurrence marker stored with a schedule.
///
/// Stored and echoed back to clients; occurrence expansion happens
/// outside this service, so the scanner only ever sees the single
/// stored occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum Recurrence {
    None,
    Daily,
    Weekly,
    Monthly,
}

impl Default for Recurrence {
    fn default() -> Self {
        Recurrence::None
    }
}

/// One scheduled playback occurrence.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Schedule {
    pub guid: String,
    pub user_id: String,
    pub title: String,
    pub channel: String,
    /// Absolute start instant. Nullable; the scanner and resolver skip
    /// entries without one.
    pub start_at: Option<DateTime<Utc>>,
    pub duration_min: Option<i64>,
    pub recurrence: Recurrence,
    pub program_url: Option<String>,
    pub notes: Option<String>,
    /// Claim flag for the pre-playback notification. NULL is treated the
    /// same as false (rows written before the column existed).
    pub preplay_published: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    /// Duration in minutes, with the missing-value default applied.
    pub fn effective_duration_min(&self) -> i64 {
        self.duration_min.unwrap_or(DEFAULT_DURATION_MIN)
    }

    /// End instant (`start + duration`), if a start is set.
    pub fn end_at(&self) -> Option<DateTime<Utc>> {
        self.start_at
            .map(|start| start + Duration::minutes(self.effective_duration_min()))
    }
}
