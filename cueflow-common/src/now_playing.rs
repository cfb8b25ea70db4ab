//! Now-playing resolution
//!
//! Pure computation over a viewer's schedules: which entry is playing at
//! a given instant, how far into it the instant falls, and which entry
//! comes next. No I/O, no shared state.

use crate::db::models::Schedule;
use crate::time::elapsed_whole_minutes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Playback status for a viewer at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlayStatus {
    /// An entry is active right now
    Play,
    /// Nothing is active (there may still be a next entry)
    None,
}

/// Projection of one schedule into a now-playing answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NowPlayingEntry {
    pub id: String,
    pub program_url: Option<String>,
    pub start_at: DateTime<Utc>,
    pub duration_min: i64,
    /// Minutes into the program at resolution time; 0 for the next entry
    pub skip_start_min: i64,
}

/// Computed active/next pair for a viewer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NowPlaying {
    pub status: PlayStatus,
    pub entry: Option<NowPlayingEntry>,
    pub next_entry: Option<NowPlayingEntry>,
}

impl NowPlaying {
    fn none() -> Self {
        NowPlaying {
            status: PlayStatus::None,
            entry: None,
            next_entry: None,
        }
    }
}

/// Resolve the active and next entry for `now` over a viewer's schedules.
///
/// An entry is active when `start <= now < start + duration`; among
/// several simultaneously-active entries (a data anomaly this function
/// resolves rather than rejects) the one with the latest start wins.
/// The next entry is the earliest one with `start > now`. Entries
/// without a start instant are never considered. `start == now` is
/// active, not upcoming; `start + duration == now` has just ended.
pub fn resolve(schedules: &[Schedule], now: DateTime<Utc>) -> NowPlaying {
    if schedules.is_empty() {
        return NowPlaying::none();
    }

    // Ascending by start, ids breaking ties so equal-start inputs
    // resolve reproducibly. Entries without a start are skipped.
    let mut ordered: Vec<(DateTime<Utc>, &Schedule)> = schedules
        .iter()
        .filter_map(|s| s.start_at.map(|start| (start, s)))
        .collect();
    ordered.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.guid.cmp(&b.1.guid)));

    let mut active: Option<(DateTime<Utc>, &Schedule)> = None;
    let mut next: Option<(DateTime<Utc>, &Schedule)> = None;

    for (start, schedule) in ordered {
        let end = start + chrono::Duration::minutes(schedule.effective_duration_min());

        if start <= now && now < end {
            // Later starts overwrite earlier ones: most recently started
            // active entry wins.
            active = Some((start, schedule));
        } else if start > now && next.map_or(true, |(next_start, _)| start < next_start) {
            next = Some((start, schedule));
        }
    }

    let next_entry = next.map(|(start, s)| NowPlayingEntry {
        id: s.guid.clone(),
        program_url: s.program_url.clone(),
        start_at: start,
        duration_min: s.effective_duration_min(),
        skip_start_min: 0,
    });

    match active {
        Some((start, s)) => NowPlaying {
            status: PlayStatus::Play,
            entry: Some(NowPlayingEntry {
                id: s.guid.clone(),
                program_url: s.program_url.clone(),
                start_at: start,
                duration_min: s.effective_duration_min(),
                skip_start_min: elapsed_whole_minutes(start, now),
            }),
            next_entry,
        },
        None => NowPlaying {
            status: PlayStatus::None,
            entry: None,
            next_entry,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Recurrence;
    use chrono::Duration;

    fn schedule(guid: &str, start_offset_min: Option<i64>, duration_min: Option<i64>) -> Schedule {
        let now = base_now();
        Schedule {
            guid: guid.to_string(),
            user_id: "u1".to_string(),
            title: format!("program {}", guid),
            channel: "ch1".to_string(),
            start_at: start_offset_min.map(|m| now + Duration::minutes(m)),
            duration_min,
            recurrence: Recurrence::None,
            program_url: Some(format!("http://example.com/{}.mp4", guid)),
            notes: None,
            preplay_published: Some(false),
            created_at: now,
            updated_at: now,
        }
    }

    fn base_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_empty_set_resolves_none() {
        let result = resolve(&[], base_now());
        assert_eq!(result.status, PlayStatus::None);
        assert!(result.entry.is_none());
        assert!(result.next_entry.is_none());
    }

    #[test]
    fn test_active_mid_program_reports_skip() {
        // Started 5 minutes ago, runs for 60
        let schedules = vec![schedule("a", Some(-5), Some(60))];
        let result = resolve(&schedules, base_now());

        assert_eq!(result.status, PlayStatus::Play);
        let entry = result.entry.unwrap();
        assert_eq!(entry.id, "a");
        assert_eq!(entry.skip_start_min, 5);
        assert!(result.next_entry.is_none());
    }

    #[test]
    fn test_future_only_resolves_none_with_next() {
        let schedules = vec![schedule("a", Some(60), Some(30))];
        let result = resolve(&schedules, base_now());

        assert_eq!(result.status, PlayStatus::None);
        assert!(result.entry.is_none());
        let next = result.next_entry.unwrap();
        assert_eq!(next.id, "a");
        assert_eq!(next.skip_start_min, 0);
    }

    #[test]
    fn test_past_active_future_mix() {
        let schedules = vec![
            schedule("ended", Some(-120), Some(30)),
            schedule("active", Some(-10), Some(60)),
            schedule("future", Some(90), Some(30)),
        ];
        let result = resolve(&schedules, base_now());

        assert_eq!(result.status, PlayStatus::Play);
        assert_eq!(result.entry.unwrap().id, "active");
        assert_eq!(result.next_entry.unwrap().id, "future");
    }

    #[test]
    fn test_default_duration_applies() {
        // No duration: 30 minute default. Started 29 minutes ago, still on.
        let schedules = vec![schedule("a", Some(-29), None)];
        let result = resolve(&schedules, base_now());
        assert_eq!(result.status, PlayStatus::Play);
        assert_eq!(result.entry.as_ref().unwrap().duration_min, 30);

        // Started 30 minutes ago: just ended.
        let schedules = vec![schedule("a", Some(-30), None)];
        let result = resolve(&schedules, base_now());
        assert_eq!(result.status, PlayStatus::None);
    }

    #[test]
    fn test_start_equal_to_now_is_active() {
        let schedules = vec![schedule("a", Some(0), Some(30))];
        let result = resolve(&schedules, base_now());
        assert_eq!(result.status, PlayStatus::Play);
        assert_eq!(result.entry.unwrap().skip_start_min, 0);
    }

    #[test]
    fn test_end_equal_to_now_has_ended() {
        let schedules = vec![schedule("a", Some(-60), Some(60))];
        let result = resolve(&schedules, base_now());
        assert_eq!(result.status, PlayStatus::None);
        assert!(result.entry.is_none());
    }

    #[test]
    fn test_overlapping_actives_latest_start_wins() {
        let schedules = vec![
            schedule("first", Some(-20), Some(60)),
            schedule("second", Some(-5), Some(60)),
        ];
        let result = resolve(&schedules, base_now());
        assert_eq!(result.entry.unwrap().id, "second");
    }

    #[test]
    fn test_equal_start_ties_break_by_id() {
        let schedules = vec![
            schedule("b", Some(-5), Some(60)),
            schedule("a", Some(-5), Some(60)),
        ];
        let result = resolve(&schedules, base_now());
        // Ascending (start, id) order makes "b" the last active seen.
        assert_eq!(result.entry.unwrap().id, "b");
    }

    #[test]
    fn test_null_start_never_considered() {
        let schedules = vec![schedule("no-start", None, Some(60))];
        let result = resolve(&schedules, base_now());
        assert_eq!(result.status, PlayStatus::None);
        assert!(result.entry.is_none());
        assert!(result.next_entry.is_none());
    }

    #[test]
    fn test_nearest_future_entry_is_next() {
        let schedules = vec![
            schedule("later", Some(120), Some(30)),
            schedule("sooner", Some(45), Some(30)),
        ];
        let result = resolve(&schedules, base_now());
        assert_eq!(result.next_entry.unwrap().id, "sooner");
    }

    #[test]
    fn test_skip_minutes_truncate() {
        // 5m30s in: reports 5 whole minutes
        let now = base_now() + Duration::seconds(30);
        let schedules = vec![schedule("a", Some(-5), Some(60))];
        let result = resolve(&schedules, now);
        assert_eq!(result.entry.unwrap().skip_start_min, 5);
    }
}
