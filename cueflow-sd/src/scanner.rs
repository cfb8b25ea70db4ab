//! Pre-playback scan service
//!
//! Runs a scan cycle on a fixed period. Each cycle reads the schedule
//! store, filters entries whose start falls inside the lookahead window,
//! then claims and dispatches each candidate independently. Claiming is
//! a single conditional UPDATE per entry, so any number of daemon
//! instances can scan the same database and each entry is dispatched at
//! most once.

use crate::db::schedules;
use crate::sink::NotificationSink;
use chrono::{DateTime, Duration, Utc};
use cueflow_common::config::Config;
use cueflow_common::db::models::Schedule;
use cueflow_common::events::{EventBus, PrePlaybackEvent, SchedulerEvent};
use cueflow_common::{time, Result};
use futures::StreamExt;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// Scan service configuration
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Scan period in milliseconds (default: 60s)
    pub poll_rate_ms: u64,

    /// Window lead time in seconds (default: 5 minutes)
    pub window_lead_secs: i64,

    /// Window width in seconds (default: 1 minute)
    pub window_width_secs: i64,

    /// Bound on concurrent claim/dispatch work per cycle (default: 8)
    pub dispatch_concurrency: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            poll_rate_ms: 60_000,
            window_lead_secs: 300,
            window_width_secs: 60,
            dispatch_concurrency: 8,
        }
    }
}

impl From<&Config> for ScanConfig {
    fn from(config: &Config) -> Self {
        Self {
            poll_rate_ms: config.poll_rate_ms,
            window_lead_secs: config.window_lead_secs,
            window_width_secs: config.window_width_secs,
            dispatch_concurrency: config.dispatch_concurrency,
        }
    }
}

/// Process-local scan observability state
///
/// Written only by the scan cycle itself; everything else reads.
#[derive(Default)]
pub struct ScanStatus {
    /// Epoch milliseconds of the last scan; 0 = never scanned
    last_scan_ms: AtomicI64,
    /// Monotonically increasing scan counter
    scan_count: AtomicU64,
}

impl ScanStatus {
    /// Time the last scan cycle started, if any ran yet
    pub fn last_scan(&self) -> Option<DateTime<Utc>> {
        let ms = self.last_scan_ms.load(Ordering::SeqCst);
        if ms == 0 {
            return None;
        }
        DateTime::from_timestamp_millis(ms)
    }

    /// Number of scan cycles started since boot
    pub fn scan_count(&self) -> u64 {
        self.scan_count.load(Ordering::SeqCst)
    }

    fn record_scan(&self, now: DateTime<Utc>) -> u64 {
        self.last_scan_ms
            .store(now.timestamp_millis(), Ordering::SeqCst);
        self.scan_count.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Counts from one completed scan cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOutcome {
    pub scan_number: u64,
    pub candidates: usize,
    pub claimed: usize,
    pub dispatched: usize,
}

/// True when `start` falls inside the half-open window `[lo, hi)`
pub fn in_window(start: DateTime<Utc>, lo: DateTime<Utc>, hi: DateTime<Utc>) -> bool {
    lo <= start && start < hi
}

/// Scan Service
///
/// Owns the recurring timer and runs the window-filter → claim →
/// dispatch pipeline each tick.
pub struct ScanService {
    config: ScanConfig,
    pool: SqlitePool,
    sink: Arc<dyn NotificationSink>,
    event_bus: EventBus,
    status: Arc<ScanStatus>,
}

impl ScanService {
    pub fn new(
        config: ScanConfig,
        pool: SqlitePool,
        sink: Arc<dyn NotificationSink>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            config,
            pool,
            sink,
            event_bus,
            status: Arc::new(ScanStatus::default()),
        }
    }

    /// Shared handle to the scan counters for the status API
    pub fn status(&self) -> Arc<ScanStatus> {
        Arc::clone(&self.status)
    }

    /// Run the scan service (spawns background task)
    ///
    /// Ticks on the configured period until the process exits. Each tick
    /// runs one cycle in its own task: a cycle that outlives the period
    /// overlaps the next one, which is safe because every entry's claim
    /// is atomic and idempotent-safe. A failed cycle is logged and never
    /// stops future ticks.
    pub fn run(self: Arc<Self>) {
        info!(
            "Starting ScanService (poll rate: {}ms, window: +{}s..+{}s)",
            self.config.poll_rate_ms,
            self.config.window_lead_secs,
            self.config.window_lead_secs + self.config.window_width_secs
        );

        tokio::spawn(async move {
            let mut timer = interval(time::millis_to_duration(self.config.poll_rate_ms));
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                timer.tick().await;

                let service = Arc::clone(&self);
                tokio::spawn(async move {
                    let now = time::now();
                    if let Err(e) = service.scan_cycle(now).await {
                        error!("Scan cycle failed: {}", e);
                    }
                });
            }
        });
    }

    /// Run one scan cycle at `now`
    ///
    /// Candidates are processed concurrently and joined before the cycle
    /// completes, so the returned counts cover the whole cycle. Claim
    /// and publish failures are isolated per entry; only a failed store
    /// read fails the cycle itself.
    pub async fn scan_cycle(&self, now: DateTime<Utc>) -> Result<ScanOutcome> {
        let scan_number = self.status.record_scan(now);

        let window_lo = now + Duration::seconds(self.config.window_lead_secs);
        let window_hi = window_lo + Duration::seconds(self.config.window_width_secs);
        info!("scan #{} at {}", scan_number, now);
        debug!(
            "scan #{} scanning for events between {} and {}",
            scan_number, window_lo, window_hi
        );

        let candidates: Vec<(DateTime<Utc>, Schedule)> = schedules::find_all(&self.pool)
            .await?
            .into_iter()
            .filter_map(|s| s.start_at.map(|start| (start, s)))
            .filter(|(start, _)| in_window(*start, window_lo, window_hi))
            .collect();

        debug!(
            "scan #{} found {} candidate(s) in window",
            scan_number,
            candidates.len()
        );

        let candidate_count = candidates.len();
        let claimed = AtomicUsize::new(0);
        let dispatched = AtomicUsize::new(0);

        futures::stream::iter(candidates)
            .for_each_concurrent(self.config.dispatch_concurrency, |(start, schedule)| {
                let claimed = &claimed;
                let dispatched = &dispatched;
                async move {
                    match schedules::claim_preplay(&self.pool, &schedule.guid, time::now()).await {
                        Ok(true) => {
                            claimed.fetch_add(1, Ordering::SeqCst);
                            info!(
                                "scan #{} claimed schedule id={} start_at={}, publishing",
                                scan_number, schedule.guid, start
                            );
                            if self.dispatch(start, &schedule).await {
                                dispatched.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                        Ok(false) => {
                            // Lost the race: another scanner or an earlier
                            // tick already handled this entry.
                            debug!(
                                "scan #{} schedule id={} already published by another worker",
                                scan_number, schedule.guid
                            );
                        }
                        Err(e) => {
                            // Entry remains unclaimed and eligible for a
                            // future tick.
                            warn!(
                                "scan #{} claim attempt failed for schedule id={}: {}",
                                scan_number, schedule.guid, e
                            );
                        }
                    }
                }
            })
            .await;

        let outcome = ScanOutcome {
            scan_number,
            candidates: candidate_count,
            claimed: claimed.load(Ordering::SeqCst),
            dispatched: dispatched.load(Ordering::SeqCst),
        };

        self.event_bus
            .emit(SchedulerEvent::ScanCompleted {
                scan_number,
                candidates: outcome.candidates,
                claimed: outcome.claimed,
                dispatched: outcome.dispatched,
                timestamp: now,
            })
            .ok();

        Ok(outcome)
    }

    /// Build the notification payload and push it to the sink
    ///
    /// Returns whether the sink accepted it. A rejected publish is
    /// logged and the claim stands: claim success, not delivery, is the
    /// durability boundary.
    async fn dispatch(&self, start: DateTime<Utc>, schedule: &Schedule) -> bool {
        let event = PrePlaybackEvent {
            schedule_id: schedule.guid.clone(),
            user_id: schedule.user_id.clone(),
            channel: schedule.channel.clone(),
            program_url: schedule.program_url.clone(),
            start_at: start,
            duration_min: schedule.duration_min,
        };

        match self.sink.publish(&event).await {
            Ok(()) => {
                self.event_bus
                    .emit(SchedulerEvent::PrePlaybackDispatched {
                        schedule_id: schedule.guid.clone(),
                        user_id: schedule.user_id.clone(),
                        channel: schedule.channel.clone(),
                        start_at: start,
                        timestamp: time::now(),
                    })
                    .ok();
                true
            }
            Err(e) => {
                error!("publish failed for schedule id={}: {}", schedule.guid, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_config_defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.poll_rate_ms, 60_000);
        assert_eq!(config.window_lead_secs, 300);
        assert_eq!(config.window_width_secs, 60);
        assert_eq!(config.dispatch_concurrency, 8);
    }

    #[test]
    fn test_window_boundaries_half_open() {
        let now = time::now();
        let lo = now + Duration::minutes(5);
        let hi = now + Duration::minutes(6);

        // Lower bound inclusive
        assert!(in_window(lo, lo, hi));
        // Upper bound exclusive
        assert!(!in_window(hi, lo, hi));
        // Just under the lead time
        assert!(!in_window(lo - Duration::seconds(1), lo, hi));
        // Mid-window
        assert!(in_window(lo + Duration::seconds(30), lo, hi));
    }

    #[test]
    fn test_scan_status_starts_empty() {
        let status = ScanStatus::default();
        assert_eq!(status.scan_count(), 0);
        assert!(status.last_scan().is_none());
    }

    #[test]
    fn test_scan_status_records() {
        let status = ScanStatus::default();
        let now = time::now();
        assert_eq!(status.record_scan(now), 1);
        assert_eq!(status.record_scan(now), 2);
        assert_eq!(status.scan_count(), 2);
        let recorded = status.last_scan().unwrap();
        assert_eq!(recorded.timestamp_millis(), now.timestamp_millis());
    }
}
