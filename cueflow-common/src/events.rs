//! Event types for the cueflow event system
//!
//! Provides the shared event definitions and EventBus used by the
//! schedule daemon. Events are broadcast in-process and can be
//! serialized for SSE transmission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Scheduler event types
///
/// Broadcast via [`EventBus`] and streamed to SSE clients as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SchedulerEvent {
    /// A schedule was created through the API
    ScheduleCreated {
        schedule_id: String,
        user_id: String,
        channel: String,
        start_at: Option<DateTime<Utc>>,
        timestamp: DateTime<Utc>,
    },

    /// A schedule was deleted through the API
    ScheduleDeleted {
        schedule_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A pre-playback notification was claimed and handed to the sink
    ///
    /// Emitted after the claim succeeds, regardless of whether the sink
    /// accepted the payload (sink failures are logged, not retried).
    PrePlaybackDispatched {
        schedule_id: String,
        user_id: String,
        channel: String,
        start_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// One scan cycle finished
    ScanCompleted {
        scan_number: u64,
        candidates: usize,
        claimed: usize,
        dispatched: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Immutable pre-playback notification payload
///
/// Snapshotted from a schedule at claim time and handed to the
/// notification sink; it has no lifecycle of its own. The duration is
/// carried as stored (consumers apply the 30-minute default).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrePlaybackEvent {
    pub schedule_id: String,
    pub user_id: String,
    pub channel: String,
    pub program_url: Option<String>,
    pub start_at: DateTime<Utc>,
    pub duration_min: Option<i64>,
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for daemon-wide events
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SchedulerEvent>,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    ///
    /// `capacity` is the number of events buffered before old events are
    /// dropped for lagging subscribers.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` when nobody is listening. Callers treat the error as
    /// informational; event delivery is best-effort.
    pub fn emit(
        &self,
        event: SchedulerEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<SchedulerEvent>> {
        self.tx.send(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_reaches_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(SchedulerEvent::ScheduleDeleted {
            schedule_id: "abc".to_string(),
            timestamp: chrono::Utc::now(),
        })
        .unwrap();

        match rx.recv().await.unwrap() {
            SchedulerEvent::ScheduleDeleted { schedule_id, .. } => {
                assert_eq!(schedule_id, "abc");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(16);
        let result = bus.emit(SchedulerEvent::ScheduleDeleted {
            schedule_id: "abc".to_string(),
            timestamp: chrono::Utc::now(),
        });
        assert!(result.is_err());
    }
}
