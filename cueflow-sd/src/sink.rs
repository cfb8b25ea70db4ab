//! Notification sink
//!
//! The scanner hands claimed entries to a sink and moves on: publish
//! failures are logged by the dispatcher, never retried, and never
//! revert a claim. The production sink POSTs the payload with its
//! routing metadata to the playback service's notification endpoint.

use cueflow_common::events::PrePlaybackEvent;
use cueflow_common::{Error, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Destination for pre-playback notifications
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    /// Publish one payload; fire-and-forget from the engine's view
    async fn publish(&self, event: &PrePlaybackEvent) -> Result<()>;
}

/// Envelope wrapping a payload with its routing metadata
#[derive(Debug, Serialize)]
struct PublishEnvelope<'a> {
    exchange: &'a str,
    routing_key: &'a str,
    payload: &'a PrePlaybackEvent,
}

/// Sink that delivers notifications over HTTP
pub struct HttpNotificationSink {
    client: reqwest::Client,
    endpoint: String,
    exchange: String,
    routing_key: String,
}

impl HttpNotificationSink {
    pub fn new(endpoint: String, exchange: String, routing_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Publish(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            exchange,
            routing_key,
        })
    }
}

#[async_trait::async_trait]
impl NotificationSink for HttpNotificationSink {
    async fn publish(&self, event: &PrePlaybackEvent) -> Result<()> {
        debug!(
            "Publishing PrePlaybackEvent schedule_id={} start_at={} to exchange={} routing_key={}",
            event.schedule_id, event.start_at, self.exchange, self.routing_key
        );

        let envelope = PublishEnvelope {
            exchange: &self.exchange,
            routing_key: &self.routing_key,
            payload: event,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| Error::Publish(format!("Sink request failed: {}", e)))?;

        response
            .error_for_status()
            .map_err(|e| Error::Publish(format!("Sink rejected publish: {}", e)))?;

        Ok(())
    }
}

/// Sink used when no endpoint is configured; accepts and drops payloads
pub struct NullNotificationSink;

#[async_trait::async_trait]
impl NotificationSink for NullNotificationSink {
    async fn publish(&self, event: &PrePlaybackEvent) -> Result<()> {
        debug!(
            "No sink endpoint configured; dropping PrePlaybackEvent schedule_id={}",
            event.schedule_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_envelope_serialization_shape() {
        let event = PrePlaybackEvent {
            schedule_id: "s1".to_string(),
            user_id: "u1".to_string(),
            channel: "ch1".to_string(),
            program_url: Some("http://example.com/video.mp4".to_string()),
            start_at: Utc::now(),
            duration_min: Some(30),
        };
        let envelope = PublishEnvelope {
            exchange: "scheduler.events",
            routing_key: "schedule.preplay",
            payload: &event,
        };

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["exchange"], "scheduler.events");
        assert_eq!(json["routing_key"], "schedule.preplay");
        assert_eq!(json["payload"]["schedule_id"], "s1");
        assert_eq!(json["payload"]["duration_min"], 30);
    }
}
