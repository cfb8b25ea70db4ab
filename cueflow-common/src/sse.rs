//! Server-Sent Events (SSE) utilities
//!
//! Bridges the in-process [`EventBus`](crate::events::EventBus) to an
//! SSE response stream, with periodic heartbeats for connection status
//! monitoring.

use crate::events::{EventBus, SchedulerEvent};
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

enum Tick {
    Bus(Result<SchedulerEvent, RecvError>),
    Heartbeat,
}

/// Create an SSE stream that forwards all bus events to the client
///
/// Each event is serialized to JSON (tagged by variant). Heartbeat
/// comments keep idle connections alive. Subscribers that lag behind the
/// bus skip the missed events and continue.
pub fn create_event_sse_stream(
    bus: &EventBus,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to scheduler events");
    let mut rx = bus.subscribe();

    let stream = async_stream::stream! {
        // Send initial connected status
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            let tick = tokio::select! {
                received = rx.recv() => Tick::Bus(received),
                _ = tokio::time::sleep(Duration::from_secs(15)) => Tick::Heartbeat,
            };

            match tick {
                Tick::Bus(Ok(event)) => match serde_json::to_string(&event) {
                    Ok(json) => {
                        yield Ok(Event::default().event("SchedulerEvent").data(json));
                    }
                    Err(e) => {
                        warn!("SSE: Failed to serialize event: {}", e);
                    }
                },
                Tick::Bus(Err(RecvError::Lagged(skipped))) => {
                    warn!("SSE: client lagged, skipped {} events", skipped);
                }
                Tick::Bus(Err(RecvError::Closed)) => {
                    debug!("SSE: event bus closed, ending stream");
                    break;
                }
                Tick::Heartbeat => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
