//! SSE endpoint

use crate::api::server::AppContext;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /events - Stream scheduler events to the client
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    cueflow_common::sse::create_event_sse_stream(&ctx.event_bus)
}
