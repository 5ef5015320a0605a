// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! SSE framing shared by the space-stream and run-stream endpoints.
//!
//! Every event on the wire uses one fixed SSE `event:` name regardless of
//! the envelope's own `type` field — clients switch on `data.type`, not on
//! the SSE frame name.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};

/// The SSE frame name every event is sent under; clients dispatch on the
/// envelope's own `type` field instead.
const SSE_EVENT_NAME: &str = "hsafa";

/// Build the `Sse` response for one channel subscription: replay whatever of
/// the backlog follows `last_event_id` (or the whole backlog, if absent or
/// not found — it's bounded by design), then tail the live broadcast.
pub fn stream_channel(
    backlog: Vec<String>,
    live: tokio::sync::broadcast::Receiver<String>,
    last_event_id: Option<String>,
    keepalive_secs: u64,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let replay = replay_from(backlog, last_event_id);

    let tail = tokio_stream::wrappers::BroadcastStream::new(live).filter_map(|item| async move { item.ok() });

    let events = stream::iter(replay).chain(tail).map(to_event);

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(keepalive_secs))
            .text("keepalive"),
    )
}

fn replay_from(backlog: Vec<String>, last_event_id: Option<String>) -> Vec<String> {
    let Some(last_id) = last_event_id else {
        return backlog;
    };
    match backlog.iter().position(|json| envelope_id(json).as_deref() == Some(last_id.as_str())) {
        Some(idx) => backlog[idx + 1..].to_vec(),
        None => backlog,
    }
}

fn envelope_id(json: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(json)
        .ok()?
        .get("id")?
        .as_str()
        .map(str::to_string)
}

fn to_event(json: String) -> Result<Event, Infallible> {
    let mut event = Event::default().event(SSE_EVENT_NAME);
    if let Some(id) = envelope_id(&json) {
        event = event.id(id);
    }
    Ok(event.data(json))
}
