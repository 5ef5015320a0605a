// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The event catalogue published to the Fan-out Bus (spec §4.8) and, from
//! there, to SSE subscribers (spec §6).
//!
//! Every [`BusEvent`] is wrapped in a [`StreamEnvelope`] before publication —
//! a stable `id`/`type`/`ts`/`data` shape so reconnecting SSE clients can
//! resume with `Last-Event-ID` regardless of which variant they last saw.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Phase of a streaming `send_message` text delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamPhase {
    Start,
    Delta,
    Done,
}

/// Events published to `space:<id>` and `run:<id>` channels on the Fan-out
/// Bus. Serializes to the `type`/`data` fields of a [`StreamEnvelope`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BusEvent {
    /// The agent has started a cycle. Emitted to every space it belongs to.
    AgentActive { agent_entity_id: String },
    /// The agent's cycle has ended (success or failure).
    AgentInactive { agent_entity_id: String },
    /// A new or updated tool/assistant message, keyed by its persisted
    /// `SpaceMessage` id.
    SpaceMessage {
        message_id: String,
        smart_space_id: String,
        content: String,
        status: String,
    },
    /// A `send_message` text delta. `phase` tracks the lifecycle of one
    /// streamed message (`start` once, `delta` zero or more times, `done`
    /// once).
    SpaceMessageStreaming {
        message_id: String,
        smart_space_id: String,
        phase: StreamPhase,
        text: String,
    },
    /// The model's streaming call errored while a `send_message` call was
    /// in flight.
    SpaceMessageFailed {
        message_id: String,
        smart_space_id: String,
        error: String,
    },
    /// A visible (non-`send_message`) tool call began.
    ToolStarted {
        call_id: String,
        tool_name: String,
    },
    /// Partial-parsed input arguments for a visible tool call, as they
    /// stream in.
    ToolStreaming {
        call_id: String,
        tool_name: String,
        partial_args: Value,
    },
    /// A visible tool call completed (synchronously, or an async tool was
    /// accepted for out-of-band completion).
    ToolDone {
        call_id: String,
        tool_name: String,
        result: Value,
    },
    /// A visible tool call errored.
    ToolError {
        call_id: String,
        tool_name: String,
        error: String,
    },
}

impl BusEvent {
    /// The `type` discriminant as published in the SSE envelope, e.g.
    /// `"space.message.streaming"`.
    pub fn type_str(&self) -> &'static str {
        match self {
            BusEvent::AgentActive { .. } => "agent.active",
            BusEvent::AgentInactive { .. } => "agent.inactive",
            BusEvent::SpaceMessage { .. } => "space.message",
            BusEvent::SpaceMessageStreaming { .. } => "space.message.streaming",
            BusEvent::SpaceMessageFailed { .. } => "space.message.failed",
            BusEvent::ToolStarted { .. } => "tool.started",
            BusEvent::ToolStreaming { .. } => "tool.streaming",
            BusEvent::ToolDone { .. } => "tool.done",
            BusEvent::ToolError { .. } => "tool.error",
        }
    }
}

/// The wire envelope every [`BusEvent`] is published under (spec §6 "SSE
/// event envelope"). `id` is the stream-local event id an SSE client can
/// echo back as `Last-Event-ID` to resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub ts: DateTime<Utc>,
    pub data: BusEvent,
}

impl StreamEnvelope {
    pub fn new(id: impl Into<String>, event: BusEvent) -> Self {
        Self {
            id: id.into(),
            event_type: event.type_str().to_string(),
            ts: Utc::now(),
            data: event,
        }
    }

    /// Serialize to the JSON string published on the Fan-out Bus's opaque
    /// `String` channels.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_str_matches_the_event_catalogue() {
        assert_eq!(
            BusEvent::AgentActive { agent_entity_id: "a1".into() }.type_str(),
            "agent.active"
        );
        assert_eq!(
            BusEvent::SpaceMessageStreaming {
                message_id: "m1".into(),
                smart_space_id: "s1".into(),
                phase: StreamPhase::Delta,
                text: "hi".into(),
            }
            .type_str(),
            "space.message.streaming"
        );
    }

    #[test]
    fn envelope_round_trips_through_json() {
        let envelope = StreamEnvelope::new(
            "evt-1",
            BusEvent::ToolDone {
                call_id: "c1".into(),
                tool_name: "grep".into(),
                result: serde_json::json!({"matches": 3}),
            },
        );
        let json = envelope.to_json().unwrap();
        assert!(json.contains("\"type\":\"tool.done\""));

        let decoded: StreamEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.id, "evt-1");
        assert_eq!(decoded.event_type, "tool.done");
    }
}
