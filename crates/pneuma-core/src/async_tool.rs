// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The Async-Tool Manager (C7, spec §4.7) — wraps a tool call whose
//! authoritative execution happens outside this process (a human approval,
//! a long-running external job) so the worker's think cycle never blocks
//! on it.
//!
//! `execute_async` is what the tool registry calls in place of a normal
//! `Tool::execute`: it records the pending call and returns immediately.
//! `submit_tool_result` is the out-of-band completion path — called once,
//! from wherever the external system reports back.

use chrono::Utc;
use thiserror::Error;

use pneuma_broker::FanoutBus;
use pneuma_inbox::{Inbox, ToolResultData};
use pneuma_store::{PendingToolCallRow, Store, StoreError};

use crate::events::BusEvent;

#[derive(Debug, Error)]
pub enum AsyncToolError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("inbox error: {0}")]
    Inbox(#[from] pneuma_inbox::InboxError),
}

impl AsyncToolError {
    pub fn is_already_completed(&self) -> bool {
        matches!(self, AsyncToolError::Store(StoreError::AlreadyCompleted(_)))
    }
}

/// Record a pending tool call and hand back the `{"status":"pending"}`
/// placeholder result the think cycle treats as this tool call's output
/// (spec §4.7 step 1-2).
pub async fn execute_async(
    store: &Store,
    run_id: &str,
    call_id: &str,
    tool_name: &str,
    input: &serde_json::Value,
) -> Result<serde_json::Value, AsyncToolError> {
    let input_json = serde_json::to_string(input).unwrap_or_else(|_| "null".to_string());
    let row = PendingToolCallRow {
        run_id: run_id.to_string(),
        call_id: call_id.to_string(),
        tool_name: tool_name.to_string(),
        input_json,
        status: "pending".to_string(),
        output_json: None,
        requested_at: Utc::now().to_rfc3339(),
        completed_at: None,
    };
    store.insert_pending_tool_call(row).await?;
    Ok(serde_json::json!({ "status": "pending" }))
}

/// Resolve a pending async tool call from outside the worker's own cycle
/// (spec §4.7 `submitToolResult`): complete the pending-call row (guarded —
/// `AlreadyCompleted` on a second submission for the same call), update and
/// re-broadcast the `SpaceMessage` the Stream Processor left at
/// `requires_action`, and push a `tool_result` inbox event so the owning
/// agent's next cycle sees the result.
pub async fn submit_tool_result(
    store: &Store,
    inbox: &Inbox,
    bus: &FanoutBus,
    agent_entity_id: &str,
    run_id: &str,
    call_id: &str,
    tool_name: &str,
    smart_space_id: &str,
    message_id: &str,
    result: serde_json::Value,
) -> Result<(), AsyncToolError> {
    let output_json = serde_json::to_string(&result).unwrap_or_else(|_| "null".to_string());
    let completed_at = Utc::now().to_rfc3339();
    store
        .complete_pending_tool_call(run_id, call_id, &output_json, &completed_at)
        .await?;

    let content = format!("`{tool_name}` completed: {result}");
    let metadata = serde_json::json!({
        "status": "complete",
        "call_id": call_id,
        "tool_name": tool_name,
    })
    .to_string();
    store.update_space_message(message_id, &content, &metadata).await?;

    let envelope = crate::events::StreamEnvelope::new(
        uuid::Uuid::new_v4().to_string(),
        BusEvent::ToolDone {
            call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
            result: result.clone(),
        },
    );
    if let Ok(json) = envelope.to_json() {
        bus.publish(&pneuma_broker::space_channel(smart_space_id), json.clone());
        bus.publish(&pneuma_broker::run_channel(run_id), json);
    }

    inbox
        .push_tool_result_event(
            agent_entity_id,
            ToolResultData {
                tool_call_id: call_id.to_string(),
                tool_name: tool_name.to_string(),
                result,
            },
        )
        .await?;

    Ok(())
}
