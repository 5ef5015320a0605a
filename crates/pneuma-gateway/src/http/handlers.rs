// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The five HTTP handlers (spec.md §6 "HTTP API surface").

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pneuma_broker::{run_channel, space_channel};
use pneuma_core::{submit_tool_result, BusEvent, StreamEnvelope};
use pneuma_inbox::{RecentContextEntry, SenderType, ServiceData, SpaceMessageData};

use crate::error::{GatewayError, GatewayResult};
use crate::http::sse::stream_channel;
use crate::state::AppState;

/// `recentContext` is capped at a handful of prior messages (spec §4.4).
const RECENT_CONTEXT_LIMIT: u32 = 5;

// ── POST /agents/{agentId}/trigger ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TriggerBody {
    pub service_name: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub run_id: Option<String>,
    pub status: &'static str,
    pub stream_url: Option<String>,
}

/// `agentId` here is the agent's `agentEntityId` — the key the Inbox and
/// store index by, not the human-facing `agentId` config label.
pub async fn post_trigger(
    State(state): State<AppState>,
    Path(agent_entity_id): Path<String>,
    Json(body): Json<TriggerBody>,
) -> GatewayResult<Json<TriggerResponse>> {
    state
        .inbox
        .push_service_event(
            &agent_entity_id,
            ServiceData {
                service_name: body.service_name,
                payload: body.payload,
            },
        )
        .await?;

    // The Run this trigger ends up producing isn't created until the
    // worker's next cycle picks it up (spec §4.2) — `runId` is returned
    // lazily, per spec.
    Ok(Json(TriggerResponse {
        run_id: None,
        status: "queued",
        stream_url: None,
    }))
}

// ── POST /smart-spaces/{spaceId}/messages ───────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PostSpaceMessageBody {
    pub sender_entity_id: String,
    pub sender_name: String,
    pub sender_type: SenderType,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct PostSpaceMessageResponse {
    pub message_id: String,
    pub seq: i64,
}

pub async fn post_space_message(
    State(state): State<AppState>,
    Path(smart_space_id): Path<String>,
    Json(body): Json<PostSpaceMessageBody>,
) -> GatewayResult<Json<PostSpaceMessageResponse>> {
    let message_id = Uuid::new_v4().to_string();
    let role = match body.sender_type {
        SenderType::Human => "user",
        SenderType::Agent => "assistant",
    };

    let row = state
        .store
        .insert_space_message(
            &message_id,
            &smart_space_id,
            &body.sender_entity_id,
            role,
            &body.content,
            "{}",
            None,
        )
        .await?;

    let envelope = StreamEnvelope::new(
        Uuid::new_v4().to_string(),
        BusEvent::SpaceMessage {
            message_id: message_id.clone(),
            smart_space_id: smart_space_id.clone(),
            content: body.content.clone(),
            status: "complete".to_string(),
        },
    );
    if let Ok(json) = envelope.to_json() {
        state.bus.publish(&space_channel(&smart_space_id), json);
    }

    let recent_context = state
        .store
        .list_recent_space_messages(&smart_space_id, RECENT_CONTEXT_LIMIT)
        .await?
        .into_iter()
        .map(|m| RecentContextEntry {
            sender_name: m.entity_id,
            sender_type: SenderType::Agent,
            content: m.content,
        })
        .collect::<Vec<_>>();

    let exclude = match body.sender_type {
        SenderType::Agent => body.sender_entity_id.as_str(),
        SenderType::Human => "",
    };
    for recipient in state.membership.other_agent_members(&smart_space_id, exclude) {
        state
            .inbox
            .push_space_message_event(
                &recipient,
                SpaceMessageData {
                    message_id: message_id.clone(),
                    smart_space_id: smart_space_id.clone(),
                    space_name: smart_space_id.clone(),
                    sender_entity_id: body.sender_entity_id.clone(),
                    sender_name: body.sender_name.clone(),
                    sender_type: body.sender_type,
                    content: body.content.clone(),
                    recent_context: Some(recent_context.clone()),
                },
            )
            .await?;
    }

    Ok(Json(PostSpaceMessageResponse {
        message_id,
        seq: row.seq,
    }))
}

// ── GET /smart-spaces/{spaceId}/stream, GET /runs/{runId}/stream ────────────

#[derive(Debug, Deserialize)]
pub struct ReplayQuery {
    pub since: Option<String>,
}

fn last_event_id(headers: &HeaderMap, query: ReplayQuery) -> Option<String> {
    headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or(query.since)
}

pub async fn get_space_stream(
    State(state): State<AppState>,
    Path(smart_space_id): Path<String>,
    Query(query): Query<ReplayQuery>,
    headers: HeaderMap,
) -> axum::response::Sse<impl futures::Stream<Item = Result<axum::response::sse::Event, std::convert::Infallible>>> {
    let (backlog, rx) = state.bus.subscribe(&space_channel(&smart_space_id));
    stream_channel(backlog, rx, last_event_id(&headers, query), state.http.sse_keepalive_secs)
}

pub async fn get_run_stream(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Query(query): Query<ReplayQuery>,
    headers: HeaderMap,
) -> axum::response::Sse<impl futures::Stream<Item = Result<axum::response::sse::Event, std::convert::Infallible>>> {
    let (backlog, rx) = state.bus.subscribe(&run_channel(&run_id));
    stream_channel(backlog, rx, last_event_id(&headers, query), state.http.sse_keepalive_secs)
}

// ── POST /runs/{runId}/tool-results ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ToolResultBody {
    pub call_id: String,
    pub result: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ToolResultResponse {
    pub status: &'static str,
}

pub async fn post_tool_result(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Json(body): Json<ToolResultBody>,
) -> GatewayResult<Json<ToolResultResponse>> {
    let run = state.store.get_run(&run_id).await?;
    let pending = state.store.get_pending_tool_call(&run_id, &body.call_id).await?;
    let message = state
        .store
        .find_space_message_by_call_id(&run_id, &body.call_id)
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("space message for tool call {}", body.call_id)))?;

    submit_tool_result(
        &state.store,
        &state.inbox,
        &state.bus,
        &run.agent_entity_id,
        &run_id,
        &body.call_id,
        &pending.tool_name,
        &message.smart_space_id,
        &message.message_id,
        body.result,
    )
    .await?;

    Ok(Json(ToolResultResponse { status: "ok" }))
}
