// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The Stream Processor (C5, spec §4.5) — consumes one think cycle's LLM
//! event stream and turns it into Fan-out Bus events plus a persisted
//! `SpaceMessage` per visible tool call.
//!
//! Two tool names get special handling: the designated `send_message` tool
//! (always visible, streams its `text` argument as space messages) and the
//! designated `skip` tool (no stream effect at all — the worker detects it
//! afterward by inspecting the returned tool calls).

use std::collections::{HashMap, HashSet};

use futures::StreamExt;
use serde_json::json;
use uuid::Uuid;

use pneuma_broker::FanoutBus;
use pneuma_model::ResponseStream;
use pneuma_store::Store;
use pneuma_tools::ToolCall;

use crate::events::{BusEvent, StreamEnvelope, StreamPhase};

pub const SEND_MESSAGE_TOOL: &str = "send_message";
pub const SKIP_TOOL: &str = "skip";

/// Inputs the Stream Processor needs beyond the raw event stream itself.
pub struct StreamContext<'a> {
    pub run_id: &'a str,
    pub active_space_id: &'a str,
    pub agent_entity_id: &'a str,
    pub store: &'a Store,
    pub bus: &'a FanoutBus,
    /// Tool names whose activity is broadcast and persisted as a
    /// `SpaceMessage` (spec §4.5 point 4). `send_message` is always treated
    /// as visible regardless of membership here.
    pub visible_tools: &'a HashSet<String>,
    /// Tool names whose authoritative execution happens outside this
    /// process (spec §4.7); their persisted message starts at
    /// `requires_action` instead of `running`.
    pub async_tools: &'a HashSet<String>,
}

/// What one `processStream` call hands back to the worker.
#[derive(Debug, Default)]
pub struct ProcessedStream {
    pub tool_calls: Vec<ToolCall>,
    /// Agent-internal text — collected but never broadcast (spec §4.5 point 1).
    pub text: String,
}

#[derive(Default)]
struct CallState {
    tool_name: String,
    args_buf: String,
    last_text_len: usize,
    is_visible: bool,
    is_send_message: bool,
    is_async: bool,
    persisted_message_id: Option<String>,
    id: String,
}

/// Consume one think cycle's LLM event stream, publishing Fan-out Bus events
/// and persisting `SpaceMessage` rows as tool calls progress.
pub async fn process_stream(
    mut stream: ResponseStream,
    ctx: &StreamContext<'_>,
) -> anyhow::Result<ProcessedStream> {
    let mut text = String::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();
    let mut states: HashMap<u32, CallState> = HashMap::new();

    while let Some(event) = stream.next().await {
        match event {
            Ok(pneuma_model::ResponseEvent::TextDelta(delta)) => {
                text.push_str(&delta);
            }
            Ok(pneuma_model::ResponseEvent::ThinkingDelta(_)) => {
                // Reasoning tokens are ignored by the Stream Processor.
            }
            Ok(pneuma_model::ResponseEvent::Usage { .. }) => {}
            Ok(pneuma_model::ResponseEvent::ToolCall { index, id, name, arguments }) => {
                let is_new = !states.contains_key(&index);
                let state = states.entry(index).or_insert_with(CallState::default);
                if !id.is_empty() {
                    state.id = id;
                }
                if !name.is_empty() && state.tool_name.is_empty() {
                    state.tool_name = name.clone();
                    state.is_send_message = name == SEND_MESSAGE_TOOL;
                    state.is_visible = state.is_send_message || ctx.visible_tools.contains(&name);
                    state.is_async = ctx.async_tools.contains(&name);

                    if is_new && state.is_visible && !state.is_send_message {
                        emit_tool_started(ctx, &state.id, &name).await;
                    }
                }
                state.args_buf.push_str(&arguments);

                if state.is_send_message {
                    stream_send_message_delta(ctx, state).await;
                } else if state.is_visible {
                    emit_tool_streaming(ctx, state).await;
                }
            }
            Ok(pneuma_model::ResponseEvent::Done) => break,
            Err(e) => {
                for state in states.values() {
                    emit_stream_error(ctx, state, &e.to_string()).await;
                }
                return Err(e);
            }
        }
    }

    // Flush `tool-call` / `tool-result` finalization for every accumulated
    // call, ordered by parallel-call index.
    let mut ordered: Vec<(u32, CallState)> = states.into_iter().collect();
    ordered.sort_by_key(|(idx, _)| *idx);

    for (_, mut state) in ordered {
        if state.tool_name.is_empty() {
            continue;
        }
        let args = parse_tool_args(&state.tool_name, &state.id, &state.args_buf);

        if state.is_send_message {
            finish_send_message(ctx, &mut state).await;
        } else if state.is_visible {
            finish_visible_tool(ctx, &state).await;
        }

        tool_calls.push(ToolCall {
            id: state.id.clone(),
            name: state.tool_name.clone(),
            args,
        });
    }

    Ok(ProcessedStream { tool_calls, text })
}

/// Parse a tool call's accumulated argument buffer into a JSON object,
/// attempting a repair pass on malformed JSON before giving up and
/// substituting an empty object. Providers occasionally emit invalid
/// escapes or truncated argument strings; a tool call with unusable
/// arguments should still reach the registry rather than abort the cycle.
fn parse_tool_args(tool_name: &str, call_id: &str, args_buf: &str) -> serde_json::Value {
    if args_buf.is_empty() {
        return serde_json::Value::Object(Default::default());
    }
    match serde_json::from_str(args_buf) {
        Ok(v) => v,
        Err(parse_err) => match attempt_json_repair(args_buf) {
            Ok(v) => {
                tracing::warn!(tool_name, call_id, "repaired invalid JSON arguments from model");
                v
            }
            Err(_) => {
                tracing::warn!(
                    tool_name,
                    call_id,
                    args_buf,
                    error = %parse_err,
                    "model sent tool call with invalid JSON arguments; substituting {{}}"
                );
                serde_json::Value::Object(Default::default())
            }
        },
    }
}

fn attempt_json_repair(json_str: &str) -> anyhow::Result<serde_json::Value> {
    let fixed = fix_invalid_json_escapes(json_str);
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(&fixed) {
        return Ok(v);
    }

    let repaired = regex::Regex::new(r#""([^"]+)"([a-zA-Z_][a-zA-Z0-9_]*)":\s*"#)
        .unwrap()
        .replace_all(&fixed, r#""$1", "$2": "#);
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(&repaired) {
        return Ok(v);
    }

    if !fixed.trim().ends_with('}') {
        let mut completed = fixed.clone();
        let quote_count = fixed.chars().filter(|&c| c == '"').count();
        if quote_count % 2 == 1 {
            completed.push('"');
        }
        if !completed.trim().ends_with('}') {
            completed.push('}');
        }
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(&completed) {
            return Ok(v);
        }
    }

    anyhow::bail!("JSON repair failed: all repair strategies exhausted")
}

fn fix_invalid_json_escapes(json_str: &str) -> String {
    let mut result = String::with_capacity(json_str.len() + 16);
    let mut chars = json_str.chars();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            match c {
                '\\' => match chars.next() {
                    Some(next) if matches!(next, '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u') => {
                        result.push('\\');
                        result.push(next);
                    }
                    Some(next) => {
                        result.push('\\');
                        result.push('\\');
                        result.push(next);
                    }
                    None => result.push('\\'),
                },
                '"' => {
                    in_string = false;
                    result.push('"');
                }
                _ => result.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            result.push(c);
        }
    }
    result
}

async fn publish(ctx: &StreamContext<'_>, channel: String, event: BusEvent) {
    let envelope = StreamEnvelope::new(Uuid::new_v4().to_string(), event);
    if let Ok(json) = envelope.to_json() {
        ctx.bus.publish(&channel, json.clone());
        ctx.bus.publish(&pneuma_broker::run_channel(ctx.run_id), json);
    }
}

fn extract_partial_text(args_buf: &str) -> Option<String> {
    let key_pos = args_buf.find("\"text\"")?;
    let after_key = &args_buf[key_pos + 6..];
    let colon_pos = after_key.find(':')?;
    let after_colon = after_key[colon_pos + 1..].trim_start();
    let quote_pos = after_colon.find('"')?;
    let raw = &after_colon[quote_pos + 1..];

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => break,
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => out.push(other),
                None => break,
            },
            other => out.push(other),
        }
    }
    Some(out)
}

async fn stream_send_message_delta(ctx: &StreamContext<'_>, state: &mut CallState) {
    let Some(current_text) = extract_partial_text(&state.args_buf) else {
        return;
    };
    if current_text.len() <= state.last_text_len {
        return;
    }
    let message_id = state
        .persisted_message_id
        .get_or_insert_with(|| Uuid::new_v4().to_string())
        .clone();
    let slice = current_text[state.last_text_len..].to_string();
    state.last_text_len = current_text.len();

    publish(
        ctx,
        pneuma_broker::space_channel(ctx.active_space_id),
        BusEvent::SpaceMessageStreaming {
            message_id,
            smart_space_id: ctx.active_space_id.to_string(),
            phase: StreamPhase::Delta,
            text: slice,
        },
    )
    .await;
}

async fn finish_send_message(ctx: &StreamContext<'_>, state: &mut CallState) {
    let message_id = state
        .persisted_message_id
        .get_or_insert_with(|| Uuid::new_v4().to_string())
        .clone();
    let full_text = extract_partial_text(&state.args_buf).unwrap_or_default();

    let _ = ctx
        .store
        .insert_space_message(
            &message_id,
            ctx.active_space_id,
            ctx.agent_entity_id,
            "assistant",
            &full_text,
            "{}",
            Some(ctx.run_id),
        )
        .await;

    publish(
        ctx,
        pneuma_broker::space_channel(ctx.active_space_id),
        BusEvent::SpaceMessageStreaming {
            message_id,
            smart_space_id: ctx.active_space_id.to_string(),
            phase: StreamPhase::Done,
            text: String::new(),
        },
    )
    .await;
}

async fn emit_tool_started(ctx: &StreamContext<'_>, call_id: &str, tool_name: &str) {
    publish(
        ctx,
        pneuma_broker::space_channel(ctx.active_space_id),
        BusEvent::ToolStarted {
            call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
        },
    )
    .await;
}

async fn emit_tool_streaming(ctx: &StreamContext<'_>, state: &CallState) {
    let partial_args =
        serde_json::from_str(&state.args_buf).unwrap_or_else(|_| json!({ "partial": state.args_buf }));
    publish(
        ctx,
        pneuma_broker::space_channel(ctx.active_space_id),
        BusEvent::ToolStreaming {
            call_id: state.id.clone(),
            tool_name: state.tool_name.clone(),
            partial_args,
        },
    )
    .await;
}

async fn finish_visible_tool(ctx: &StreamContext<'_>, state: &CallState) {
    let args: serde_json::Value =
        serde_json::from_str(&state.args_buf).unwrap_or(serde_json::Value::Null);
    let content = format!("Called `{}` with {args}", state.tool_name);
    let status = if state.is_async { "requires_action" } else { "running" };
    let metadata = json!({ "status": status, "call_id": state.id, "tool_name": state.tool_name }).to_string();

    let message_id = Uuid::new_v4().to_string();
    let _ = ctx
        .store
        .insert_space_message(
            &message_id,
            ctx.active_space_id,
            ctx.agent_entity_id,
            "assistant",
            &content,
            &metadata,
            Some(ctx.run_id),
        )
        .await;

    // Synchronous tools complete within this same stream: there is no
    // separate `tool-result` part in this provider contract, so the
    // persisted message is marked complete immediately for non-async tools.
    // Async tools stay `requires_action` until `submitToolResult` runs.
    if !state.is_async {
        let complete_metadata = json!({ "status": "complete", "call_id": state.id, "tool_name": state.tool_name }).to_string();
        let _ = ctx
            .store
            .update_space_message(&message_id, &content, &complete_metadata)
            .await;
    }

    publish(
        ctx,
        pneuma_broker::space_channel(ctx.active_space_id),
        BusEvent::ToolDone {
            call_id: state.id.clone(),
            tool_name: state.tool_name.clone(),
            result: json!({ "status": status }),
        },
    )
    .await;
}

async fn emit_stream_error(ctx: &StreamContext<'_>, state: &CallState, error: &str) {
    if state.tool_name.is_empty() {
        return;
    }
    if state.is_send_message {
        let message_id = state.persisted_message_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        publish(
            ctx,
            pneuma_broker::space_channel(ctx.active_space_id),
            BusEvent::SpaceMessageFailed {
                message_id,
                smart_space_id: ctx.active_space_id.to_string(),
                error: error.to_string(),
            },
        )
        .await;
    } else if state.is_visible {
        publish(
            ctx,
            pneuma_broker::space_channel(ctx.active_space_id),
            BusEvent::ToolError {
                call_id: state.id.clone(),
                tool_name: state.tool_name.clone(),
                error: error.to_string(),
            },
        )
        .await;
    }
}
