// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Row shapes for the six persisted tables (spec §3, §6 "Persisted state").
//!
//! The store never interprets `messages_json`/`data_json`/etc.; callers
//! (`pneuma-core`, `pneuma-inbox`) own the tagged-variant JSON shapes so the
//! LLM-vendor message representation never leaks into this layer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsciousnessRow {
    pub agent_entity_id: String,
    /// JSON array of serialized model-messages.
    pub messages_json: String,
    pub cycle_count: i64,
    pub token_estimate: i64,
    pub last_cycle_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxEventType {
    SpaceMessage,
    Plan,
    Service,
    ToolResult,
}

impl InboxEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InboxEventType::SpaceMessage => "space_message",
            InboxEventType::Plan => "plan",
            InboxEventType::Service => "service",
            InboxEventType::ToolResult => "tool_result",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "space_message" => Some(InboxEventType::SpaceMessage),
            "plan" => Some(InboxEventType::Plan),
            "service" => Some(InboxEventType::Service),
            "tool_result" => Some(InboxEventType::ToolResult),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxEventStatus {
    Pending,
    Processing,
    Processed,
    Failed,
}

impl InboxEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InboxEventStatus::Pending => "pending",
            InboxEventStatus::Processing => "processing",
            InboxEventStatus::Processed => "processed",
            InboxEventStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InboxEventStatus::Pending),
            "processing" => Some(InboxEventStatus::Processing),
            "processed" => Some(InboxEventStatus::Processed),
            "failed" => Some(InboxEventStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxEventRow {
    pub agent_entity_id: String,
    pub event_id: String,
    pub event_type: String,
    /// Raw JSON payload, shape depending on `event_type` (spec §4.4 "Event shape").
    pub data_json: String,
    pub status: String,
    pub run_id: Option<String>,
    pub created_at: String,
    pub processed_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRow {
    pub run_id: String,
    pub agent_entity_id: String,
    pub agent_id: String,
    pub status: String,
    pub cycle_number: i64,
    pub inbox_event_count: i64,
    pub step_count: i64,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub duration_ms: i64,
    /// `{ "type": ..., ...source-specific fields }`.
    pub trigger_json: String,
    pub error_message: Option<String>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingToolCallStatus {
    Pending,
    Completed,
    Canceled,
}

impl PendingToolCallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingToolCallStatus::Pending => "pending",
            PendingToolCallStatus::Completed => "completed",
            PendingToolCallStatus::Canceled => "canceled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingToolCallRow {
    pub run_id: String,
    pub call_id: String,
    pub tool_name: String,
    pub input_json: String,
    pub status: String,
    pub output_json: Option<String>,
    pub requested_at: String,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    Completed,
    Canceled,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Pending => "pending",
            PlanStatus::Completed => "completed",
            PlanStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PlanStatus::Pending),
            "completed" => Some(PlanStatus::Completed),
            "canceled" => Some(PlanStatus::Canceled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRow {
    pub plan_id: String,
    pub agent_entity_id: String,
    pub name: String,
    pub instruction: String,
    /// Exactly one of these three is set (spec §3 Plan invariant).
    pub run_after_secs: Option<i64>,
    pub scheduled_at: Option<String>,
    pub cron: Option<String>,
    pub next_run_at: Option<String>,
    pub last_run_at: Option<String>,
    pub status: String,
    pub is_recurring: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceMessageRow {
    pub message_id: String,
    pub smart_space_id: String,
    pub entity_id: String,
    pub role: String,
    pub content: String,
    pub seq: i64,
    pub metadata_json: String,
    pub run_id: Option<String>,
    pub created_at: String,
}
