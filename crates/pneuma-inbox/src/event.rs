// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Inbox event shapes (spec §4.4 "Event shape").
//!
//! Tagged variants with a JSON-serialized wire/storage form — the same
//! principle the consciousness store applies to model messages: never leak
//! a transport-specific representation past this boundary.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentContextEntry {
    pub sender_name: String,
    pub sender_type: SenderType,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderType {
    Human,
    Agent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceMessageData {
    pub message_id: String,
    pub smart_space_id: String,
    pub space_name: String,
    pub sender_entity_id: String,
    pub sender_name: String,
    pub sender_type: SenderType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_context: Option<Vec<RecentContextEntry>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanData {
    pub plan_id: String,
    pub plan_name: String,
    pub instruction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceData {
    pub service_name: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultData {
    pub tool_call_id: String,
    pub tool_name: String,
    pub result: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventData {
    SpaceMessage(SpaceMessageData),
    Plan(PlanData),
    Service(ServiceData),
    ToolResult(ToolResultData),
}

impl EventData {
    pub fn type_str(&self) -> &'static str {
        match self {
            EventData::SpaceMessage(_) => "space_message",
            EventData::Plan(_) => "plan",
            EventData::Service(_) => "service",
            EventData::ToolResult(_) => "tool_result",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxEvent {
    pub event_id: String,
    pub timestamp: String,
    #[serde(flatten)]
    pub data: EventData,
}

impl InboxEvent {
    pub fn new(event_id: impl Into<String>, data: EventData) -> Self {
        Self {
            event_id: event_id.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            data,
        }
    }

    pub fn type_str(&self) -> &'static str {
        self.data.type_str()
    }
}
