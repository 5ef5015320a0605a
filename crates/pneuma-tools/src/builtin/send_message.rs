// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The designated `send_message` tool (spec §4.5 point 3) — posts a visible
//! message into the space that triggered the current cycle.
//!
//! Its actual persistence and fan-out happen inside the Stream Processor as
//! the call streams in, not here: by the time a worker would call
//! `execute`, the message is already saved. This impl exists only so the
//! tool has a schema the registry can hand to the model.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::policy::ApprovalPolicy;
use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct SendMessageTool;

#[async_trait]
impl Tool for SendMessageTool {
    fn name(&self) -> &str {
        "send_message"
    }

    fn description(&self) -> &str {
        "Post a message into the space that the current inbox event concerns. \
         The `text` argument streams to observers as you write it."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The message text to post.",
                }
            },
            "required": ["text"],
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Auto
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        ToolOutput::ok(&call.id, "message sent")
    }
}
