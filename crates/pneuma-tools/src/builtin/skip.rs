// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The designated `skip` tool (spec §4.2 step 9) — tells the worker there is
//! nothing worth doing with the current inbox events. Registered only so the
//! model sees its schema; a worker recognizes the call by name and rolls the
//! whole cycle back before any tool in the returned list is ever executed,
//! so `execute` below is unreachable in practice.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::policy::ApprovalPolicy;
use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct SkipTool;

#[async_trait]
impl Tool for SkipTool {
    fn name(&self) -> &str {
        "skip"
    }

    fn description(&self) -> &str {
        "Call this when the current inbox events warrant no action and no \
         message. The entire cycle is discarded at no cost — nothing you did \
         this cycle is kept, and the inbox events are still marked handled."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Auto
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        ToolOutput::ok(&call.id, "skipped")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_empty_parameter_schema() {
        let tool = SkipTool;
        let schema = tool.parameters_schema();
        assert_eq!(schema["properties"], json!({}));
    }
}
