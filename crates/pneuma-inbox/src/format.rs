// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Inbox event text rendering (spec §4.4 "Formatting").

use crate::event::{EventData, InboxEvent, SenderType};

const PREVIEW_TRUNCATE_LEN: usize = 50;

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push('…');
    out
}

fn sender_label(sender_type: SenderType) -> &'static str {
    match sender_type {
        SenderType::Human => "human",
        SenderType::Agent => "agent",
    }
}

fn format_one(event: &InboxEvent, truncate_content: Option<usize>) -> String {
    let render = |content: &str| match truncate_content {
        Some(n) => truncate(content, n),
        None => content.to_string(),
    };

    match &event.data {
        EventData::SpaceMessage(d) => {
            let mut line = format!(
                "- [space_message] {} ({}) in {}: {}",
                d.sender_name,
                sender_label(d.sender_type),
                d.space_name,
                render(&d.content)
            );
            if truncate_content.is_none() {
                if let Some(recent) = &d.recent_context {
                    if !recent.is_empty() {
                        line.push_str("\n  Recent conversation:");
                        for entry in recent {
                            line.push_str(&format!(
                                "\n    {} ({}): {}",
                                entry.sender_name,
                                sender_label(entry.sender_type),
                                entry.content
                            ));
                        }
                    }
                }
            }
            line
        }
        EventData::Plan(d) => format!("- [plan] {}: {}", d.plan_name, render(&d.instruction)),
        EventData::Service(d) => format!(
            "- [service] {}: {}",
            d.service_name,
            render(&d.payload.to_string())
        ),
        EventData::ToolResult(d) => format!(
            "- [Tool Result: {}] (callId: {}) {}",
            d.tool_name,
            d.tool_call_id,
            render(&d.result.to_string())
        ),
    }
}

/// One `user`-role text block: `INBOX (N events, <timestamp>):` then one
/// line per event, full content, no truncation.
pub fn format_inbox_events(events: &[InboxEvent]) -> String {
    let now = chrono::Utc::now().to_rfc3339();
    let mut out = format!("INBOX ({} events, {}):\n", events.len(), now);
    for event in events {
        out.push_str(&format_one(event, None));
        out.push('\n');
    }
    out
}

/// Shorter mid-cycle preview used by `prepareStep`: content truncated to
/// ~50 characters, no nested recent-conversation blocks.
pub fn format_inbox_preview(events: &[InboxEvent]) -> String {
    let mut out = format!("INBOX preview ({} pending):\n", events.len());
    for event in events {
        out.push_str(&format_one(event, Some(PREVIEW_TRUNCATE_LEN)));
        out.push('\n');
    }
    out
}
