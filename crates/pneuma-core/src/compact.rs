// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Consciousness compaction: self-summary, no external LLM call.
//!
//! Cheap and deterministic by design — compaction runs synchronously inside
//! a cycle (spec §4.2 step 11), so it cannot itself depend on a round trip
//! to the model it's trying to make room for.

use pneuma_model::{Message, Role};
use pneuma_tools::OutputCategory;

/// Marker prefix identifying the single running summary message, so repeated
/// compaction passes extend it rather than stacking up separate summaries.
const SUMMARY_MARKER: &str = "[compacted summary]";

/// Deterministic positive-integer token estimate for a message list (spec
/// §4.3 `estimateTokens`): the sum of each message's own character-based
/// approximation.
pub fn estimate_tokens(messages: &[Message]) -> usize {
    messages.iter().map(|m| m.approx_tokens()).sum()
}

fn is_summary(m: &Message) -> bool {
    m.role == Role::System && m.as_text().is_some_and(|t| t.starts_with(SUMMARY_MARKER))
}

/// Index just past the leading system prompt (if any) and the existing
/// summary message (if any) — the part of the history compaction never
/// touches directly, only extends.
fn head_len(messages: &[Message]) -> usize {
    let mut i = 0;
    if messages.first().is_some_and(|m| m.role == Role::System && !is_summary(m)) {
        i += 1;
    }
    if messages.get(i).is_some_and(is_summary) {
        i += 1;
    }
    i
}

/// Find the span `[start, end)` of the oldest complete cycle in
/// `messages[head..]`, where a cycle begins at a `User`-role message and
/// runs up to (but not including) the next one. Returns `None` when there
/// are fewer than two cycles — the most recent cycle is never compacted.
fn oldest_cycle_span(messages: &[Message], head: usize) -> Option<(usize, usize)> {
    let boundaries: Vec<usize> = messages
        .iter()
        .enumerate()
        .skip(head)
        .filter(|(_, m)| m.role == Role::User)
        .map(|(i, _)| i)
        .collect();
    if boundaries.len() < 2 {
        return None;
    }
    Some((boundaries[0], boundaries[1]))
}

/// The final assistant-text part of a cycle's message span — what the
/// summary retains from it.
fn final_assistant_text(messages: &[Message], span: (usize, usize)) -> Option<String> {
    messages[span.0..span.1]
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
        .and_then(|m| m.as_text())
        .map(|s| s.to_string())
}

/// Self-summary compaction (spec §4.3 `compact`): repeatedly replace the
/// oldest non-summary cycle with a line in the running summary message
/// until `estimate_tokens(messages) <= soft_cap`, or there is nothing left
/// that can be compacted without touching the most recent cycle.
///
/// Monotone (token estimate never increases across a call), preserves the
/// most recent cycle verbatim, and preserves message ordering.
pub fn self_summary_compact(mut messages: Vec<Message>, soft_cap: usize) -> Vec<Message> {
    while estimate_tokens(&messages) > soft_cap {
        let head = head_len(&messages);
        let Some(span) = oldest_cycle_span(&messages, head) else {
            break;
        };

        let addition = final_assistant_text(&messages, span).unwrap_or_default();
        let summary_idx = if messages.get(head.saturating_sub(1)).is_some_and(is_summary) {
            Some(head - 1)
        } else if messages.get(head).is_some_and(is_summary) {
            Some(head)
        } else {
            None
        };

        messages.drain(span.0..span.1);

        match summary_idx {
            Some(idx) => {
                let existing = messages[idx].as_text().unwrap_or_default().to_string();
                messages[idx] = Message::system(format!("{existing}\n- {addition}"));
            }
            None => {
                let summary = Message::system(format!("{SUMMARY_MARKER}\n- {addition}"));
                messages.insert(head_len(&messages), summary);
            }
        }
    }
    messages
}

/// Deterministic, content-aware tool-result truncation.
///
/// Returns `content` unchanged when it fits within `cap_tokens`.
/// Otherwise applies a category-specific extraction strategy that preserves
/// the most useful portion of the output. Dispatching on [`OutputCategory`]
/// (not on tool names) keeps this function independent of the tools crate's
/// concrete tool list; each tool declares its own category.
///
/// - [`OutputCategory::HeadTail`]: keep the first 60 + last 40 lines so both
///   the command preamble and the final result are visible.
/// - [`OutputCategory::MatchList`]: keep leading matches (highest relevance
///   first); the tail is not preserved because later matches are less relevant.
/// - [`OutputCategory::FileContent`]: balanced head + tail with a separator,
///   preserving both the imports/declarations and the most recent changes.
/// - [`OutputCategory::Generic`]: hard-truncate at the nearest line boundary.
///
/// Every truncated result ends with an explicit notice so the model knows
/// that additional content exists and how to retrieve it.
pub fn smart_truncate(content: &str, category: OutputCategory, cap_tokens: usize) -> String {
    if cap_tokens == 0 {
        return content.to_string();
    }
    let cap_chars = cap_tokens * 4;
    if content.len() <= cap_chars {
        return content.to_string();
    }
    let omitted_bytes = content.len().saturating_sub(cap_chars);
    match category {
        OutputCategory::HeadTail => head_tail_lines(
            content,
            cap_chars,
            60,
            40,
            &format!("[... {{lines}} lines / {omitted_bytes} bytes omitted ...]"),
        ),
        OutputCategory::MatchList => head_lines(
            content,
            cap_chars,
            &format!(
                "[... {{lines}} more matches omitted ({omitted_bytes} bytes); \
                     use a more specific pattern to see them ...]"
            ),
        ),
        OutputCategory::FileContent => head_tail_lines(
            content,
            cap_chars,
            usize::MAX,
            usize::MAX,
            &format!(
                "[... {{lines}} lines omitted ({omitted_bytes} bytes); \
                     use read_file with offset/limit to see more ...]"
            ),
        ),
        OutputCategory::Generic => {
            let cut = content[..cap_chars]
                .rfind('\n')
                .map(|p| p + 1)
                .unwrap_or(cap_chars);
            format!(
                "{}\n[... {omitted_bytes} bytes omitted; \
                 content truncated to fit context budget ...]",
                &content[..cut]
            )
        }
    }
}

// ─── Private helpers ──────────────────────────────────────────────────────────

/// Keep only the leading lines that fit within `cap_chars`.
fn head_lines(content: &str, cap_chars: usize, notice_template: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let mut kept = String::with_capacity(cap_chars);
    let mut kept_count = 0usize;
    for line in &lines {
        let needed = if kept.is_empty() {
            line.len()
        } else {
            line.len() + 1
        };
        if kept.len() + needed > cap_chars {
            break;
        }
        if !kept.is_empty() {
            kept.push('\n');
        }
        kept.push_str(line);
        kept_count += 1;
    }
    let omitted = lines.len().saturating_sub(kept_count);
    if omitted == 0 {
        return content[..cap_chars.min(content.len())].to_string();
    }
    let notice = notice_template.replace("{lines}", &omitted.to_string());
    format!("{kept}\n{notice}")
}

/// Keep `max_head` leading lines and `max_tail` trailing lines, inserting a
/// notice between them. Pass `usize::MAX` to split evenly by character budget.
fn head_tail_lines(
    content: &str,
    cap_chars: usize,
    max_head: usize,
    max_tail: usize,
    notice_template: &str,
) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let half_cap = cap_chars / 2;

    let mut head = String::with_capacity(half_cap);
    let mut head_count = 0usize;
    for line in lines.iter().take(max_head) {
        let needed = if head.is_empty() {
            line.len()
        } else {
            line.len() + 1
        };
        if head.len() + needed > half_cap {
            break;
        }
        if !head.is_empty() {
            head.push('\n');
        }
        head.push_str(line);
        head_count += 1;
    }

    let mut tail_lines: Vec<&str> = Vec::new();
    let mut tail_chars = 0usize;
    for line in lines.iter().rev().take(max_tail) {
        let needed = if tail_lines.is_empty() {
            line.len()
        } else {
            line.len() + 1
        };
        if tail_chars + needed > half_cap {
            break;
        }
        tail_chars += needed;
        tail_lines.push(line);
    }
    tail_lines.reverse();
    let tail_count = tail_lines.len();
    let tail = tail_lines.join("\n");

    let omitted = lines.len().saturating_sub(head_count + tail_count);
    if omitted == 0 {
        return content[..cap_chars.min(content.len())].to_string();
    }
    let notice = notice_template.replace("{lines}", &omitted.to_string());
    format!("{head}\n{notice}\n{tail}")
}

// ─── Unit tests ───────────────────────────────────────────────────────────────
