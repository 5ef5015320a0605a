// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! System prompt template fill (spec §4.2 step 6, §4.3 `refreshSystemPrompt`).
//!
//! The prompt is rebuilt from scratch on every cycle from the agent's current
//! identity, its known spaces, its pending plans, and async-tool guidance.
//! The fill is a pure function of its inputs — same inputs, same prompt —
//! which is what makes `refreshSystemPrompt` idempotent.

use chrono::Utc;

use pneuma_store::PlanRow;

/// Everything the template fill needs, gathered by the worker before each
/// cycle's Prepare-prompt step.
#[derive(Debug, Default)]
pub struct PromptContext<'a> {
    pub agent_name: &'a str,
    pub system_prompt_seed: &'a str,
    /// Spaces this agent has been observed to belong to (see
    /// [`crate::worker`]'s space-membership tracking).
    pub spaces: &'a [String],
    /// This agent's open plans, most relevant first.
    pub plans: &'a [PlanRow],
    /// Tool names whose execution completes out-of-band (spec §4.7).
    pub async_tools: &'a [String],
}

fn identity_block(ctx: &PromptContext<'_>) -> String {
    format!(
        "You are `{name}`, a persistent agent.\n\nCurrent time: `{now}`",
        name = ctx.agent_name,
        now = Utc::now().to_rfc3339(),
    )
}

fn spaces_block(ctx: &PromptContext<'_>) -> String {
    if ctx.spaces.is_empty() {
        return "## Spaces\n\nYou do not yet belong to any space.".to_string();
    }
    let list = ctx
        .spaces
        .iter()
        .map(|s| format!("- `{s}`"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "## Spaces\n\n\
         You belong to the following spaces. Use `send_message` to post into \
         the space that is the subject of the current inbox event.\n\n{list}"
    )
}

fn plans_block(ctx: &PromptContext<'_>) -> String {
    if ctx.plans.is_empty() {
        return String::new();
    }
    let list = ctx
        .plans
        .iter()
        .map(|p| {
            let schedule = match (&p.cron, &p.scheduled_at, p.run_after_secs) {
                (Some(cron), _, _) => format!("cron `{cron}`"),
                (_, Some(at), _) => format!("scheduled at `{at}`"),
                (_, _, Some(secs)) => format!("runs after {secs}s"),
                _ => "unscheduled".to_string(),
            };
            format!("- `{}` ({}): {}", p.name, schedule, p.instruction)
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("\n\n## Plans\n\nYour currently open plans:\n\n{list}")
}

fn async_tools_block(ctx: &PromptContext<'_>) -> String {
    if ctx.async_tools.is_empty() {
        return String::new();
    }
    let list = ctx
        .async_tools
        .iter()
        .map(|t| format!("`{t}`"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "\n\n## Async Tools\n\n\
         The following tools complete outside this cycle: {list}. Calling one \
         returns `{{\"status\": \"pending\"}}` immediately; the result arrives \
         later as a `tool_result` inbox event in a future cycle. Do not wait \
         for it — finish the cycle, or call the designated `skip` tool if \
         there is nothing else useful to do."
    )
}

fn guidelines_block() -> &'static str {
    "## Guidelines\n\n\
     - Use `send_message` to post a visible message into a space; its `text` \
       argument streams to observers as you write it.\n\
     - Call the designated `skip` tool when the inbox holds nothing that \
       warrants a response; doing so rolls this cycle back entirely and costs \
       nothing.\n\
     - Be concise. Only call a tool when it moves the current inbox event \
       forward."
}

/// Build the system prompt text for one cycle.
///
/// If `seed` is non-empty it is folded in after the identity block, ahead of
/// spaces/plans/tooling — it carries whatever a deployment wants to say about
/// this agent's goals, memories, and standing instructions.
pub fn system_prompt(ctx: &PromptContext<'_>) -> String {
    let seed_section = if ctx.system_prompt_seed.trim().is_empty() {
        String::new()
    } else {
        format!("\n\n{}", ctx.system_prompt_seed.trim())
    };

    format!(
        "{identity}{seed}\n\n{spaces}{plans}{async_tools}\n\n{guidelines}",
        identity = identity_block(ctx),
        seed = seed_section,
        spaces = spaces_block(ctx),
        plans = plans_block(ctx),
        async_tools = async_tools_block(ctx),
        guidelines = guidelines_block(),
    )
}
