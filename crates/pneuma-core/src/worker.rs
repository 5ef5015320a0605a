// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The Agent Worker (C2, spec §4.2) — the infinite cycle loop that turns one
//! agent's inbox events into LLM calls, tool calls, and persisted
//! conversation history.
//!
//! **Space membership.** Spec §3 treats a space's membership set as
//! "resolved by oracle" — an external collaborator this workspace does not
//! implement. There is no static space list in [`pneuma_config::AgentConfig`]
//! either. Absent both, the worker tracks the spaces it has actually seen
//! for this agent: every `space_message` inbox event names the space it
//! arrived from, and the worker remembers that set in memory for the life
//! of the process. `agent.active`/`agent.inactive` (steps 5 and 15) are
//! emitted to exactly that set. This is a practical stand-in, not a full
//! membership oracle — a space an agent belongs to but has never received a
//! message from won't see presence events until it does.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use pneuma_broker::FanoutBus;
use pneuma_config::AgentConfig;
use pneuma_inbox::{EventData, Inbox, InboxEvent};
use pneuma_model::{CompletionRequest, FunctionCall, Message, MessageContent, ModelProvider, Role};
use pneuma_runtime::CancelToken;
use pneuma_store::{RunRow, Store};
use pneuma_tools::ToolRegistry;

use crate::compact::smart_truncate;
use crate::consciousness::Consciousness;
use crate::events::{BusEvent, StreamEnvelope};
use crate::prompts::{self, PromptContext};
use crate::stream::{process_stream, StreamContext, SEND_MESSAGE_TOOL, SKIP_TOOL};

/// Cap applied to a single tool result before it is folded into the
/// conversation, independent of the consciousness-wide soft/hard caps.
const TOOL_RESULT_TOKEN_CAP: usize = 2_000;
/// Sleep between a failed cycle and its retry (spec §4.2 step 13).
const FAILURE_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(5);

pub struct Worker {
    agent: AgentConfig,
    store: Store,
    inbox: Arc<Inbox>,
    bus: Arc<FanoutBus>,
    registry: Arc<ToolRegistry>,
    model: Box<dyn ModelProvider>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    SkippedRollback,
}

enum StepOutcome {
    Skip,
    Completed {
        step_count: i64,
        prompt_tokens: i64,
        completion_tokens: i64,
    },
}

impl Worker {
    pub fn new(
        agent: AgentConfig,
        store: Store,
        inbox: Arc<Inbox>,
        bus: Arc<FanoutBus>,
        registry: Arc<ToolRegistry>,
        model: Box<dyn ModelProvider>,
    ) -> Self {
        Self { agent, store, inbox, bus, registry, model }
    }

    pub fn agent_entity_id(&self) -> &str {
        &self.agent.agent_entity_id
    }

    /// Run the cycle loop until `cancel` fires. Recovers any events left
    /// `processing` from a prior crash before the first Sleep.
    pub async fn run(mut self, cancel: CancelToken) -> anyhow::Result<()> {
        self.inbox.recover_stuck_events(&self.agent.agent_entity_id).await?;

        let mut known_spaces: HashSet<String> = HashSet::new();
        let mut pending_retry: Option<Vec<InboxEvent>> = None;

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let events = match pending_retry.take() {
                Some(events) => events,
                None => {
                    // Sleep, then Wake.
                    let Some(first) = self.inbox.wait_for_inbox(&self.agent.agent_entity_id, &cancel).await?
                    else {
                        return Ok(()); // cancelled while waiting
                    };
                    let mut rest = self.inbox.drain_inbox(&self.agent.agent_entity_id)?;
                    let mut events = Vec::with_capacity(1 + rest.len());
                    events.push(first);
                    events.append(&mut rest);
                    events
                }
            };

            if events.is_empty() {
                continue; // spurious wake
            }

            match self.run_cycle(&events, &mut known_spaces).await {
                Ok(_outcome) => {}
                Err(e) => {
                    tracing::warn!(
                        agent_entity_id = %self.agent.agent_entity_id,
                        error = %e,
                        "cycle failed; retrying without re-draining"
                    );
                    tokio::time::sleep(FAILURE_RETRY_DELAY).await;
                    pending_retry = Some(events);
                }
            }
        }
    }

    /// One full cycle (spec §4.2 steps 3-15). `events` is the complete
    /// drained batch from Sleep+Wake.
    async fn run_cycle(
        &mut self,
        events: &[InboxEvent],
        known_spaces: &mut HashSet<String>,
    ) -> anyhow::Result<CycleOutcome> {
        let agent_entity_id = self.agent.agent_entity_id.clone();
        update_known_spaces(known_spaces, events);

        // Step 3: begin cycle — snapshot, create Run, bump cycleCount.
        let consciousness = Consciousness::load(&self.store, &agent_entity_id).await?;
        let cycle_number = consciousness.cycle_count + 1;
        let run_id = Uuid::new_v4().to_string();
        let trigger_json = serde_json::to_string(&events[0])?;
        let created_at = Utc::now().to_rfc3339();

        self.store
            .create_run(RunRow {
                run_id: run_id.clone(),
                agent_entity_id: agent_entity_id.clone(),
                agent_id: self.agent.agent_id.clone(),
                status: "running".to_string(),
                cycle_number,
                inbox_event_count: events.len() as i64,
                step_count: 0,
                prompt_tokens: 0,
                completion_tokens: 0,
                duration_ms: 0,
                trigger_json,
                error_message: None,
                created_at,
                completed_at: None,
            })
            .await?;

        // Step 4: mark events processing.
        let event_ids: Vec<String> = events.iter().map(|e| e.event_id.clone()).collect();
        self.inbox.mark_events_processing(&agent_entity_id, &event_ids, &run_id).await?;

        // Step 5: emit agent.active to every known space.
        self.emit_presence(known_spaces, true);

        let started = Instant::now();

        let mut consciousness = consciousness;
        let body = self
            .think_and_settle(&mut consciousness, events, &run_id, known_spaces, cycle_number)
            .await;

        match body {
            Ok(StepOutcome::Skip) => {
                // Step 9: roll back. The pre-cycle snapshot was never
                // mutated (consciousness is untouched until after the skip
                // check), so there is nothing to restore — just discard the
                // Run and mark the events handled.
                self.store.delete_run(&run_id).await?;
                self.inbox.mark_events_processed(&agent_entity_id, &event_ids).await?;
                self.emit_presence(known_spaces, false);
                Ok(CycleOutcome::SkippedRollback)
            }
            Ok(StepOutcome::Completed { step_count, prompt_tokens, completion_tokens }) => {
                // Step 12: save consciousness with the new cycleCount/lastCycleAt.
                consciousness.save(&self.store).await?;
                self.inbox.mark_events_processed(&agent_entity_id, &event_ids).await?;
                let completed_at = Utc::now().to_rfc3339();
                let duration_ms = started.elapsed().as_millis() as i64;
                self.store
                    .complete_run(&run_id, step_count, prompt_tokens, completion_tokens, duration_ms, &completed_at)
                    .await?;
                self.emit_presence(known_spaces, false);
                Ok(CycleOutcome::Completed)
            }
            Err(e) => {
                self.inbox.mark_events_failed(&agent_entity_id, &event_ids).await?;
                let completed_at = Utc::now().to_rfc3339();
                self.store.fail_run(&run_id, &e.to_string(), &completed_at).await?;
                self.emit_presence(known_spaces, false);
                Err(e)
            }
        }
    }

    /// Steps 6-11: prepare the prompt, run the think/tool-call loop up to
    /// `maxSteps`, detect `skip`, append the cycle to consciousness, and
    /// compact if the hard cap was exceeded. Does not save — the caller
    /// does that once it knows the outcome is not a rollback. Returns
    /// `Err` for any failure in this window (spec §4.2 step 13).
    async fn think_and_settle(
        &self,
        consciousness: &mut Consciousness,
        events: &[InboxEvent],
        run_id: &str,
        known_spaces: &HashSet<String>,
        cycle_number: i64,
    ) -> anyhow::Result<StepOutcome> {
        // Step 6: prepare prompt.
        let active_space_id = trigger_space_id(events).unwrap_or_else(|| self.agent.agent_entity_id.clone());
        let plans = self.agent_plans().await?;
        let mut spaces: Vec<String> = known_spaces.iter().cloned().collect();
        spaces.sort();
        let prompt = prompts::system_prompt(&PromptContext {
            agent_name: &self.agent.name,
            system_prompt_seed: &self.agent.system_prompt_seed,
            spaces: &spaces,
            plans: &plans,
            async_tools: &self.agent.async_tools,
        });

        let mut messages = consciousness.messages.clone();
        let refreshed = refresh_system_prompt(messages, prompt);
        messages = refreshed;
        messages.push(Message::user(pneuma_inbox::format_inbox_events(events)));

        let schemas = self.registry.schemas_for_names(&self.agent.tools);
        let model_tools: Vec<pneuma_model::ToolSchema> = schemas
            .into_iter()
            .map(|s| pneuma_model::ToolSchema {
                name: s.name,
                description: s.description,
                parameters: s.parameters,
            })
            .collect();

        let visible_tools: HashSet<String> = self.agent.visible_tools.iter().cloned().collect();
        let async_tools: HashSet<String> = self.agent.async_tools.iter().cloned().collect();

        let mut step_count: i64 = 0;
        let prompt_tokens_start = crate::compact::estimate_tokens(&messages) as i64;

        loop {
            step_count += 1;

            // Step 7: prepareStep hook — non-destructive peek beyond the first step.
            if step_count > 1 {
                let preview = self.inbox.peek_inbox(&self.agent.agent_entity_id, self.agent.peek_preview_count)?;
                if !preview.is_empty() {
                    messages.push(Message::user(pneuma_inbox::format_inbox_preview(&preview)));
                }
            }

            let request = CompletionRequest {
                messages: messages.clone(),
                tools: model_tools.clone(),
                stream: true,
                system_dynamic_suffix: None,
            };
            let stream = self.model.complete(request).await?;

            let stream_ctx = StreamContext {
                run_id,
                active_space_id: &active_space_id,
                agent_entity_id: &self.agent.agent_entity_id,
                store: &self.store,
                bus: &self.bus,
                visible_tools: &visible_tools,
                async_tools: &async_tools,
            };
            // Step 8: stream-process.
            let processed = process_stream(stream, &stream_ctx).await?;

            // Step 9: detect skip.
            if processed.tool_calls.iter().any(|tc| tc.name == SKIP_TOOL) {
                return Ok(StepOutcome::Skip);
            }

            if processed.tool_calls.is_empty() {
                if !processed.text.is_empty() {
                    messages.push(Message::assistant(&processed.text));
                }
                break;
            }

            for tc in &processed.tool_calls {
                messages.push(Message {
                    role: Role::Assistant,
                    content: MessageContent::ToolCall {
                        tool_call_id: tc.id.clone(),
                        function: FunctionCall { name: tc.name.clone(), arguments: tc.args.to_string() },
                    },
                });
            }

            for tc in &processed.tool_calls {
                let content = if tc.name == SEND_MESSAGE_TOOL {
                    "message sent".to_string()
                } else if async_tools.contains(&tc.name) {
                    match crate::async_tool::execute_async(&self.store, run_id, &tc.id, &tc.name, &tc.args).await {
                        Ok(v) => v.to_string(),
                        Err(e) => format!("error recording async call: {e}"),
                    }
                } else {
                    let output = self.registry.execute(tc).await;
                    let category = self
                        .registry
                        .get(&tc.name)
                        .map(|t| t.output_category())
                        .unwrap_or_default();
                    smart_truncate(&output.content, category, TOOL_RESULT_TOKEN_CAP)
                };
                messages.push(Message::tool_result(&tc.id, &content));
            }

            if step_count as u32 >= self.agent.max_steps {
                break;
            }
        }

        let completion_tokens = (crate::compact::estimate_tokens(&messages) as i64 - prompt_tokens_start).max(0);

        // Step 10: append cycle.
        consciousness.messages = messages;

        // Step 11: compact if needed.
        if consciousness.estimate_tokens() > self.agent.hard_cap_tokens {
            consciousness.compact(self.agent.soft_cap_tokens);
        }

        consciousness.cycle_count = cycle_number;
        consciousness.last_cycle_at = Utc::now();

        Ok(StepOutcome::Completed {
            step_count,
            prompt_tokens: prompt_tokens_start,
            completion_tokens,
        })
    }

    async fn agent_plans(&self) -> anyhow::Result<Vec<pneuma_store::PlanRow>> {
        let all = self.store.list_pending_plans().await?;
        Ok(all
            .into_iter()
            .filter(|p| p.agent_entity_id == self.agent.agent_entity_id)
            .collect())
    }

    fn emit_presence(&self, spaces: &HashSet<String>, active: bool) {
        for space in spaces {
            let event = if active {
                BusEvent::AgentActive { agent_entity_id: self.agent.agent_entity_id.clone() }
            } else {
                BusEvent::AgentInactive { agent_entity_id: self.agent.agent_entity_id.clone() }
            };
            let envelope = StreamEnvelope::new(Uuid::new_v4().to_string(), event);
            if let Ok(json) = envelope.to_json() {
                self.bus.publish(&pneuma_broker::space_channel(space), json);
            }
        }
    }
}

fn trigger_space_id(events: &[InboxEvent]) -> Option<String> {
    events.iter().find_map(|e| match &e.data {
        EventData::SpaceMessage(d) => Some(d.smart_space_id.clone()),
        _ => None,
    })
}

fn update_known_spaces(known: &mut HashSet<String>, events: &[InboxEvent]) {
    for event in events {
        if let EventData::SpaceMessage(d) = &event.data {
            known.insert(d.smart_space_id.clone());
        }
    }
}

fn refresh_system_prompt(mut messages: Vec<Message>, new_prompt: String) -> Vec<Message> {
    if messages.first().is_some_and(|m| m.role == Role::System) {
        messages[0] = Message::system(new_prompt);
    } else {
        messages.insert(0, Message::system(new_prompt));
    }
    messages
}
