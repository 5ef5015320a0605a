// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The Consciousness Store (C3, spec §4.3) — an agent's persisted message
//! history plus the bookkeeping (`cycleCount`, token estimate) a worker
//! needs across cycles.
//!
//! `save` is atomic per `agentEntityId`; concurrent saves for the same
//! agent never happen by construction — only that agent's own worker ever
//! writes its row.

use chrono::{DateTime, Utc};
use pneuma_model::Message;
use pneuma_store::{ConsciousnessRow, Store, StoreResult};

use crate::compact::{estimate_tokens, self_summary_compact};

/// An agent's working message history, loaded from and saved back to the
/// durable store.
#[derive(Debug, Clone)]
pub struct Consciousness {
    pub agent_entity_id: String,
    pub messages: Vec<Message>,
    pub cycle_count: i64,
    pub last_cycle_at: DateTime<Utc>,
}

impl Consciousness {
    fn empty(agent_entity_id: impl Into<String>) -> Self {
        Self {
            agent_entity_id: agent_entity_id.into(),
            messages: Vec::new(),
            cycle_count: 0,
            last_cycle_at: Utc::now(),
        }
    }

    /// `load(agentEntityId)`: returns the persisted record, or a fresh
    /// empty one if the agent has never run a cycle.
    pub async fn load(store: &Store, agent_entity_id: &str) -> StoreResult<Self> {
        let row = store.load_consciousness(agent_entity_id).await?;
        if row.messages_json.is_empty() {
            return Ok(Self::empty(agent_entity_id));
        }
        let messages: Vec<Message> = serde_json::from_str(&row.messages_json).unwrap_or_default();
        let last_cycle_at = row.last_cycle_at.parse().unwrap_or_else(|_| Utc::now());
        Ok(Self {
            agent_entity_id: row.agent_entity_id,
            messages,
            cycle_count: row.cycle_count,
            last_cycle_at,
        })
    }

    /// `save(agentEntityId, messages, cycleCount, tokenEstimate, lastCycleAt)`:
    /// upserts atomically.
    pub async fn save(&self, store: &Store) -> StoreResult<()> {
        let messages_json = serde_json::to_string(&self.messages).unwrap_or_default();
        let row = ConsciousnessRow {
            agent_entity_id: self.agent_entity_id.clone(),
            messages_json,
            cycle_count: self.cycle_count,
            token_estimate: self.estimate_tokens() as i64,
            last_cycle_at: self.last_cycle_at.to_rfc3339(),
        };
        store.save_consciousness(row).await
    }

    /// `estimateTokens(messages)`.
    pub fn estimate_tokens(&self) -> usize {
        estimate_tokens(&self.messages)
    }

    /// `compact(messages, softCap)`: self-summary compaction in place.
    pub fn compact(&mut self, soft_cap: usize) {
        let messages = std::mem::take(&mut self.messages);
        self.messages = self_summary_compact(messages, soft_cap);
    }

    /// `refreshSystemPrompt(messages, newPrompt)`: replace the leading
    /// system message's text, or insert one at the head if absent.
    pub fn refresh_system_prompt(&mut self, new_prompt: impl Into<String>) {
        let new_prompt = new_prompt.into();
        if self.messages.first().is_some_and(|m| m.role == pneuma_model::Role::System) {
            self.messages[0] = Message::system(new_prompt);
        } else {
            self.messages.insert(0, Message::system(new_prompt));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_returns_a_fresh_record_when_absent() {
        let store = Store::open_in_memory().unwrap();
        let c = Consciousness::load(&store, "agent-1").await.unwrap();
        assert!(c.messages.is_empty());
        assert_eq!(c.cycle_count, 0);
    }

    #[tokio::test]
    async fn save_then_load_round_trips_messages_and_ordering() {
        let store = Store::open_in_memory().unwrap();
        let mut c = Consciousness::load(&store, "agent-1").await.unwrap();
        c.messages.push(Message::system("identity"));
        c.messages.push(Message::user("hello"));
        c.messages.push(Message::assistant("hi there"));
        c.cycle_count = 3;
        c.save(&store).await.unwrap();

        let reloaded = Consciousness::load(&store, "agent-1").await.unwrap();
        assert_eq!(reloaded.cycle_count, 3);
        assert_eq!(reloaded.messages.len(), 3);
        assert_eq!(reloaded.messages[1].as_text(), Some("hello"));
        assert_eq!(reloaded.messages[2].as_text(), Some("hi there"));
    }

    #[tokio::test]
    async fn refresh_system_prompt_replaces_existing_leading_system_message() {
        let store = Store::open_in_memory().unwrap();
        let mut c = Consciousness::load(&store, "agent-1").await.unwrap();
        c.messages.push(Message::system("old identity"));
        c.messages.push(Message::user("hi"));

        c.refresh_system_prompt("new identity");

        assert_eq!(c.messages.len(), 2);
        assert_eq!(c.messages[0].as_text(), Some("new identity"));
    }

    #[tokio::test]
    async fn refresh_system_prompt_inserts_when_absent() {
        let store = Store::open_in_memory().unwrap();
        let mut c = Consciousness::load(&store, "agent-1").await.unwrap();
        c.messages.push(Message::user("hi"));

        c.refresh_system_prompt("identity");

        assert_eq!(c.messages.len(), 2);
        assert_eq!(c.messages[0].as_text(), Some("identity"));
        assert_eq!(c.messages[0].role, pneuma_model::Role::System);
    }

    #[tokio::test]
    async fn compact_reduces_below_soft_cap_and_preserves_last_cycle() {
        let store = Store::open_in_memory().unwrap();
        let mut c = Consciousness::load(&store, "agent-1").await.unwrap();
        c.messages.push(Message::system("identity"));
        for i in 0..5 {
            c.messages.push(Message::user(format!("request {i}")));
            c.messages.push(Message::assistant(format!("reply {i}")));
        }

        c.compact(1);

        assert_eq!(c.messages.last().unwrap().as_text(), Some("reply 4"));
        assert!(c.estimate_tokens() < estimate_tokens(&{
            let mut m = vec![Message::system("identity")];
            for i in 0..5 {
                m.push(Message::user(format!("request {i}")));
                m.push(Message::assistant(format!("reply {i}")));
            }
            m
        }));
    }
}
