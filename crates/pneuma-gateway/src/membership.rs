// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Smart-space membership resolution.
//!
//! spec.md §1 names membership as an external collaborator — "a policy
//! oracle the core calls" — not something this system owns. [`POST
//! /smart-spaces/{spaceId}/messages`](crate::http::handlers::post_space_message)
//! still needs *some* answer to "who else is in this space" to fan the new
//! message out to every other agent-type member's inbox, so this module
//! defines the seam the real oracle would plug into and a minimal stand-in
//! behind it.

/// Resolves the agent-type membership of a smart space.
///
/// A production deployment replaces [`StaticMembership`] with whatever talks
/// to the real membership/ACL service; the trait is the only thing the HTTP
/// layer depends on.
pub trait MembershipOracle: Send + Sync {
    /// `agentEntityId`s of every agent-type member of `smart_space_id`,
    /// other than `exclude_entity_id` (the message's sender, when the
    /// sender is itself an agent).
    fn other_agent_members(&self, smart_space_id: &str, exclude_entity_id: &str) -> Vec<String>;
}

/// Treats every configured agent as a member of every smart space.
///
/// This is the narrowest stand-in that lets the HTTP edge's fan-out logic
/// run without a real membership store; it is not a membership model.
pub struct StaticMembership {
    agent_entity_ids: Vec<String>,
}

impl StaticMembership {
    pub fn new(agent_entity_ids: Vec<String>) -> Self {
        Self { agent_entity_ids }
    }

    pub fn from_config(cfg: &pneuma_config::Config) -> Self {
        Self::new(cfg.agents.iter().map(|a| a.agent_entity_id.clone()).collect())
    }
}

impl MembershipOracle for StaticMembership {
    fn other_agent_members(&self, _smart_space_id: &str, exclude_entity_id: &str) -> Vec<String> {
        self.agent_entity_ids
            .iter()
            .filter(|id| id.as_str() != exclude_entity_id)
            .cloned()
            .collect()
    }
}
