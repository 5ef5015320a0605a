// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Wires up one gateway's worth of shared infrastructure — store, inbox,
//! fan-out bus, scheduler, tool registry — and constructs one [`Worker`] per
//! configured agent. The caller (the Process Supervisor) owns spawning and
//! restarting the returned pieces; this module only builds them.

use std::sync::Arc;

use pneuma_broker::FanoutBus;
use pneuma_config::{AgentConfig, Config, ModelConfig};
use pneuma_core::Worker;
use pneuma_inbox::Inbox;
use pneuma_scheduler::Scheduler;
use pneuma_store::Store;
use pneuma_tools::ToolRegistry;

use crate::registry::build_tool_registry;

/// Everything the Process Supervisor needs to start serving one gateway
/// instance: the shared infrastructure plus one constructed [`Worker`] per
/// agent in `cfg.agents`.
pub struct GatewayRuntime {
    pub store: Store,
    pub inbox: Arc<Inbox>,
    pub bus: Arc<FanoutBus>,
    pub scheduler: Arc<Scheduler>,
    pub registry: Arc<ToolRegistry>,
    pub workers: Vec<Worker>,
}

/// Build a [`GatewayRuntime`] from a loaded [`Config`].
///
/// Opens (or creates) the SQLite-backed store at `cfg.store.db_path`,
/// constructs the shared `Inbox`/`FanoutBus`/`Scheduler`/`ToolRegistry`, and
/// resolves + constructs a [`pneuma_model::ModelProvider`] for every agent
/// in `cfg.agents` via its `model` key (`"default"` selects `cfg.model`;
/// any other key looks up `cfg.providers`).
pub fn build_runtime(cfg: &Config) -> anyhow::Result<GatewayRuntime> {
    let store = Store::open(&cfg.store.db_path)?;
    let inbox = Arc::new(Inbox::new(store.clone()));
    let bus = Arc::new(FanoutBus::new(cfg.http.replay_backlog_size));
    let scheduler = Arc::new(Scheduler::new(store.clone(), inbox.clone()));
    let registry = Arc::new(build_tool_registry());

    let mut workers = Vec::with_capacity(cfg.agents.len());
    for agent in &cfg.agents {
        let model_cfg = resolve_model_config(cfg, agent)?;
        let model = pneuma_model::from_config(&model_cfg)?;
        workers.push(Worker::new(
            agent.clone(),
            store.clone(),
            inbox.clone(),
            bus.clone(),
            registry.clone(),
            model,
        ));
    }

    Ok(GatewayRuntime {
        store,
        inbox,
        bus,
        scheduler,
        registry,
        workers,
    })
}

impl GatewayRuntime {
    /// Construct a fresh [`Worker`] for `agent_entity_id`, looked up in
    /// `cfg.agents`. Used by the Process Supervisor to restart a crashed
    /// worker (`Worker::run` consumes `self`, so a restart needs a new
    /// instance, not the original moved-from one) and to react to
    /// `onAgentCreated`.
    pub fn build_worker_for(&self, cfg: &Config, agent_entity_id: &str) -> anyhow::Result<Worker> {
        let agent = cfg
            .agents
            .iter()
            .find(|a| a.agent_entity_id == agent_entity_id)
            .ok_or_else(|| anyhow::anyhow!("no agent config for entity id {:?}", agent_entity_id))?;
        let model_cfg = resolve_model_config(cfg, agent)?;
        let model = pneuma_model::from_config(&model_cfg)?;
        Ok(Worker::new(
            agent.clone(),
            self.store.clone(),
            self.inbox.clone(),
            self.bus.clone(),
            self.registry.clone(),
            model,
        ))
    }
}

fn resolve_model_config(cfg: &Config, agent: &AgentConfig) -> anyhow::Result<ModelConfig> {
    if agent.model == "default" {
        return Ok(cfg.model.clone());
    }
    cfg.providers.get(&agent.model).cloned().ok_or_else(|| {
        anyhow::anyhow!(
            "agent {:?} references unknown provider key {:?}",
            agent.agent_id,
            agent.model
        )
    })
}
