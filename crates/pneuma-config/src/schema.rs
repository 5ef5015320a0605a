// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Top-level gateway configuration.
///
/// Loaded by [`crate::load`] by merging YAML layers from well-known search
/// paths, with an optional explicit `--config` file taking highest priority.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    /// Named provider configurations, selectable per-agent by key.
    #[serde(default)]
    pub providers: std::collections::HashMap<String, ModelConfig>,
    /// Static per-agent configuration. Agents are otherwise created/deleted
    /// externally (spec.md §3); this list is the bootstrap set the gateway
    /// supervises on startup.
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file backing the durable row store
    /// (`AgentConsciousness`, `InboxEvent`, `Run`, `PendingToolCall`, `Plan`,
    /// `SmartSpaceMessage` — spec.md §6 "Persisted state").
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    dirs::data_dir()
        .map(|d| d.join("pneuma-gateway/state.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("./pneuma-gateway-state.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_broker_queue_capacity() -> usize {
    10_000
}
fn default_wait_timeout_secs() -> u64 {
    30
}

/// Tuning for the in-process broker standing in for the Redis-like fast
/// queue / pub-sub / delayed-job primitives spec.md §4.4 and §4.6 assume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Soft capacity hint for each agent's fast FIFO queue. The queue never
    /// rejects pushes (spec.md §5: "unbounded by design"); this only sizes
    /// the initial backing allocation.
    #[serde(default = "default_broker_queue_capacity")]
    pub queue_capacity: usize,
    /// Server-side timeout for `waitForInbox`, per spec.md §4.4.
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_broker_queue_capacity(),
            wait_timeout_secs: default_wait_timeout_secs(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".into()
}
fn default_keepalive_secs() -> u64 {
    30
}
fn default_backlog_size() -> usize {
    256
}

/// HTTP/SSE edge configuration (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Keep-alive comment interval for SSE streams.
    #[serde(default = "default_keepalive_secs")]
    pub sse_keepalive_secs: u64,
    /// Bounded per-channel replay backlog (spec.md §4.8).
    #[serde(default = "default_backlog_size")]
    pub replay_backlog_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            sse_keepalive_secs: default_keepalive_secs(),
            replay_backlog_size: default_backlog_size(),
        }
    }
}

fn default_job_handler_pool_size() -> usize {
    4
}
fn default_remove_on_fail() -> u32 {
    5
}

/// Plan Scheduler tuning (spec.md §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_job_handler_pool_size")]
    pub job_handler_pool_size: usize,
    #[serde(default = "default_remove_on_fail")]
    pub remove_on_fail: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            job_handler_pool_size: default_job_handler_pool_size(),
            remove_on_fail: default_remove_on_fail(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider identifier: "openai" | "anthropic" | "mock" | ...
    pub provider: String,
    /// Model name forwarded to the provider API.
    pub name: String,
    /// Environment variable that holds the API key (read at runtime).
    pub api_key_env: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Path to a YAML scripted-responses file (provider = "mock").
    pub mock_responses_file: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "mock".into(),
            name: "mock-1".into(),
            api_key_env: None,
            api_key: None,
            base_url: None,
            max_tokens: Some(4096),
            temperature: Some(0.2),
            mock_responses_file: None,
        }
    }
}

fn default_max_steps() -> u32 {
    24
}
fn default_soft_cap() -> usize {
    40_000
}
fn default_hard_cap() -> usize {
    50_000
}
fn default_peek_preview_count() -> usize {
    5
}

/// Static, externally-managed configuration for one agent identity
/// (spec.md §3 "Agent" entity).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub agent_id: String,
    pub agent_entity_id: String,
    pub name: String,
    /// Seed text folded into the templated system prompt (spec.md §4.2 step 6).
    #[serde(default)]
    pub system_prompt_seed: String,
    /// Model provider key — either "default" or a key into `providers`.
    #[serde(default = "default_model_key")]
    pub model: String,
    /// Names of tools available to this agent (must exist in the shared
    /// `ToolRegistry`).
    #[serde(default)]
    pub tools: Vec<String>,
    /// Subset of `tools` whose authoritative execution happens externally
    /// (spec.md §4.7 Async-Tool Manager).
    #[serde(default)]
    pub async_tools: Vec<String>,
    /// Subset of `tools` that broadcast `tool.*` fan-out events and persist
    /// a `SpaceMessage` per call (spec.md §4.5 point 4).
    #[serde(default)]
    pub visible_tools: Vec<String>,
    /// `stopWhen = stepCountIs(maxSteps)` (spec.md §4.2 step 7).
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// Compaction soft cap — compaction runs until at or below this
    /// (spec.md §4.3).
    #[serde(default = "default_soft_cap")]
    pub soft_cap_tokens: usize,
    /// Compaction hard cap — triggers compaction when exceeded
    /// (spec.md §4.2 step 11).
    #[serde(default = "default_hard_cap")]
    pub hard_cap_tokens: usize,
    /// `prepareStep` non-destructive peek count (spec.md §4.2 step 7).
    #[serde(default = "default_peek_preview_count")]
    pub peek_preview_count: usize,
}

fn default_model_key() -> String {
    "default".into()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
