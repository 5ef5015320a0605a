// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The Process Supervisor (C1, spec §4.1): brings up one long-lived worker
//! per known agent, restarts a crashed worker with backoff, and shuts
//! everything down cleanly on signal.
//!
//! Worker recovery of stuck inbox events (`recoverStuckEvents`) happens
//! inside [`pneuma_core::Worker::run`] itself, at the top of its loop, so the
//! supervisor does not duplicate that call — it only owns spawn/restart/stop.

use std::collections::HashMap;
use std::sync::Arc;

use pneuma_bootstrap::GatewayRuntime;
use pneuma_config::Config;
use pneuma_core::Worker;
use pneuma_runtime::{Backoff, CancelToken, CancelTokenSource};
use tokio::task::JoinHandle;

/// Runs every agent worker, the plan scheduler, and the HTTP/SSE server for
/// one gateway instance, and coordinates their shutdown.
pub struct Supervisor {
    cfg: Config,
    runtime: Arc<GatewayRuntime>,
    cancel_source: CancelTokenSource,
    workers: HashMap<String, JoinHandle<()>>,
    /// Workers [`pneuma_bootstrap::build_runtime`] already constructed,
    /// taken by [`Supervisor::start`] on first spawn so the initial fleet
    /// isn't built twice (once by `build_runtime`, again via
    /// `build_worker_for`).
    initial_workers: Vec<Worker>,
}

impl Supervisor {
    pub fn new(cfg: Config, mut runtime: GatewayRuntime) -> Self {
        let initial_workers = std::mem::take(&mut runtime.workers);
        Self {
            cfg,
            runtime: Arc::new(runtime),
            cancel_source: CancelTokenSource::new(),
            workers: HashMap::new(),
            initial_workers,
        }
    }

    /// Start one supervised task per configured agent, the scheduler, and
    /// the HTTP server. Returns once every agent worker has been spawned;
    /// callers should then await [`Supervisor::stop`] alongside a shutdown
    /// signal.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        for worker in std::mem::take(&mut self.initial_workers) {
            self.spawn(worker);
        }

        self.runtime.scheduler.reconcile_on_startup().await?;
        let scheduler = self.runtime.scheduler.clone();
        let cancel = self.cancel_source.token();
        tokio::spawn(async move { scheduler.run(cancel).await });

        self.spawn_http_server()?;

        Ok(())
    }

    /// Called when a new agent is added to a running gateway (spec §4.1
    /// `onAgentCreated`). Not yet reachable from the HTTP surface (spec.md
    /// §6 names no admin endpoint for it); wired up for config reload paths.
    pub fn on_agent_created(&mut self, agent_entity_id: &str) -> anyhow::Result<()> {
        let worker = self.runtime.build_worker_for(&self.cfg, agent_entity_id)?;
        self.spawn(worker);
        Ok(())
    }

    /// Stop the worker for a deleted agent (spec §4.1 `onAgentDeleted`)
    /// without touching the others.
    pub fn on_agent_deleted(&mut self, agent_entity_id: &str) {
        if let Some(handle) = self.workers.remove(agent_entity_id) {
            handle.abort();
        }
    }

    fn spawn(&mut self, worker: Worker) {
        let agent_entity_id = worker.agent_entity_id().to_string();
        let cancel = self.cancel_source.token();
        let runtime = self.runtime.clone();
        let cfg = self.cfg.clone();

        let handle = tokio::spawn(run_worker_with_restart(
            worker,
            cancel,
            runtime,
            cfg,
            agent_entity_id.clone(),
        ));
        self.workers.insert(agent_entity_id, handle);
    }

    /// Signal every supervised task to stop and await each one within a
    /// grace deadline. Exceeding the deadline aborts whatever is left, so a
    /// stuck worker cannot block process exit indefinitely.
    pub async fn stop(self, grace: std::time::Duration) {
        self.cancel_source.cancel();
        let handles: Vec<JoinHandle<()>> = self.workers.into_values().collect();
        let join_all = futures::future::join_all(handles.into_iter().map(|h| async move {
            let _ = h.await;
        }));
        if tokio::time::timeout(grace, join_all).await.is_err() {
            tracing::warn!("supervisor shutdown grace period elapsed; some workers did not exit cleanly");
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel_source.token()
    }

    fn spawn_http_server(&self) -> anyhow::Result<()> {
        let state = pneuma_gateway::AppState::from_runtime(&self.runtime, &self.cfg);
        let listen_addr = self.cfg.http.listen_addr.clone();
        let cancel = self.cancel_source.token();

        tokio::spawn(async move {
            let router = pneuma_gateway::router(state);
            let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
                Ok(l) => l,
                Err(e) => {
                    tracing::error!(error = %e, addr = %listen_addr, "failed to bind HTTP listener");
                    return;
                }
            };
            tracing::info!(addr = %listen_addr, "HTTP/SSE surface listening");
            let serve = axum::serve(listener, router);
            tokio::select! {
                result = serve => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "HTTP server exited with error");
                    }
                }
                _ = cancel.cancelled() => {
                    tracing::info!("HTTP server stopping on shutdown signal");
                }
            }
        });

        Ok(())
    }
}

/// Run one worker to completion, restarting it with capped exponential
/// backoff on error. A clean exit (cancellation) is never restarted (spec
/// §4.1 failure semantics).
async fn run_worker_with_restart(
    mut worker: Worker,
    cancel: CancelToken,
    runtime: Arc<GatewayRuntime>,
    cfg: Config,
    agent_entity_id: String,
) {
    let mut backoff = Backoff::supervisor_default();

    loop {
        if cancel.is_cancelled() {
            return;
        }

        let result = worker.run(cancel.clone()).await;
        match result {
            Ok(()) => return,
            Err(e) => {
                if cancel.is_cancelled() {
                    return;
                }
                let delay = backoff.next();
                tracing::warn!(
                    agent_entity_id = %agent_entity_id,
                    attempt = backoff.attempt(),
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "worker exited with error; restarting"
                );
                tokio::time::sleep(delay).await;

                worker = match runtime.build_worker_for(&cfg, &agent_entity_id) {
                    Ok(w) => w,
                    Err(e) => {
                        tracing::error!(
                            agent_entity_id = %agent_entity_id,
                            error = %e,
                            "could not rebuild worker for restart; giving up"
                        );
                        return;
                    }
                };
            }
        }
    }
}
