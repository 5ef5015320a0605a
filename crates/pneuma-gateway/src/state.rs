// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Shared state threaded through every axum handler.

use std::sync::Arc;

use pneuma_broker::FanoutBus;
use pneuma_config::HttpConfig;
use pneuma_inbox::Inbox;
use pneuma_store::Store;

use crate::membership::MembershipOracle;

/// Everything an HTTP handler needs: the durable store and inbox (to write
/// triggers and messages), the fan-out bus (to publish and subscribe), the
/// membership oracle (to resolve who a new space message wakes), and the
/// HTTP-tunable knobs (SSE keep-alive interval, replay backlog size).
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub inbox: Arc<Inbox>,
    pub bus: Arc<FanoutBus>,
    pub membership: Arc<dyn MembershipOracle>,
    pub http: HttpConfig,
}

impl AppState {
    pub fn new(
        store: Store,
        inbox: Arc<Inbox>,
        bus: Arc<FanoutBus>,
        membership: Arc<dyn MembershipOracle>,
        http: HttpConfig,
    ) -> Self {
        Self { store, inbox, bus, membership, http }
    }

    /// Build directly from a [`pneuma_bootstrap::GatewayRuntime`] plus the
    /// loaded config it was built from (for `http` settings and the
    /// membership stand-in's agent list).
    pub fn from_runtime(runtime: &pneuma_bootstrap::GatewayRuntime, cfg: &pneuma_config::Config) -> Self {
        Self::new(
            runtime.store.clone(),
            runtime.inbox.clone(),
            runtime.bus.clone(),
            Arc::new(crate::membership::StaticMembership::from_config(cfg)),
            cfg.http.clone(),
        )
    }
}
