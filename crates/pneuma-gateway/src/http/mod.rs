// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Axum router wiring for the five endpoints.

pub mod handlers;
pub mod sse;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full router. The caller owns binding/serving it (typically via
/// `axum::serve` against a `TcpListener` bound to `state.http.listen_addr`).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/agents/:agent_id/trigger", post(handlers::post_trigger))
        .route("/smart-spaces/:space_id/messages", post(handlers::post_space_message))
        .route("/smart-spaces/:space_id/stream", get(handlers::get_space_stream))
        .route("/runs/:run_id/stream", get(handlers::get_run_stream))
        .route("/runs/:run_id/tool-results", post(handlers::post_tool_result))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
