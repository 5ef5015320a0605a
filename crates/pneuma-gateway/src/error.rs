// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! HTTP-edge error kinds — wraps the lower layers' errors and maps them to
//! status codes at the one place that needs to know about both.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("store error: {0}")]
    Store(#[from] pneuma_store::StoreError),

    #[error("inbox error: {0}")]
    Inbox(#[from] pneuma_inbox::InboxError),

    #[error("async tool error: {0}")]
    AsyncTool(#[from] pneuma_core::AsyncToolError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid request: {0}")]
    BadRequest(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Store(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Inbox(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::AsyncTool(e) if e.is_already_completed() => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, axum::Json(json!({ "error": self.to_string() }))).into_response()
    }
}
