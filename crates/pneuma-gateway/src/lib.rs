// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The HTTP/SSE edge of a pneuma gateway (spec.md §6).
//!
//! Five endpoints, all thin: validate the request, do exactly one durable
//! write or read, and either call into the Inbox / Async-Tool Manager or
//! hand back an SSE stream off the Fan-out Bus. Routing, auth, and the rest
//! of the HTTP surface a real deployment wants in front of this are left to
//! whatever reverse proxy or edge the operator already runs.

pub mod bus;
pub mod error;
pub mod http;
pub mod membership;
pub mod state;

#[cfg(test)]
mod tests;

pub use bus::FanoutBus;
pub use error::{GatewayError, GatewayResult};
pub use http::router;
pub use membership::{MembershipOracle, StaticMembership};
pub use state::AppState;
