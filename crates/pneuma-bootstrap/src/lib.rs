// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Gateway construction factory.
//!
//! Consolidates the two concerns every frontend (the gateway binary, and
//! any future one) would otherwise duplicate:
//! - Tool-registry building ([`build_tool_registry`])
//! - Turning a loaded [`pneuma_config::Config`] into a running set of
//!   per-agent [`pneuma_core::Worker`]s plus their shared infrastructure
//!   ([`build_runtime`])

pub mod registry;
pub mod runtime;

pub use registry::build_tool_registry;
pub use runtime::{build_runtime, GatewayRuntime};
