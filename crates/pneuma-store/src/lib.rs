// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Durable row store for agent consciousness, inbox events, runs, pending
//! tool calls, plans, and smart-space messages.
//!
//! Backed by `rusqlite` as a self-contained stand-in for the external
//! relational store the wider system assumes (spec §1, §6). Every table and
//! status-guarded transition here corresponds directly to an entity in the
//! data model: [`models::ConsciousnessRow`], [`models::InboxEventRow`],
//! [`models::RunRow`], [`models::PendingToolCallRow`], [`models::PlanRow`],
//! [`models::SpaceMessageRow`].

mod error;
mod models;
mod schema;
mod store;

pub use error::{StoreError, StoreResult};
pub use models::*;
pub use store::Store;
