// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The Inbox subsystem: durable, deduplicated, per-agent event delivery.
//!
//! Every trigger an agent reacts to — a smart-space message, a fired plan, a
//! service ping, an async tool result — arrives through here first. See
//! [`inbox::Inbox`] for the operation surface and [`event`] for the wire
//! shapes.

mod error;
mod event;
mod format;
mod inbox;

pub use error::{InboxError, InboxResult};
pub use event::{EventData, InboxEvent, PlanData, RecentContextEntry, SenderType, ServiceData, SpaceMessageData, ToolResultData};
pub use format::{format_inbox_events, format_inbox_preview};
pub use inbox::Inbox;
