// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Small runtime utilities shared by every crate that retries transient
//! operations or needs to cooperate with process shutdown.
//!
//! Nothing here is gateway-domain-specific: the Process Supervisor's restart
//! policy, the broker's retry loops, and the scheduler's job retries all
//! build on the same [`Backoff`] sequence instead of duplicating backoff math
//! at each call site.

pub mod backoff;
pub mod shutdown;

pub use backoff::Backoff;
pub use shutdown::{shutdown_signal, CancelToken};
