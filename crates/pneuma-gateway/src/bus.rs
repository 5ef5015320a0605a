// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The Fan-out Bus (C8, spec §4.8), re-exported at the name the rest of the
//! system addresses it by.
//!
//! The actual broadcast-with-backlog machinery lives in `pneuma-broker`,
//! shared with the Inbox's wake signals and the Plan Scheduler's timers —
//! this module is the gateway-facing door onto it, not a second
//! implementation.

pub use pneuma_broker::{run_channel, space_channel, FanoutBus};
