// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! A named-channel fan-out registry built on [`crate::topic::Topic`].
//!
//! The Fan-out Bus (spec §4.8) addresses channels by string key
//! (`space:<id>`, `run:<id>`) rather than a fixed set known up front, so
//! this lazily creates one [`Topic`] per key on first publish/subscribe and
//! hands out the same one to every caller after that. Payloads are kept as
//! opaque `String`s (JSON envelopes) — this crate doesn't know the shape of
//! the events it's fanning out, only that they're ordered per channel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::topic::Topic;

const DEFAULT_CAPACITY: usize = 256;
const DEFAULT_BACKLOG: usize = 64;

pub struct FanoutBus {
    channels: Mutex<HashMap<String, Arc<Topic<String>>>>,
    backlog_cap: usize,
}

impl Default for FanoutBus {
    fn default() -> Self {
        Self::new(DEFAULT_BACKLOG)
    }
}

impl FanoutBus {
    pub fn new(backlog_cap: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            backlog_cap,
        }
    }

    fn topic_for(&self, channel: &str) -> Arc<Topic<String>> {
        let mut channels = self.channels.lock().expect("fanout bus mutex poisoned");
        channels
            .entry(channel.to_string())
            .or_insert_with(|| Arc::new(Topic::new(DEFAULT_CAPACITY, self.backlog_cap)))
            .clone()
    }

    /// Publish a JSON envelope to `channel`. Never fails — publishing to a
    /// channel with no subscribers is the common case between cycles.
    pub fn publish(&self, channel: &str, payload: String) {
        self.topic_for(channel).publish(payload);
    }

    /// Subscribe to `channel`, returning its current replay backlog (oldest
    /// first) plus a live receiver.
    pub fn subscribe(&self, channel: &str) -> (Vec<String>, broadcast::Receiver<String>) {
        self.topic_for(channel).subscribe()
    }
}

pub fn space_channel(smart_space_id: &str) -> String {
    format!("space:{smart_space_id}")
}

pub fn run_channel(run_id: &str) -> String {
    format!("run:{run_id}")
}
