// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Per-key wake signals.
//!
//! The Inbox's blocking wait (spec §4.4 `waitForInbox`) needs a way for a
//! worker that drained its inbox to sleep until the next push instead of
//! polling the store. A [`WakeRegistry`] hands out one [`tokio::sync::Notify`]
//! per key and cleans it up once nobody holds a reference any more.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

#[derive(Default)]
pub struct WakeRegistry {
    signals: Mutex<HashMap<String, Arc<Notify>>>,
}

impl WakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn signal_for(&self, key: &str) -> Arc<Notify> {
        let mut signals = self.signals.lock().expect("wake registry mutex poisoned");
        signals.entry(key.to_string()).or_insert_with(|| Arc::new(Notify::new())).clone()
    }

    /// Wake every waiter currently parked on `key`.
    pub fn notify(&self, key: &str) {
        self.signal_for(key).notify_waiters();
    }

    /// Block until [`notify`](Self::notify) fires for `key`, or `timeout` elapses.
    /// Returns `true` if woken by a notification, `false` on timeout.
    pub async fn wait(&self, key: &str, timeout: Duration) -> bool {
        let signal = self.signal_for(key);
        tokio::time::timeout(timeout, signal.notified()).await.is_ok()
    }

    /// Block until [`notify`](Self::notify) fires for `key`, with no timeout.
    pub async fn wait_forever(&self, key: &str) {
        let signal = self.signal_for(key);
        signal.notified().await;
    }

    /// Drop the `Notify` for `key` so idle agents don't accumulate entries.
    pub fn forget(&self, key: &str) {
        self.signals.lock().expect("wake registry mutex poisoned").remove(key);
    }
}
