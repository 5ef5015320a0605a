// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Broadcast topics with a bounded replay backlog.
//!
//! The Fan-out Bus (spec §4.8) needs late subscribers — an SSE client that
//! connects mid-run — to see the last few messages instead of only what's
//! published after they subscribe. [`Topic`] pairs a `tokio::sync::broadcast`
//! channel with a small ring buffer that new subscribers replay before
//! switching over to live messages.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::broadcast;

use crate::error::BrokerError;

pub struct Topic<T> {
    tx: broadcast::Sender<T>,
    backlog: Mutex<VecDeque<T>>,
    backlog_cap: usize,
}

impl<T: Clone> Topic<T> {
    pub fn new(capacity: usize, backlog_cap: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            backlog: Mutex::new(VecDeque::with_capacity(backlog_cap)),
            backlog_cap,
        }
    }

    /// Publish `msg` to every live subscriber and append it to the replay
    /// backlog. Never errors when there are no subscribers — that's the
    /// common case between runs.
    pub fn publish(&self, msg: T) {
        {
            let mut backlog = self.backlog.lock().expect("topic backlog mutex poisoned");
            if backlog.len() == self.backlog_cap {
                backlog.pop_front();
            }
            backlog.push_back(msg.clone());
        }
        let _ = self.tx.send(msg);
    }

    /// Subscribe, returning the current backlog (oldest first) plus a live
    /// receiver for everything published from this point on.
    pub fn subscribe(&self) -> (Vec<T>, broadcast::Receiver<T>) {
        let rx = self.tx.subscribe();
        let backlog = self.backlog.lock().expect("topic backlog mutex poisoned");
        (backlog.iter().cloned().collect(), rx)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Adapts a `broadcast::Receiver` recv into the crate's error type, mapping
/// `Lagged` to [`BrokerError::Lagged`] instead of silently resubscribing.
pub async fn recv<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Result<T, BrokerError> {
    match rx.recv().await {
        Ok(v) => Ok(v),
        Err(broadcast::error::RecvError::Lagged(n)) => Err(BrokerError::Lagged(n)),
        Err(broadcast::error::RecvError::Closed) => Err(BrokerError::Closed),
    }
}
