// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! A delayed job queue: push an item with a fire time, pop blocks until the
//! earliest pending item is due.
//!
//! The Plan Scheduler (spec §4.6) uses this to fire one-shot `run_after`/
//! `scheduled_at` plans and to re-arm recurring `cron` plans after each fire,
//! without polling the store on a tight interval.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Mutex;
use std::time::Instant;

use tokio::sync::Notify;

struct Scheduled<T> {
    fire_at: Instant,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Scheduled<T> {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}
impl<T> Eq for Scheduled<T> {}
impl<T> PartialOrd for Scheduled<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for Scheduled<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.fire_at, self.seq).cmp(&(other.fire_at, other.seq))
    }
}

pub struct DelayQueue<T> {
    heap: Mutex<BinaryHeap<Reverse<Scheduled<T>>>>,
    notify: Notify,
    next_seq: Mutex<u64>,
}

impl<T> Default for DelayQueue<T> {
    fn default() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            next_seq: Mutex::new(0),
        }
    }
}

impl<T> DelayQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `item` to become available at `fire_at`.
    pub fn push(&self, fire_at: Instant, item: T) {
        let seq = {
            let mut next = self.next_seq.lock().expect("delay queue seq mutex poisoned");
            let seq = *next;
            *next += 1;
            seq
        };
        self.heap
            .lock()
            .expect("delay queue heap mutex poisoned")
            .push(Reverse(Scheduled { fire_at, seq, item }));
        self.notify.notify_waiters();
    }

    /// Block until the earliest scheduled item's `fire_at` has elapsed, then
    /// return it. Never returns for an empty, idle queue until [`push`] wakes
    /// it — callers typically race this against a shutdown signal.
    pub async fn pop(&self) -> T {
        loop {
            let next_fire_at = {
                let heap = self.heap.lock().expect("delay queue heap mutex poisoned");
                heap.peek().map(|Reverse(s)| s.fire_at)
            };
            match next_fire_at {
                None => self.notify.notified().await,
                Some(fire_at) if fire_at <= Instant::now() => {
                    let mut heap = self.heap.lock().expect("delay queue heap mutex poisoned");
                    if let Some(Reverse(scheduled)) = heap.pop() {
                        return scheduled.item;
                    }
                }
                Some(fire_at) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(fire_at.into()) => {}
                        _ = self.notify.notified() => {}
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.lock().expect("delay queue heap mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
