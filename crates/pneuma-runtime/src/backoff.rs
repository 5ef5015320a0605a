// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Jittered exponential backoff.
//!
//! Used by the Process Supervisor's worker restart policy (capped at 5 s) and
//! by broker/store retry loops around `Transient` errors.

use std::time::Duration;

/// An exponential-backoff sequence with full jitter.
///
/// Each call to [`next`][Backoff::next] doubles the base delay (up to `max`)
/// and returns a duration sampled uniformly from `[0, base]`, so that many
/// callers backing off at once don't retry in lockstep.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
    attempt: u32,
}

impl Backoff {
    /// Construct a backoff sequence starting at `base` and never exceeding `max`.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            current: base,
            attempt: 0,
        }
    }

    /// Supervisor restart policy: starts at 200 ms, capped at 5 s.
    pub fn supervisor_default() -> Self {
        Self::new(Duration::from_millis(200), Duration::from_secs(5))
    }

    /// Return the next delay and advance the sequence.
    pub fn next(&mut self) -> Duration {
        let delay = self.current;
        self.attempt += 1;
        self.current = (self.current * 2).min(self.max);
        jitter(delay)
    }

    /// Number of delays handed out so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Reset to the initial base delay (call after a successful operation).
    pub fn reset(&mut self) {
        self.current = self.base;
        self.attempt = 0;
    }
}

/// Sample a duration uniformly from `[0, upper]`. Full jitter, no floor —
/// a zero-length sleep is valid and keeps the first retry snappy.
fn jitter(upper: Duration) -> Duration {
    if upper.is_zero() {
        return upper;
    }
    let millis = upper.as_millis().max(1) as u64;
    let sampled = fastrand_u64(millis);
    Duration::from_millis(sampled)
}

/// Minimal, dependency-free uniform sampler over `0..bound`.
///
/// Seeded from the current time so successive calls within the same process
/// diverge; this is jitter for retry spacing, not a security primitive.
fn fastrand_u64(bound: u64) -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    // xorshift mix so nearby calls (same nanosecond bucket) still scatter.
    let mut x = nanos ^ 0x9E3779B97F4A7C15;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x % bound.max(1)
}
