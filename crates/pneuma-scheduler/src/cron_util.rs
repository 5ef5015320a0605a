// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Cron expression parsing and next-fire computation.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::error::{SchedulerError, SchedulerResult};

/// The `cron` crate requires a leading seconds field (6 or 7 fields total).
/// Plans in spec.md §8 are written in standard 5-field cron (minute-first,
/// no seconds); normalize those by prepending `"0 "` so both forms work.
fn normalize(expr: &str) -> String {
    if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}

pub fn next_fire_after(expr: &str, after: DateTime<Utc>) -> SchedulerResult<DateTime<Utc>> {
    let normalized = normalize(expr);
    let schedule = Schedule::from_str(&normalized).map_err(|source| SchedulerError::InvalidCron {
        cron: expr.to_string(),
        source,
    })?;
    schedule
        .after(&after)
        .next()
        .ok_or_else(|| SchedulerError::NoSchedule(expr.to_string()))
}
