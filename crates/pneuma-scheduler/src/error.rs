// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Scheduler error kinds.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("store error: {0}")]
    Store(#[from] pneuma_store::StoreError),

    #[error("inbox error: {0}")]
    Inbox(#[from] pneuma_inbox::InboxError),

    #[error("invalid cron expression {cron:?}: {source}")]
    InvalidCron {
        cron: String,
        #[source]
        source: cron::error::Error,
    },

    #[error("plan {0} has neither a cron pattern nor a nextRunAt")]
    NoSchedule(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
