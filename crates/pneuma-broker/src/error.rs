// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Broker error kinds.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    /// A subscriber fell behind the replay backlog and missed messages.
    #[error("subscriber lagged, {0} messages skipped")]
    Lagged(u64),

    /// The topic/queue was closed (every publisher dropped).
    #[error("channel closed")]
    Closed,
}

pub type BrokerResult<T> = Result<T, BrokerError>;
