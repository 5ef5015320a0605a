// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Inbox error kinds — a superset of [`pneuma_store::StoreError`] plus
//! decode failures for malformed queued payloads.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InboxError {
    #[error("store error: {0}")]
    Store(#[from] pneuma_store::StoreError),

    #[error("malformed event payload: {0}")]
    Decode(String),
}

impl InboxError {
    pub fn is_transient(&self) -> bool {
        matches!(self, InboxError::Store(e) if e.is_transient())
    }
}

pub type InboxResult<T> = Result<T, InboxError>;
