// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Row-store error kinds.
//!
//! Concrete realization of the abstract kinds named for the store boundary:
//! `Transient`, `InvariantViolation`, `AlreadyCompleted`, `NotFound`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite busy/locked or an I/O hiccup — safe to retry with backoff.
    #[error("transient store error: {0}")]
    Transient(String),

    /// A status-guarded update matched zero rows (e.g. `processing → processed`
    /// on a row that wasn't `processing`).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A unique-key row was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A duplicate terminal operation (e.g. a second `submitToolResult`).
    #[error("already completed: {0}")]
    AlreadyCompleted(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _)
                if matches!(
                    err.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                StoreError::Transient(e.to_string())
            }
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(e.to_string()),
            other => StoreError::Transient(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
