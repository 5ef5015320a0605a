// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Cooperative cancellation and graceful shutdown.
//!
//! The Process Supervisor needs to signal every running worker at once; a
//! single-consumer `oneshot` (the shape the Agent Worker's own cycle loop
//! uses internally for the cancel parameter it accepts) doesn't fan out, so
//! this wraps a `tokio::sync::watch` channel instead — cheap to clone, cheap
//! to poll, and `wait_for` naturally resolves once and stays resolved.

use tokio::sync::watch;

/// A cloneable, broadcastable cancellation flag.
///
/// Clones observe the same underlying flag: once [`cancel`][CancelToken::cancel]
/// is called on any clone (or the owning [`CancelTokenSource`] is dropped),
/// every clone's [`cancelled`][CancelToken::cancelled] future resolves.
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Resolve once cancellation has been requested. Safe to await repeatedly
    /// and from multiple tasks concurrently.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        let _ = rx.wait_for(|v| *v).await;
    }

    /// Non-blocking check of current cancellation state.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

/// The write side of a [`CancelToken`] family. Held by whoever owns the
/// shutdown decision (the Process Supervisor, the root binary's signal
/// handler).
pub struct CancelTokenSource {
    tx: watch::Sender<bool>,
}

impl CancelTokenSource {
    /// Create a new, not-yet-cancelled token source.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Mint a new observer. Observers created before or after [`cancel`] is
    /// called both see the correct state.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl Default for CancelTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve on SIGINT (`Ctrl-C`) or, on Unix, SIGTERM — whichever arrives
/// first. Intended to be raced against the supervisor's run loop in the root
/// binary's `main`.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn token_is_not_cancelled_initially() {
        let src = CancelTokenSource::new();
        let token = src.token();
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_wakes_all_clones() {
        let src = CancelTokenSource::new();
        let t1 = src.token();
        let t2 = src.token();
        src.cancel();
        assert!(t1.is_cancelled());
        assert!(t2.is_cancelled());
        t1.cancelled().await;
        t2.cancelled().await;
    }

    #[tokio::test]
    async fn cancelled_resolves_after_delayed_cancel() {
        let src = CancelTokenSource::new();
        let token = src.token();
        let waiter = tokio::spawn(async move {
            token.cancelled().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        src.cancel();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn token_minted_after_cancel_sees_cancelled_state() {
        let src = CancelTokenSource::new();
        src.cancel();
        let late_token = src.token();
        assert!(late_token.is_cancelled());
    }
}
