// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! A bounded multi-producer single-consumer FIFO queue.
//!
//! Thin wrapper over `tokio::sync::mpsc` so callers depend on this crate's
//! [`BrokerError`] instead of reaching into `tokio::sync::mpsc::error` at
//! every call site.

use tokio::sync::mpsc;

use crate::error::BrokerError;

pub struct Sender<T>(mpsc::Sender<T>);
pub struct Receiver<T>(mpsc::Receiver<T>);

pub fn channel<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Sender(tx), Receiver(rx))
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Sender(self.0.clone())
    }
}

impl<T> Sender<T> {
    pub async fn send(&self, item: T) -> Result<(), BrokerError> {
        self.0.send(item).await.map_err(|_| BrokerError::Closed)
    }

    pub fn try_send(&self, item: T) -> Result<(), BrokerError> {
        self.0.try_send(item).map_err(|_| BrokerError::Closed)
    }
}

impl<T> Receiver<T> {
    pub async fn recv(&mut self) -> Option<T> {
        self.0.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_then_recv_is_fifo() {
        let (tx, mut rx) = channel::<i32>(8);
        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
    }

    #[tokio::test]
    async fn send_after_receiver_dropped_errors_closed() {
        let (tx, rx) = channel::<i32>(8);
        drop(rx);
        let err = tx.send(1).await.unwrap_err();
        assert!(matches!(err, BrokerError::Closed));
    }
}
