//! Typed links between pipeline stages, backed by kanal channels.
//!
//! A link is the ordered handoff between one producing stage and its
//! consumer(s). With capacity 0 (the pipeline default) the link is a
//! rendezvous: a send completes only when a receiver is ready to take the
//! item, so stages never run ahead of downstream demand.

use crate::cancel::CancelToken;

/// Create a typed link with the given capacity.
///
/// Capacity 0 creates a rendezvous link: every send blocks until a matching
/// receive is in progress. [`LinkReceiver`] is cloneable; with several
/// concurrent receivers each item is delivered to exactly one of them,
/// which is how the worker pool distributes load.
///
/// The link closes when every sender has been dropped, or every receiver
/// has. Closing is structural: there is no close operation to call twice.
///
/// # Example
///
/// ```rust,ignore
/// use sluice::link::{link, RecvStatus};
///
/// let (tx, rx) = link::<u64>(0);
///
/// tokio::spawn(async move { tx.send(7).await });
/// assert!(matches!(rx.recv().await, Some(7)));
/// ```
pub fn link<T>(capacity: usize) -> (LinkSender<T>, LinkReceiver<T>) {
    let (tx, rx) = kanal::bounded_async(capacity);
    (LinkSender { inner: tx }, LinkReceiver { inner: rx })
}

/// Outcome of a send on a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// The item was handed to a receiver (or buffered, for capacity > 0).
    Delivered,
    /// Cancellation fired before a receiver took the item; the item is
    /// discarded.
    Stopped,
    /// Every receiver is gone; the item is discarded.
    Closed,
}

/// Outcome of a receive on a link.
#[derive(Debug)]
pub enum RecvStatus<T> {
    /// An item was received.
    Item(T),
    /// Cancellation fired before an item arrived.
    Stopped,
    /// Every sender is gone and the link is drained.
    Closed,
}

/// Sending half of a link.
///
/// Cloneable: the link stays open until the last sender drops.
pub struct LinkSender<T> {
    inner: kanal::AsyncSender<T>,
}

impl<T> Clone for LinkSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> LinkSender<T> {
    /// Send an item, waiting for a receiver.
    ///
    /// Returns [`SendStatus::Closed`] if every receiver is gone.
    pub async fn send(&self, item: T) -> SendStatus {
        match self.inner.send(item).await {
            Ok(()) => SendStatus::Delivered,
            Err(_) => SendStatus::Closed,
        }
    }

    /// Send an item, racing the handoff against cancellation.
    ///
    /// The two waits form a single atomic choice: the task blocks until a
    /// receiver takes the item, the link closes, or the token cancels,
    /// whichever happens first. An item abandoned to cancellation or
    /// closure is dropped.
    pub async fn send_until(&self, item: T, token: &CancelToken) -> SendStatus {
        tokio::select! {
            _ = token.cancelled() => SendStatus::Stopped,
            result = self.inner.send(item) => match result {
                Ok(()) => SendStatus::Delivered,
                Err(_) => SendStatus::Closed,
            },
        }
    }

    /// Check whether the link is closed (no receivers remain).
    pub fn is_closed(&self) -> bool {
        self.inner.is_disconnected()
    }
}

/// Receiving half of a link.
///
/// Cloneable: each item is delivered to exactly one receiver, never
/// duplicated, never dropped while the link is open.
pub struct LinkReceiver<T> {
    inner: kanal::AsyncReceiver<T>,
}

impl<T> Clone for LinkReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> LinkReceiver<T> {
    /// Receive the next item.
    ///
    /// Returns `None` once every sender is gone and the link is drained.
    pub async fn recv(&self) -> Option<T> {
        self.inner.recv().await.ok()
    }

    /// Receive the next item, racing the wait against cancellation.
    pub async fn recv_until(&self, token: &CancelToken) -> RecvStatus<T> {
        tokio::select! {
            _ = token.cancelled() => RecvStatus::Stopped,
            result = self.inner.recv() => match result {
                Ok(item) => RecvStatus::Item(item),
                Err(_) => RecvStatus::Closed,
            },
        }
    }

    /// Check whether the link is closed (no senders remain).
    pub fn is_closed(&self) -> bool {
        self.inner.is_disconnected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    #[tokio::test]
    async fn rendezvous_handoff() {
        let (tx, rx) = link::<u64>(0);

        let sender = tokio::spawn(async move {
            for i in 0..5 {
                assert_eq!(tx.send(i).await, SendStatus::Delivered);
            }
        });

        let mut received = Vec::new();
        while let Some(v) = rx.recv().await {
            received.push(v);
        }

        sender.await.unwrap();
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn send_reports_closed_when_receivers_gone() {
        let (tx, rx) = link::<u64>(0);
        drop(rx);
        assert_eq!(tx.send(1).await, SendStatus::Closed);
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn recv_reports_closed_when_senders_gone() {
        let (tx, rx) = link::<u64>(4);
        assert_eq!(tx.send(9).await, SendStatus::Delivered);
        drop(tx);

        // Pending items still drain before closure is observed.
        assert!(matches!(rx.recv_until(&CancelToken::new()).await, RecvStatus::Item(9)));
        assert!(matches!(rx.recv_until(&CancelToken::new()).await, RecvStatus::Closed));
    }

    #[tokio::test]
    async fn send_until_unblocks_on_cancel() {
        let (tx, _rx) = link::<u64>(0);
        let token = CancelToken::new();

        let t = token.clone();
        let sender = tokio::spawn(async move { tx.send_until(1, &t).await });

        tokio::task::yield_now().await;
        token.cancel();

        let status = tokio::time::timeout(Duration::from_secs(1), sender)
            .await
            .expect("send_until must unblock after cancel")
            .unwrap();
        assert_eq!(status, SendStatus::Stopped);
    }

    #[tokio::test]
    async fn recv_until_unblocks_on_cancel() {
        let (_tx, rx) = link::<u64>(0);
        let token = CancelToken::new();

        let t = token.clone();
        let receiver = tokio::spawn(async move { rx.recv_until(&t).await });

        tokio::task::yield_now().await;
        token.cancel();

        let status = tokio::time::timeout(Duration::from_secs(1), receiver)
            .await
            .expect("recv_until must unblock after cancel")
            .unwrap();
        assert!(matches!(status, RecvStatus::Stopped));
    }

    #[tokio::test]
    async fn cloned_receivers_get_each_item_exactly_once() {
        let (tx, rx) = link::<u64>(0);
        let count = 100u64;

        let mut consumers = Vec::new();
        for _ in 0..4 {
            let rx = rx.clone();
            consumers.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(v) = rx.recv().await {
                    seen.push(v);
                }
                seen
            }));
        }
        drop(rx);

        for i in 0..count {
            assert_eq!(tx.send(i).await, SendStatus::Delivered);
        }
        drop(tx);

        let mut all = Vec::new();
        for consumer in consumers {
            all.extend(consumer.await.unwrap());
        }

        let distinct: HashSet<u64> = all.iter().copied().collect();
        assert_eq!(all.len() as u64, count, "no item may be lost");
        assert_eq!(distinct.len() as u64, count, "no item may be duplicated");
    }
}
