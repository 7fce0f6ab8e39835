//! Fan-in merge: collapses the worker outputs into one merged link.

use futures::future::join_all;
use tokio::task::JoinHandle;

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::link::{link, LinkReceiver, RecvStatus, SendStatus};
use crate::pipeline::EventSender;

/// Spawn the fan-in merge over the given worker outputs.
///
/// One forwarding task per input relays every item it receives into the
/// merged link, racing each handoff against cancellation, until that input
/// closes or cancellation fires. A closer task joins all forwarders and
/// then releases the last sender: the merged link therefore closes exactly
/// once, and only after every worker's output has been fully drained or
/// abandoned to cancellation. The closer is structurally the final holder,
/// so premature or duplicate closing cannot be expressed.
///
/// With zero inputs there are no forwarders and the closer's release closes
/// the merged link immediately: the completion count starts satisfied.
///
/// Returns the closer handle and the merged receiver.
pub fn spawn_merge<T>(
    inputs: Vec<LinkReceiver<T>>,
    capacity: usize,
    token: &CancelToken,
    events: &EventSender,
) -> (JoinHandle<Result<()>>, LinkReceiver<T>)
where
    T: Send + 'static,
{
    let (merged_tx, merged_rx) = link(capacity);

    let mut forwarders = Vec::with_capacity(inputs.len());
    for input in inputs {
        let tx = merged_tx.clone();
        let forward_token = token.clone();
        forwarders.push(tokio::spawn(async move {
            let mut forwarded: u64 = 0;
            loop {
                match input.recv_until(&forward_token).await {
                    RecvStatus::Item(item) => {
                        match tx.send_until(item, &forward_token).await {
                            SendStatus::Delivered => forwarded += 1,
                            SendStatus::Stopped | SendStatus::Closed => break,
                        }
                    }
                    RecvStatus::Closed | RecvStatus::Stopped => break,
                }
            }
            forwarded
        }));
    }

    let closer_token = token.clone();
    let closer_events = events.clone();
    let closer = tokio::spawn(async move {
        tracing::debug!(forwarders = forwarders.len(), "merge stage started");
        closer_events.send_stage_started("merge");

        let mut merged: u64 = 0;
        for outcome in join_all(forwarders).await {
            match outcome {
                Ok(forwarded) => merged += forwarded,
                Err(e) => {
                    let error = Error::Panicked {
                        stage: "merge".to_string(),
                        message: e.to_string(),
                    };
                    tracing::error!(error = %error, "forwarder panicked, cancelling pipeline");
                    closer_events.send_error(error.to_string(), Some("merge".to_string()));
                    closer_token.cancel();
                    return Err(error);
                }
            }
        }

        // Every forwarder is done; releasing the last sender closes the
        // merged link.
        drop(merged_tx);

        tracing::debug!(merged, "merge stage finished");
        closer_events.send_stage_finished("merge", merged);
        Ok(())
    });

    (closer, merged_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkSender;
    use std::collections::HashSet;
    use std::time::Duration;

    fn worker_links(n: usize) -> (Vec<LinkSender<u64>>, Vec<LinkReceiver<u64>>) {
        (0..n).map(|_| link::<u64>(0)).unzip()
    }

    #[tokio::test]
    async fn merges_all_inputs() {
        let (senders, receivers) = worker_links(3);
        let token = CancelToken::new();
        let (closer, merged) = spawn_merge(receivers, 0, &token, &EventSender::new(16));

        let mut feeders = Vec::new();
        for (i, tx) in senders.into_iter().enumerate() {
            feeders.push(tokio::spawn(async move {
                let base = (i as u64) * 100;
                for v in 0..5u64 {
                    tx.send(base + v).await;
                }
            }));
        }

        let mut all = Vec::new();
        while let Some(v) = merged.recv().await {
            all.push(v);
        }

        for feeder in feeders {
            feeder.await.unwrap();
        }
        closer.await.unwrap().unwrap();

        let expected: HashSet<u64> = (0..3u64)
            .flat_map(|i| (0..5u64).map(move |v| i * 100 + v))
            .collect();
        let actual: HashSet<u64> = all.iter().copied().collect();
        assert_eq!(all.len(), 15);
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn merged_closes_only_after_every_input_finishes() {
        let (senders, receivers) = worker_links(2);
        let token = CancelToken::new();
        let (closer, merged) = spawn_merge(receivers, 0, &token, &EventSender::new(16));

        let mut senders = senders.into_iter();
        let first = senders.next().unwrap();
        let second = senders.next().unwrap();

        first.send(1).await;
        drop(first);
        assert_eq!(merged.recv().await, Some(1));

        // One input is still open: the merged link must stay open too.
        assert!(!merged.is_closed());

        second.send(2).await;
        drop(second);
        assert_eq!(merged.recv().await, Some(2));
        assert_eq!(merged.recv().await, None);

        closer.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn zero_inputs_closes_merged_immediately() {
        let token = CancelToken::new();
        let (closer, merged) =
            spawn_merge(Vec::<LinkReceiver<u64>>::new(), 0, &token, &EventSender::new(16));

        let item = tokio::time::timeout(Duration::from_secs(1), merged.recv())
            .await
            .expect("merged link must close without deadlock");
        assert_eq!(item, None);

        closer.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn cancellation_releases_blocked_forwarders() {
        let (senders, receivers) = worker_links(2);
        let token = CancelToken::new();
        // Nobody ever reads from the merged link.
        let (closer, _merged) = spawn_merge(receivers, 0, &token, &EventSender::new(16));

        // Park one forwarder mid-send into the merged link.
        senders[0].send(7).await;
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), closer)
            .await
            .expect("closer must finish after cancellation")
            .unwrap()
            .unwrap();
    }
}
