//! Worker pool: fans the typed stream out to parallel predicate workers.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::link::{link, LinkReceiver, LinkSender, RecvStatus, SendStatus};
use crate::pipeline::EventSender;
use crate::stage::Accept;

/// Spawn exactly `workers` predicate workers over one shared typed link.
///
/// Every worker holds a clone of the same [`LinkReceiver`], and the link's
/// multi-consumer delivery guarantees each item reaches exactly one worker:
/// no duplication, no loss while the link is open. That at-most-once
/// delivery is the load-distribution mechanism; there is no dispatcher.
///
/// Each worker evaluates the predicate per item: accepted items are
/// forwarded to the worker's own output (racing the handoff against
/// cancellation), rejected items are discarded. A worker terminates, closing
/// its output, when the shared link closes or cancellation fires, whichever
/// happens first. Within one worker's output, item order matches the order
/// it won items off the shared link.
///
/// Returns the worker task handles and one output receiver per worker, in
/// worker order, ready for [`spawn_merge`](crate::stage::spawn_merge).
pub fn spawn_worker_pool<A, T>(
    accept: Arc<A>,
    input: LinkReceiver<T>,
    workers: usize,
    capacity: usize,
    token: &CancelToken,
    events: &EventSender,
) -> (Vec<JoinHandle<Result<()>>>, Vec<LinkReceiver<T>>)
where
    A: Accept<T> + 'static,
    T: Send + 'static,
{
    let mut handles = Vec::with_capacity(workers);
    let mut outputs = Vec::with_capacity(workers);

    for index in 0..workers {
        let (tx, rx) = link(capacity);
        handles.push(spawn_worker(
            index,
            accept.clone(),
            input.clone(),
            tx,
            token.clone(),
            events.clone(),
        ));
        outputs.push(rx);
    }

    // The pool's own receiver handle is not a consumer; with zero workers
    // dropping it here closes the typed link immediately.
    drop(input);

    (handles, outputs)
}

fn spawn_worker<A, T>(
    index: usize,
    accept: Arc<A>,
    input: LinkReceiver<T>,
    output: LinkSender<T>,
    token: CancelToken,
    events: EventSender,
) -> JoinHandle<Result<()>>
where
    A: Accept<T> + 'static,
    T: Send + 'static,
{
    tokio::spawn(async move {
        let name = format!("worker-{index}");
        tracing::debug!(worker = %name, predicate = accept.name(), "worker started");
        events.send_stage_started(name.clone());

        let mut accepted: u64 = 0;
        loop {
            match input.recv_until(&token).await {
                RecvStatus::Item(item) => {
                    if !accept.accept(&item) {
                        continue;
                    }
                    match output.send_until(item, &token).await {
                        SendStatus::Delivered => accepted += 1,
                        SendStatus::Stopped | SendStatus::Closed => break,
                    }
                }
                RecvStatus::Closed => {
                    tracing::debug!(worker = %name, "shared link drained");
                    break;
                }
                RecvStatus::Stopped => {
                    tracing::debug!(worker = %name, "worker cancelled");
                    break;
                }
            }
        }

        tracing::debug!(worker = %name, accepted, "worker finished");
        events.send_stage_finished(name, accepted);
        Ok(())
    })
}
