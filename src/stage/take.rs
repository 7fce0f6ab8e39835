//! Bounded consumer: takes exactly K items, then triggers global shutdown.

use tokio::task::JoinHandle;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::link::{LinkReceiver, LinkSender, RecvStatus, SendStatus};
use crate::pipeline::EventSender;

/// Spawn the bounded consumer.
///
/// Repeats `count` times: receive the next merged item and forward it to
/// the results link, each wait raced against cancellation. The stage holds
/// a [`CancelGuard`](crate::cancel::CancelGuard) for its whole body, so the
/// cancellation signal fires exactly once on every exit path: the bound
/// reached, upstream closed, downstream gone, or an earlier cancellation.
/// This is the sole origin of normal shutdown: once the guard releases, the
/// stop ripples backward through merge, workers, projection and generator.
pub fn spawn_take<T>(
    input: LinkReceiver<T>,
    output: LinkSender<T>,
    count: usize,
    token: CancelToken,
    events: EventSender,
) -> JoinHandle<Result<()>>
where
    T: Send + 'static,
{
    tokio::spawn(async move {
        tracing::debug!(count, "take stage started");
        events.send_stage_started("take");

        let guard = token.guard();
        let mut taken: u64 = 0;
        for _ in 0..count {
            match input.recv_until(&token).await {
                RecvStatus::Item(item) => match output.send_until(item, &token).await {
                    SendStatus::Delivered => taken += 1,
                    SendStatus::Stopped | SendStatus::Closed => break,
                },
                RecvStatus::Closed => {
                    tracing::debug!(taken, "take stage: upstream closed early");
                    break;
                }
                RecvStatus::Stopped => {
                    tracing::debug!(taken, "take stage cancelled");
                    break;
                }
            }
        }

        // The one shutdown trigger, released on every exit path.
        drop(guard);

        tracing::debug!(taken, "take stage finished");
        events.send_stage_finished("take", taken);
        events.send_eos();
        Ok(())
    })
}
