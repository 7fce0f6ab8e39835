//! Generator stage: pulls values from the injected source on demand.

use tokio::task::JoinHandle;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::link::{LinkSender, SendStatus};
use crate::pipeline::EventSender;
use crate::stage::Generate;

/// Spawn the generator stage.
///
/// Loops forever, racing two events on each iteration: the cancellation
/// token firing (stop, close the output, return) versus the output link
/// accepting a freshly generated value. The output link is a rendezvous, so
/// the source is called only when a downstream consumer is ready, never
/// more than one value ahead of demand.
///
/// The source is trusted not to error; a panic inside it is fatal to the
/// whole pipeline and surfaces at join time.
pub fn spawn_generate<G>(
    mut source: G,
    output: LinkSender<G::Raw>,
    token: CancelToken,
    events: EventSender,
) -> JoinHandle<Result<()>>
where
    G: Generate + 'static,
{
    tokio::spawn(async move {
        tracing::debug!(source = source.name(), "generate stage started");
        events.send_stage_started("generate");

        let mut produced: u64 = 0;
        loop {
            let value = source.next_value();
            match output.send_until(value, &token).await {
                SendStatus::Delivered => produced += 1,
                SendStatus::Stopped => {
                    tracing::debug!("generate stage cancelled");
                    break;
                }
                SendStatus::Closed => {
                    tracing::debug!("generate stage: downstream gone");
                    break;
                }
            }
        }

        tracing::debug!(produced, "generate stage finished");
        events.send_stage_finished("generate", produced);
        Ok(())
    })
}
