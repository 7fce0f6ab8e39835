//! Projection stage: converts the raw stream into a typed stream.

use tokio::task::JoinHandle;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::link::{LinkReceiver, LinkSender, RecvStatus, SendStatus};
use crate::pipeline::EventSender;
use crate::stage::Convert;

/// Spawn the projection stage.
///
/// For each raw item, applies the injected checked conversion. A successful
/// conversion is forwarded, racing the handoff against cancellation. A
/// failed conversion is a contract breach between the value source and the
/// pipeline's element type: the stage cancels the token and returns the
/// error, terminating the whole pipeline.
///
/// The output closes when the raw link closes, cancellation fires, or a
/// conversion fails.
pub fn spawn_project<C>(
    mut convert: C,
    input: LinkReceiver<C::Raw>,
    output: LinkSender<C::Out>,
    token: CancelToken,
    events: EventSender,
) -> JoinHandle<Result<()>>
where
    C: Convert + 'static,
{
    tokio::spawn(async move {
        tracing::debug!(convert = convert.name(), "project stage started");
        events.send_stage_started("project");

        let mut projected: u64 = 0;
        loop {
            match input.recv_until(&token).await {
                RecvStatus::Item(raw) => match convert.convert(raw) {
                    Ok(item) => match output.send_until(item, &token).await {
                        SendStatus::Delivered => projected += 1,
                        SendStatus::Stopped | SendStatus::Closed => break,
                    },
                    Err(e) => {
                        tracing::error!(error = %e, "projection failed, cancelling pipeline");
                        events.send_error(e.to_string(), Some("project".to_string()));
                        token.cancel();
                        return Err(e);
                    }
                },
                RecvStatus::Closed => {
                    tracing::debug!("project stage: upstream drained");
                    break;
                }
                RecvStatus::Stopped => {
                    tracing::debug!("project stage cancelled");
                    break;
                }
            }
        }

        tracing::debug!(projected, "project stage finished");
        events.send_stage_finished("project", projected);
        Ok(())
    })
}
