//! Broadcast event bus for observing a pipeline run.
//!
//! Stages publish lifecycle events through an [`EventSender`]; any number
//! of [`EventReceiver`]s obtained via [`EventSender::subscribe`] observe
//! them. The bus is lossy under backpressure: a subscriber that falls
//! further behind than the bus capacity skips the missed events and keeps
//! going, so a slow observer can never stall a stage.

use std::fmt;

use tokio::sync::broadcast;

/// A lifecycle event published by a running pipeline.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// All stages have been spawned.
    Started,

    /// A stage entered its run loop.
    StageStarted {
        /// Name of the stage.
        stage: String,
    },

    /// A stage left its run loop and closed its output.
    StageFinished {
        /// Name of the stage.
        stage: String,
        /// How many items the stage passed downstream.
        items: u64,
    },

    /// The bounded consumer is done; shutdown is underway.
    Eos,

    /// The cancellation signal fired.
    Cancelled,

    /// A stage hit a fatal error.
    Error {
        /// What went wrong.
        message: String,
        /// Which stage reported it, when known.
        stage: Option<String>,
    },
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => f.write_str("pipeline started"),
            Self::StageStarted { stage } => write!(f, "stage {stage} started"),
            Self::StageFinished { stage, items } => {
                write!(f, "stage {stage} finished after {items} items")
            }
            Self::Eos => f.write_str("end of stream"),
            Self::Cancelled => f.write_str("pipeline cancelled"),
            Self::Error {
                message,
                stage: Some(stage),
            } => write!(f, "stage {stage} failed: {message}"),
            Self::Error {
                message,
                stage: None,
            } => write!(f, "pipeline failed: {message}"),
        }
    }
}

/// Publishing side of the event bus, cloned into every stage task.
#[derive(Debug, Clone)]
pub struct EventSender {
    bus: broadcast::Sender<PipelineEvent>,
}

impl EventSender {
    /// Create a bus retaining up to `capacity` undelivered events per
    /// subscriber.
    pub fn new(capacity: usize) -> Self {
        let (bus, _) = broadcast::channel(capacity);
        Self { bus }
    }

    /// Publish an event. Publishing with no subscribers is a no-op.
    pub fn send(&self, event: PipelineEvent) {
        // An Err here only means nobody is listening.
        let _ = self.bus.send(event);
    }

    /// Publish [`PipelineEvent::StageStarted`].
    pub fn send_stage_started(&self, stage: impl Into<String>) {
        self.send(PipelineEvent::StageStarted {
            stage: stage.into(),
        });
    }

    /// Publish [`PipelineEvent::StageFinished`].
    pub fn send_stage_finished(&self, stage: impl Into<String>, items: u64) {
        self.send(PipelineEvent::StageFinished {
            stage: stage.into(),
            items,
        });
    }

    /// Publish [`PipelineEvent::Eos`].
    pub fn send_eos(&self) {
        self.send(PipelineEvent::Eos);
    }

    /// Publish [`PipelineEvent::Cancelled`].
    pub fn send_cancelled(&self) {
        self.send(PipelineEvent::Cancelled);
    }

    /// Publish [`PipelineEvent::Error`].
    pub fn send_error(&self, message: impl Into<String>, stage: Option<String>) {
        self.send(PipelineEvent::Error {
            message: message.into(),
            stage,
        });
    }

    /// Subscribe to events published from this point on.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            rx: self.bus.subscribe(),
        }
    }
}

impl Default for EventSender {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Subscribing side of the event bus.
///
/// Obtained from [`EventSender::subscribe`]; each receiver observes every
/// event published after it subscribed, independently of other receivers.
#[derive(Debug)]
pub struct EventReceiver {
    rx: broadcast::Receiver<PipelineEvent>,
}

impl EventReceiver {
    /// Wait for the next event.
    ///
    /// A receiver that lagged behind the bus capacity skips the missed
    /// events rather than failing. Returns `None` once every stage is gone
    /// and the backlog is drained.
    pub async fn recv(&mut self) -> Option<PipelineEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => break Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break None,
            }
        }
    }

    /// Pull an already-published event without waiting.
    ///
    /// Returns `None` when the backlog is empty.
    pub fn try_recv(&mut self) -> Option<PipelineEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => break Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break None,
            }
        }
    }

    /// Wait until the run reaches end of stream or a fatal error.
    ///
    /// Returns `Ok(())` on [`PipelineEvent::Eos`] and the rendered event on
    /// [`PipelineEvent::Error`].
    pub async fn wait_eos(&mut self) -> Result<(), String> {
        while let Some(event) = self.recv().await {
            match event {
                PipelineEvent::Eos => return Ok(()),
                PipelineEvent::Error { .. } => return Err(event.to_string()),
                _ => {}
            }
        }
        Err("event bus closed before end of stream".to_string())
    }
}
