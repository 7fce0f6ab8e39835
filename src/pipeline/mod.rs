//! Pipeline assembly and the handle used to drive it.
//!
//! [`Pipeline`] wires the stages together (generator, projection, shared
//! typed link, worker pool, merge, bounded take) and
//! [`PipelineHandle`] is the caller's side: a results link, the stage task
//! handles, the cancellation token and the event bus.
//!
//! # Example
//!
//! ```rust,ignore
//! use sluice::pipeline::{Pipeline, PipelineConfig};
//! use sluice::stage::{accept_fn, convert_fn, generate_fn};
//!
//! let mut next = 0i64;
//! let pipeline = Pipeline::new(
//!     generate_fn(move || { next += 1; next }),
//!     convert_fn(|raw: i64| Ok(raw as u64)),
//!     accept_fn(|v: &u64| v % 2 == 0),
//! )
//! .with_config(PipelineConfig::default().with_workers(4).with_take(10));
//!
//! let results = pipeline.start().collect().await?;
//! assert_eq!(results.len(), 10);
//! ```

mod events;

pub use events::{EventReceiver, EventSender, PipelineEvent};

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::cancel::{CancelGuard, CancelToken};
use crate::error::{Error, Result};
use crate::link::{link, LinkReceiver};
use crate::stage::{
    spawn_generate, spawn_merge, spawn_project, spawn_take, spawn_worker_pool, Accept, Convert,
    Generate,
};

/// Configuration for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of parallel predicate workers.
    pub workers: usize,
    /// Number of results the bounded consumer takes before shutdown.
    pub take: usize,
    /// Capacity of every inter-stage link; 0 (the default) is a rendezvous,
    /// so no stage runs ahead of downstream demand.
    pub channel_capacity: usize,
    /// Optional wall-clock bound: cancel the pipeline if it has not
    /// finished within this duration. Without one, a pipeline whose take
    /// count exceeds the reachable qualifying values blocks forever.
    pub deadline: Option<Duration>,
    /// Capacity of the event bus.
    pub event_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            take: 10,
            channel_capacity: 0,
            deadline: None,
            event_capacity: 256,
        }
    }
}

impl PipelineConfig {
    /// Set the number of workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the number of results to take.
    pub fn with_take(mut self, take: usize) -> Self {
        self.take = take;
        self
    }

    /// Set the inter-stage link capacity.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Bound the run with a deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// A fully configured pipeline, ready to start.
///
/// Holds the three injected collaborators (value source, checked
/// conversion, predicate) and the run configuration.
pub struct Pipeline<G, C, A> {
    source: G,
    convert: C,
    accept: A,
    config: PipelineConfig,
}

impl<G, C, A, T> Pipeline<G, C, A>
where
    G: Generate + 'static,
    C: Convert<Raw = G::Raw, Out = T> + 'static,
    A: Accept<T> + 'static,
    T: Send + 'static,
{
    /// Create a pipeline with the default configuration.
    pub fn new(source: G, convert: C, accept: A) -> Self {
        Self {
            source,
            convert,
            accept,
            config: PipelineConfig::default(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Start every stage and return the handle driving the run.
    pub fn start(self) -> PipelineHandle<T> {
        let config = self.config;
        let token = CancelToken::new();
        let events = EventSender::new(config.event_capacity);
        let capacity = config.channel_capacity;

        let (raw_tx, raw_rx) = link(capacity);
        let (typed_tx, typed_rx) = link(capacity);
        let (result_tx, result_rx) = link(capacity);

        let mut tasks = Vec::with_capacity(config.workers + 4);
        tasks.push(spawn_generate(
            self.source,
            raw_tx,
            token.clone(),
            events.clone(),
        ));
        tasks.push(spawn_project(
            self.convert,
            raw_rx,
            typed_tx,
            token.clone(),
            events.clone(),
        ));

        let (worker_handles, worker_outputs) = spawn_worker_pool(
            Arc::new(self.accept),
            typed_rx,
            config.workers,
            capacity,
            &token,
            &events,
        );
        tasks.extend(worker_handles);

        let (closer, merged_rx) = spawn_merge(worker_outputs, capacity, &token, &events);
        tasks.push(closer);

        tasks.push(spawn_take(
            merged_rx,
            result_tx,
            config.take,
            token.clone(),
            events.clone(),
        ));

        if let Some(deadline) = config.deadline {
            tasks.push(spawn_watchdog(deadline, token.clone(), events.clone()));
        }

        events.send(PipelineEvent::Started);
        tracing::debug!(
            workers = config.workers,
            take = config.take,
            capacity,
            "pipeline started"
        );

        PipelineHandle {
            results: result_rx,
            tasks,
            guard: Some(token.guard()),
            token,
            events,
        }
    }
}

/// Watchdog for the optional deadline: cancels the pipeline on expiry.
fn spawn_watchdog(
    deadline: Duration,
    token: CancelToken,
    events: EventSender,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(deadline) => {
                tracing::warn!(?deadline, "deadline expired, cancelling pipeline");
                events.send_cancelled();
                token.cancel();
            }
        }
        Ok(())
    })
}

/// Handle to a running pipeline.
///
/// Results arrive through [`recv`](PipelineHandle::recv) as the workers
/// produce them; [`wait`](PipelineHandle::wait) joins every stage task and
/// surfaces the first error. Dropping the handle cancels the pipeline, so
/// an abandoned run never leaks tasks.
pub struct PipelineHandle<T> {
    results: LinkReceiver<T>,
    tasks: Vec<JoinHandle<Result<()>>>,
    token: CancelToken,
    guard: Option<CancelGuard>,
    events: EventSender,
}

impl<T: Send + 'static> PipelineHandle<T> {
    /// Receive the next result.
    ///
    /// Returns `None` once the bounded consumer has produced its full count
    /// (or shutdown preempted it) and the results link has closed.
    pub async fn recv(&self) -> Option<T> {
        self.results.recv().await
    }

    /// Cancel the pipeline.
    ///
    /// Idempotent; safe to call concurrently with the pipeline's own
    /// shutdown.
    pub fn cancel(&self) {
        self.token.cancel();
        self.events.send_cancelled();
    }

    /// Non-blocking check: has the cancellation signal fired?
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Subscribe to pipeline events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Wait for the pipeline to terminate.
    ///
    /// Drops the results link first so no stage can stay parked on a
    /// handoff nobody will take, then joins every stage task. Returns
    /// `Ok(())` if all stages finished cleanly, or the first error
    /// encountered; task panics are mapped to [`Error::Panicked`].
    pub async fn wait(mut self) -> Result<()> {
        drop(self.results);
        // Joining, not aborting: the guard must not fire before the stages
        // have had their orderly shutdown.
        let guard = self.guard.take();

        let mut first_error = None;
        for outcome in futures::future::join_all(self.tasks).await {
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(e) => {
                    let error = Error::Panicked {
                        stage: "pipeline".to_string(),
                        message: e.to_string(),
                    };
                    self.events.send_error(error.to_string(), None);
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }

        if let Some(guard) = guard {
            // All stages are done; the token no longer needs a trigger.
            let _ = guard.disarm();
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Drain every result, then wait for termination.
    ///
    /// Convenience for callers that want the complete bounded output:
    /// returns the collected items once all stages have terminated.
    pub async fn collect(self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.results.recv().await {
            items.push(item);
        }
        self.wait().await.map(|()| items)
    }
}
