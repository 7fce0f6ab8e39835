//! # Sluice
//!
//! A typed, cancellable fan-out/fan-in streaming pipeline.
//!
//! Sluice pulls values from an unbounded source, projects them onto a typed
//! stream, fans that stream out to a pool of parallel predicate workers,
//! merges the workers' outputs back into one stream, and consumes a fixed
//! number of results before signalling global shutdown. Every inter-stage
//! handoff is unbuffered by default and raced against a one-shot broadcast
//! cancellation token, so the whole pipeline tears down promptly and
//! without leaking tasks the moment the bounded consumer is satisfied.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sluice::pipeline::{Pipeline, PipelineConfig};
//! use sluice::stage::{accept_fn, convert_fn, generate_fn};
//!
//! let mut next = 0i64;
//! let primes = Pipeline::new(
//!     generate_fn(move || { next += 1; next }),
//!     convert_fn(|raw: i64| Ok(raw as u64)),
//!     accept_fn(|n: &u64| is_prime(*n)),
//! )
//! .with_config(PipelineConfig::default().with_workers(8).with_take(10))
//! .start()
//! .collect()
//! .await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod error;
pub mod link;
pub mod pipeline;
pub mod stage;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::cancel::{CancelGuard, CancelToken};
    pub use crate::error::{Error, Result};
    pub use crate::link::{link, LinkReceiver, LinkSender, RecvStatus, SendStatus};
    pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineEvent, PipelineHandle};
    pub use crate::stage::{accept_fn, convert_fn, generate_fn, Accept, Convert, Generate};
}

pub use error::{Error, Result};
