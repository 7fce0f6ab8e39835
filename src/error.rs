//! Error types for Sluice.

use thiserror::Error;

/// Result type alias using Sluice's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Sluice operations.
///
/// Every variant is fatal to the pipeline that produced it: the pipeline has
/// no notion of a recoverable per-item failure, only "produced" or "not
/// produced". A stage that hits one of these cancels the whole pipeline and
/// returns the error from its task, where
/// [`PipelineHandle::wait`](crate::pipeline::PipelineHandle::wait) surfaces
/// it.
#[derive(Error, Debug)]
pub enum Error {
    /// The projection stage received a raw value its conversion rejected.
    ///
    /// This indicates a broken contract between the injected value source
    /// and the pipeline's element type, not a transient condition.
    #[error("projection type mismatch: {0}")]
    TypeMismatch(String),

    /// A stage task panicked.
    #[error("stage '{stage}' panicked: {message}")]
    Panicked {
        /// Name of the stage whose task panicked.
        stage: String,
        /// Panic payload, as reported by the task join error.
        message: String,
    },
}
