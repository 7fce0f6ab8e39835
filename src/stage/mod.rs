//! Pipeline stages and the traits they are built from.
//!
//! Each stage runs in its own tokio task and talks to its neighbours over
//! [links](crate::link). Every stage follows the same lifecycle: it runs
//! until either its upstream link closes (draining) or the
//! [`CancelToken`](crate::cancel::CancelToken) fires (cancelling), and both
//! paths converge on the same terminal state: output link closed, no
//! further sends. Output closure happens structurally when the stage's task
//! returns and drops its sender.
//!
//! The injected collaborators are modelled as three small traits:
//!
//! - [`Generate`]: the zero-argument value source driving the pipeline
//! - [`Convert`]: the projection's checked conversion from raw to typed
//! - [`Accept`]: the pure predicate each worker applies
//!
//! Closures can be used directly via [`generate_fn`], [`convert_fn`] and
//! [`accept_fn`].

use std::marker::PhantomData;

use crate::error::Result;

mod generate;
mod merge;
mod project;
mod take;
mod worker;

pub use generate::spawn_generate;
pub use merge::spawn_merge;
pub use project::spawn_project;
pub use take::spawn_take;
pub use worker::spawn_worker_pool;

/// A source of raw values.
///
/// Called once per generated item, unboundedly; the generator stage only
/// calls it when a downstream consumer is ready for the next value, so the
/// source never runs more than one value ahead of demand. It must not block
/// indefinitely. A panic here is fatal to the whole pipeline.
pub trait Generate: Send {
    /// The type of raw value this source produces.
    type Raw: Send + 'static;

    /// Produce the next raw value.
    fn next_value(&mut self) -> Self::Raw;

    /// Get the name of this source.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A checked conversion from raw to typed items.
///
/// An `Err` is a contract breach between the value source and the
/// pipeline's element type. It is fatal and cancels the pipeline, never a
/// recoverable skip.
pub trait Convert: Send {
    /// The raw type this conversion accepts.
    type Raw: Send + 'static;

    /// The typed item this conversion produces.
    type Out: Send + 'static;

    /// Convert one raw value.
    fn convert(&mut self, raw: Self::Raw) -> Result<Self::Out>;

    /// Get the name of this conversion.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// An accept decision applied to each typed item by the worker pool.
///
/// Must be pure: side-effect-free and safely callable from all workers
/// concurrently, with no shared mutable state.
pub trait Accept<T>: Send + Sync {
    /// Decide whether the item passes into the merged output.
    fn accept(&self, item: &T) -> bool;

    /// Get the name of this predicate.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A value source backed by a closure. See [`generate_fn`].
pub struct GenerateFn<F, R> {
    f: F,
    _r: PhantomData<R>,
}

impl<F, R> Generate for GenerateFn<F, R>
where
    F: FnMut() -> R + Send,
    R: Send + 'static,
{
    type Raw = R;

    fn next_value(&mut self) -> R {
        (self.f)()
    }

    fn name(&self) -> &str {
        "generate_fn"
    }
}

/// Create a value source from a closure.
///
/// # Example
///
/// ```rust,ignore
/// let mut next = 0u64;
/// let source = generate_fn(move || {
///     next += 1;
///     next
/// });
/// ```
pub fn generate_fn<F, R>(f: F) -> GenerateFn<F, R>
where
    F: FnMut() -> R + Send,
    R: Send + 'static,
{
    GenerateFn { f, _r: PhantomData }
}

/// A conversion backed by a closure. See [`convert_fn`].
pub struct ConvertFn<F, R, T> {
    f: F,
    _r: PhantomData<R>,
    _t: PhantomData<T>,
}

impl<F, R, T> Convert for ConvertFn<F, R, T>
where
    F: FnMut(R) -> Result<T> + Send,
    R: Send + 'static,
    T: Send + 'static,
{
    type Raw = R;
    type Out = T;

    fn convert(&mut self, raw: R) -> Result<T> {
        (self.f)(raw)
    }

    fn name(&self) -> &str {
        "convert_fn"
    }
}

/// Create a conversion from a closure.
pub fn convert_fn<F, R, T>(f: F) -> ConvertFn<F, R, T>
where
    F: FnMut(R) -> Result<T> + Send,
    R: Send + 'static,
    T: Send + 'static,
{
    ConvertFn {
        f,
        _r: PhantomData,
        _t: PhantomData,
    }
}

/// A predicate backed by a closure. See [`accept_fn`].
pub struct AcceptFn<F, T> {
    f: F,
    _t: PhantomData<fn(&T)>,
}

impl<F, T> Accept<T> for AcceptFn<F, T>
where
    F: Fn(&T) -> bool + Send + Sync,
{
    fn accept(&self, item: &T) -> bool {
        (self.f)(item)
    }

    fn name(&self) -> &str {
        "accept_fn"
    }
}

/// Create a predicate from a closure.
pub fn accept_fn<F, T>(f: F) -> AcceptFn<F, T>
where
    F: Fn(&T) -> bool + Send + Sync,
{
    AcceptFn { f, _t: PhantomData }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_fn_calls_closure() {
        let mut next = 0u64;
        let mut source = generate_fn(move || {
            next += 1;
            next
        });
        assert_eq!(source.next_value(), 1);
        assert_eq!(source.next_value(), 2);
    }

    #[test]
    fn convert_fn_passes_through_result() {
        let mut convert = convert_fn(|raw: i64| {
            u64::try_from(raw)
                .map_err(|_| crate::Error::TypeMismatch(format!("negative value {raw}")))
        });
        assert_eq!(convert.convert(7).unwrap(), 7);
        assert!(convert.convert(-1).is_err());
    }

    #[test]
    fn accept_fn_is_shareable() {
        let accept = std::sync::Arc::new(accept_fn(|v: &u64| v % 2 == 0));
        assert!(accept.accept(&4));
        assert!(!accept.accept(&3));
    }
}
