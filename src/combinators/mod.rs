//! The continuation combinators: `then`, `catch`, `finally` and
//! `on_cancelled`, all inherent methods on [`Consumer`].
//!
//! Each one follows the same shape. Attaching marks the upstream's fault as
//! observed, creates a downstream promise on the upstream handle's context,
//! and registers a continuation that settles the downstream exactly once when
//! the upstream completes. User code runs behind a panic guard, so every
//! failure ends up on the downstream promise instead of unwinding.

mod catch;
mod finally;
mod on_cancelled;
mod then;

pub use then::Nested;

use crate::context::Context;
use crate::error::panic_message;
use crate::{Consumer, Error, Fault, Outcome, Producer, Value};
use std::panic::{self, AssertUnwindSafe};

/// Runs `body` with the upstream outcome and the downstream producer once
/// `upstream` completes.
pub(crate) fn attach<T, U, E, F>(upstream: &Consumer<T, E>, body: F) -> Consumer<U, E>
where
    T: Value,
    U: Value,
    E: Fault,
    F: FnOnce(Outcome<T, E>, Producer<U, E>) + Send + 'static,
{
    upstream.mark_observed();
    let context = upstream.context().clone();
    let (producer, downstream) = Producer::with_context(context.clone());
    upstream.subscribe(context, move |outcome| body((*outcome).clone(), producer));
    downstream
}

/// Like [`attach`], but faults and cancellations skip `body` and are
/// forwarded unchanged.
pub(crate) fn attach_fulfilled<T, U, E, F>(upstream: &Consumer<T, E>, body: F) -> Consumer<U, E>
where
    T: Value,
    U: Value,
    E: Fault,
    F: FnOnce(T, Producer<U, E>) + Send + 'static,
{
    attach(upstream, move |outcome, producer| match outcome.branch() {
        Ok(value) => body(value, producer),
        Err(unfulfilled) => {
            producer.try_complete(unfulfilled);
        }
    })
}

/// Calls user code, turning a panic into an [`Error::Panicked`] fault.
pub(crate) fn guarded<R, E, F>(f: F) -> Result<R, E>
where
    E: Fault,
    F: FnOnce() -> Result<R, E>,
{
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(Error::Panicked(panic_message(payload.as_ref())).into()))
}

/// Settles `producer` from what a future-returning continuation produced,
/// mirroring the nested promise when there is one.
pub(crate) fn settle_nested<U, E>(nested: Result<Option<Consumer<U, E>>, E>, producer: Producer<U, E>)
where
    U: Value,
    E: Fault,
{
    match nested {
        Ok(Some(inner)) => {
            inner.mark_observed();
            inner.subscribe(Context::Inline, move |outcome| {
                producer.try_complete((*outcome).clone());
            });
        }
        Ok(None) => {
            tracing::debug!("continuation returned no future");
            producer.try_reject(Error::MissingFuture.into());
        }
        Err(error) => {
            producer.try_reject(error);
        }
    }
}
