//! Thread-safe single-assignment promises with `then`, `catch`, `finally` and
//! `on_cancelled` continuations.
//!
//! A [`Producer`] completes a promise exactly once, with a value, a fault or
//! a cancellation. Any number of [`Consumer`]s can await it, read its state,
//! or chain continuations that each produce a new promise. Continuations run
//! on the [`Context`] captured when they were attached.
//!
//! # Examples
//!
//! ```
//! use promise_chain::{Error, ErrorKind, Outcome, TaskFactory};
//!
//! let factory = TaskFactory::default();
//! let task = factory
//!     .run(|| Ok::<_, Error>(20))
//!     .then(|x| if x > 10 { Err(Error::MissingFuture) } else { Ok(x) })
//!     .catch(ErrorKind::MissingFuture, |_| Ok(10))
//!     .finally(|| Ok(()));
//! assert_eq!(task.wait(), Outcome::Fulfilled(10));
//! ```

mod cancel;
mod combinators;
mod context;
mod dispatcher;
mod error;
mod factory;
mod outcome;
pub mod poly;
#[cfg(test)]
mod testing;

pub use cancel::{check_cancellation, CancellationToken};
pub use combinators::Nested;
pub use context::{Context, Executor, Job, PoolConfig};
pub use dispatcher::Dispatcher;
pub use error::{Error, ErrorKind, ErrorSet, Fault};
pub use factory::TaskFactory;
pub use outcome::{Outcome, State};
pub use poly::{Consumer, Producer};

/// The write side of a single-assignment promise.
///
/// Each method consumes this handle and reports whether it was the one that
/// completed the promise.
pub trait Promise {
    type Output;
    type Error;
    type Waiter;

    fn new() -> (Self, Self::Waiter)
    where
        Self: Sized;
    fn resolve(self, value: Self::Output) -> bool;
    fn reject(self, err: Self::Error) -> bool;
    fn cancel(self) -> bool;
}

/// Values that can travel through a promise chain: every consumer gets its
/// own clone and continuations may run on any thread.
pub trait Value: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Value for T {}
