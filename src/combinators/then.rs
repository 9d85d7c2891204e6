use super::{attach_fulfilled, guarded, settle_nested};
use crate::{CancellationToken, Consumer, Fault, Value};

/// What a future-returning continuation may hand back.
///
/// The `Option` forms let a continuation say "no future", which the engine
/// reports as an [`Error::MissingFuture`](crate::Error::MissingFuture) fault.
pub trait Nested<U: Value, E: Fault> {
    fn into_nested(self) -> Result<Option<Consumer<U, E>>, E>;
}

impl<U: Value, E: Fault> Nested<U, E> for Consumer<U, E> {
    fn into_nested(self) -> Result<Option<Consumer<U, E>>, E> {
        Ok(Some(self))
    }
}

impl<U: Value, E: Fault> Nested<U, E> for Option<Consumer<U, E>> {
    fn into_nested(self) -> Result<Option<Consumer<U, E>>, E> {
        Ok(self)
    }
}

impl<U: Value, E: Fault> Nested<U, E> for Result<Consumer<U, E>, E> {
    fn into_nested(self) -> Result<Option<Consumer<U, E>>, E> {
        self.map(Some)
    }
}

impl<U: Value, E: Fault> Nested<U, E> for Result<Option<Consumer<U, E>>, E> {
    fn into_nested(self) -> Result<Option<Consumer<U, E>>, E> {
        self
    }
}

impl<T: Value, E: Fault> Consumer<T, E> {
    /// Runs `next` with the value once this promise is fulfilled.
    ///
    /// The returned promise is fulfilled with what `next` returns, or faulted
    /// with its error. A fault or cancellation of this promise is forwarded
    /// as is and `next` never runs.
    ///
    /// ```
    /// use promise_chain::{Error, Outcome, TaskFactory};
    ///
    /// let factory = TaskFactory::default();
    /// let sum = factory
    ///     .run(|| Ok::<_, Error>(12))
    ///     .then(|x| Ok(x + 1));
    /// assert_eq!(sum.wait(), Outcome::Fulfilled(13));
    /// ```
    pub fn then<U, F>(&self, next: F) -> Consumer<U, E>
    where
        U: Value,
        F: FnOnce(T) -> Result<U, E> + Send + 'static,
    {
        attach_fulfilled(self, move |value, producer| {
            producer.try_complete(guarded(|| next(value)).into());
        })
    }

    /// Like [`then`](Consumer::then), but cancels the returned promise
    /// instead of running `next` if `token` was cancelled by the time this
    /// promise is fulfilled.
    pub fn then_with_token<U, F>(&self, token: &CancellationToken, next: F) -> Consumer<U, E>
    where
        U: Value,
        F: FnOnce(T, &CancellationToken) -> Result<U, E> + Send + 'static,
    {
        let token = token.clone();
        attach_fulfilled(self, move |value, producer| {
            if token.is_cancelled() {
                tracing::debug!("token cancelled before the continuation ran");
                producer.try_cancel();
                return;
            }
            producer.try_complete(guarded(|| next(value, &token)).into());
        })
    }

    /// Runs `next` with the value and adopts the promise it returns: the
    /// result settles however that nested promise settles.
    pub fn then_future<U, N, F>(&self, next: F) -> Consumer<U, E>
    where
        U: Value,
        N: Nested<U, E>,
        F: FnOnce(T) -> N + Send + 'static,
    {
        attach_fulfilled(self, move |value, producer| {
            settle_nested(guarded(|| next(value).into_nested()), producer);
        })
    }

    /// [`then_future`](Consumer::then_future) with the token check of
    /// [`then_with_token`](Consumer::then_with_token).
    pub fn then_future_with_token<U, N, F>(&self, token: &CancellationToken, next: F) -> Consumer<U, E>
    where
        U: Value,
        N: Nested<U, E>,
        F: FnOnce(T, &CancellationToken) -> N + Send + 'static,
    {
        let token = token.clone();
        attach_fulfilled(self, move |value, producer| {
            if token.is_cancelled() {
                tracing::debug!("token cancelled before the continuation ran");
                producer.try_cancel();
                return;
            }
            settle_nested(guarded(|| next(value, &token).into_nested()), producer);
        })
    }
}
