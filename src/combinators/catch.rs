use super::{attach, guarded};
use crate::{Consumer, Fault, Outcome, Value};

impl<T: Value, E: Fault> Consumer<T, E> {
    /// Recovers from a fault whose primary error is of `kind`.
    ///
    /// `handler` gets the primary error and its result settles the returned
    /// promise; if it fails, its error replaces the original one. Faults of
    /// other kinds, fulfilled values and cancellations pass through untouched,
    /// so `a.catch(K1, h1).catch(K2, h2)` behaves like nested `try` blocks.
    ///
    /// ```
    /// use promise_chain::{Error, ErrorKind, Outcome, TaskFactory};
    ///
    /// let factory = TaskFactory::default();
    /// let task = factory
    ///     .run(|| Err::<u32, _>(Error::MissingFuture))
    ///     .catch(ErrorKind::Cancelled, |_| Ok(1))
    ///     .catch(ErrorKind::MissingFuture, |_| Ok(2));
    /// assert_eq!(task.wait(), Outcome::Fulfilled(2));
    /// ```
    pub fn catch<F>(&self, kind: E::Kind, handler: F) -> Consumer<T, E>
    where
        F: FnOnce(E) -> Result<T, E> + Send + 'static,
    {
        self.catch_when(move |error| error.kind() == kind, handler)
    }

    /// Recovers from any fault. Cancellation is still not caught.
    pub fn catch_all<F>(&self, handler: F) -> Consumer<T, E>
    where
        F: FnOnce(E) -> Result<T, E> + Send + 'static,
    {
        self.catch_when(|_| true, handler)
    }

    fn catch_when<P, F>(&self, selects: P, handler: F) -> Consumer<T, E>
    where
        P: Fn(&E) -> bool + Send + 'static,
        F: FnOnce(E) -> Result<T, E> + Send + 'static,
    {
        attach(self, move |outcome, producer| {
            let settled = match outcome {
                Outcome::Faulted(errors) if selects(errors.primary()) => {
                    tracing::trace!(error = %errors.primary(), "fault caught");
                    let primary = errors.into_primary();
                    guarded(|| handler(primary)).into()
                }
                other => other,
            };
            producer.try_complete(settled);
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{TestError, TestKind};
    use crate::{check_cancellation, CancellationToken, Context, Error, Outcome, State, TaskFactory};
    use std::sync::{mpsc, Arc, Barrier};

    fn inline() -> TaskFactory {
        TaskFactory::new(Context::inline())
    }

    #[test]
    fn test_catch_return() {
        let (tx, rx) = mpsc::channel();
        let task = TaskFactory::default()
            .run(|| Err::<(), _>(TestError::Ex1(1)))
            .catch(TestKind::Ex1, move |error| {
                tx.send(error).unwrap();
                Ok(())
            });
        assert_eq!(task.wait(), Outcome::Fulfilled(()));
        assert_eq!(rx.try_recv().unwrap(), TestError::Ex1(1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_catch_replacement_value() {
        let task = inline()
            .run(|| Err::<u32, _>(TestError::Ex1(1)))
            .catch(TestKind::Ex1, |_| Ok(123));
        assert_eq!(task.wait(), Outcome::Fulfilled(123));
    }

    #[test]
    fn test_catch_throw_again() {
        let task = inline()
            .run(|| Err::<u32, _>(TestError::Ex1(1)))
            .catch(TestKind::Ex1, |_| Err(TestError::Ex1(2)));
        assert_eq!(task.wait(), Outcome::faulted(TestError::Ex1(2)));
    }

    #[test]
    fn test_catch_exception_doesnt_match() {
        let (tx, rx) = mpsc::channel::<TestError>();
        let task = inline()
            .run(|| Err::<u32, _>(TestError::Ex1(1)))
            .catch(TestKind::Ex2, move |error| {
                tx.send(error).unwrap();
                Ok(0)
            });
        assert_eq!(task.wait(), Outcome::faulted(TestError::Ex1(1)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_two_catch_first_doesnt_match_second_matches() {
        let (tx, rx) = mpsc::channel();
        let first = tx.clone();
        let task = inline()
            .run(|| Err::<(), _>(TestError::Ex1(1)))
            .catch(TestKind::Ex2, move |error| {
                first.send(("first", error)).unwrap();
                Ok(())
            })
            .catch(TestKind::Ex1, move |error| {
                tx.send(("second", error)).unwrap();
                Ok(())
            });
        assert_eq!(task.wait(), Outcome::Fulfilled(()));
        assert_eq!(rx.try_recv().unwrap(), ("second", TestError::Ex1(1)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_two_catch_first_matches_second_doesnt() {
        let (tx, rx) = mpsc::channel();
        let first = tx.clone();
        let task = inline()
            .run(|| Err::<(), _>(TestError::Ex1(1)))
            .catch(TestKind::Ex1, move |error| {
                first.send(("first", error)).unwrap();
                Ok(())
            })
            .catch(TestKind::Ex2, move |error| {
                tx.send(("second", error)).unwrap();
                Ok(())
            });
        assert_eq!(task.wait(), Outcome::Fulfilled(()));
        assert_eq!(rx.try_recv().unwrap(), ("first", TestError::Ex1(1)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_two_catch_first_rethrows_second_matches() {
        let (tx, rx) = mpsc::channel();
        let first = tx.clone();
        let task = inline()
            .run(|| Err::<(), _>(TestError::Ex1(1)))
            .catch(TestKind::Ex1, move |error| {
                first.send(("first", error)).unwrap();
                Err(TestError::Ex2(2))
            })
            .catch(TestKind::Ex2, move |error| {
                tx.send(("second", error)).unwrap();
                Ok(())
            });
        assert_eq!(task.wait(), Outcome::Fulfilled(()));
        assert_eq!(rx.try_recv().unwrap(), ("first", TestError::Ex1(1)));
        assert_eq!(rx.try_recv().unwrap(), ("second", TestError::Ex2(2)));
    }

    #[test]
    fn test_catch_forwards_value() {
        let task = inline()
            .run(|| Ok::<_, TestError>(7))
            .catch_all(|_| -> Result<i32, TestError> { unreachable!() });
        assert_eq!(task.wait(), Outcome::Fulfilled(7));
    }

    #[test]
    fn test_catch_all_does_not_catch_cancellation() {
        let source = CancellationToken::new();
        let token = source.clone();
        let ready = Arc::new(Barrier::new(2));
        let started = ready.clone();
        let (tx, rx) = mpsc::channel::<TestError>();

        let task = TaskFactory::default()
            .run_with_token(&source, move || {
                started.wait();
                while !token.is_cancelled() {
                    std::thread::yield_now();
                }
                check_cancellation::<TestError>(&token, "catch test")
            })
            .catch_all(move |error| {
                tx.send(error).unwrap();
                Ok(())
            });

        ready.wait();
        source.cancel();
        assert_eq!(task.wait().state(), State::Cancelled);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_catch_inspects_primary_error_only() {
        let factory = inline();
        let (producer, upstream) = crate::Producer::<u8, TestError>::with_context(Context::inline());
        let mut errors = crate::ErrorSet::new(TestError::Ex2(1));
        errors.push(TestError::Ex1(2));
        producer.try_reject_all(errors);

        let task = upstream.catch(TestKind::Ex1, |_| Ok(1));
        assert_eq!(task.wait().errors().map(|e| e.len()), Some(2));

        let engine = factory
            .run(|| Err::<u8, _>(TestError::Engine(Error::MissingFuture)))
            .catch(TestKind::Engine, |_| Ok(9));
        assert_eq!(engine.wait(), Outcome::Fulfilled(9));
    }
}
