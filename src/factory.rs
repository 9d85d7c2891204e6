use crate::combinators::guarded;
use crate::poly::WeakProducer;
use crate::{CancellationToken, Consumer, Context, Fault, Nested, Outcome, Producer, Value};
use futures::future::{self, Either};
use futures::pin_mut;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Starts work on a [`Context`] and hands back a [`Consumer`] for its result.
///
/// Consumers created by a factory carry the factory's context, so the
/// continuations chained onto them run there too.
///
/// ```
/// use promise_chain::{Context, Error, Outcome, TaskFactory};
///
/// let factory = TaskFactory::new(Context::inline());
/// let answer = factory.run(|| Ok::<_, Error>(6)).then(|x| Ok(x * 7));
/// assert_eq!(answer.wait(), Outcome::Fulfilled(42));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TaskFactory {
    context: Context,
}

impl TaskFactory {
    pub fn new(context: Context) -> Self {
        TaskFactory { context }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Queues `work` on the factory context.
    pub fn run<T, E, F>(&self, work: F) -> Consumer<T, E>
    where
        T: Value,
        E: Fault,
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        let (producer, consumer) = Producer::with_context(self.context.clone());
        self.context.execute(Box::new(move || {
            producer.try_complete(guarded(work).into());
        }));
        consumer
    }

    /// Queues `work` unless `token` gets cancelled first.
    ///
    /// Cancelling the token before the work has started cancels the returned
    /// promise and the work never runs. Once started, the work is expected to
    /// poll the token itself; an error for which
    /// [`Fault::is_cancellation`] holds while the token is cancelled settles
    /// the promise as cancelled rather than faulted.
    pub fn run_with_token<T, E, F>(&self, token: &CancellationToken, work: F) -> Consumer<T, E>
    where
        T: Value,
        E: Fault,
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        let (producer, consumer) = Producer::with_context(self.context.clone());
        if token.is_cancelled() {
            tracing::debug!("token cancelled before the work was queued");
            producer.try_cancel();
            return consumer;
        }

        let started = Arc::new(AtomicBool::new(false));
        let weak = producer.downgrade();
        let job_started = started.clone();
        let job_token = token.clone();
        self.context.execute(Box::new(move || {
            if job_started.swap(true, Ordering::AcqRel) {
                return;
            }
            if job_token.is_cancelled() {
                producer.try_cancel();
                return;
            }
            let outcome = match guarded(work) {
                Ok(value) => Outcome::Fulfilled(value),
                Err(error) if error.is_cancellation() && job_token.is_cancelled() => {
                    tracing::debug!("work stopped on cancellation");
                    Outcome::Cancelled
                }
                Err(error) => Outcome::faulted(error),
            };
            producer.try_complete(outcome);
        }));

        if !consumer.is_completed() {
            watch(token.clone(), &consumer, weak, started);
        }
        consumer
    }

    /// Queues `work`, which itself returns a promise, and adopts that
    /// promise's outcome.
    ///
    /// Work that hands back no promise faults the result with
    /// [`Error::MissingFuture`](crate::Error::MissingFuture).
    pub fn run_nested<U, E, N, F>(&self, work: F) -> Consumer<U, E>
    where
        U: Value,
        E: Fault,
        N: Nested<U, E>,
        F: FnOnce() -> N + Send + 'static,
    {
        self.run(move || work().into_nested()).then_future(|nested| nested)
    }

    /// [`run_nested`](TaskFactory::run_nested) with the start check of
    /// [`run_with_token`](TaskFactory::run_with_token).
    pub fn run_nested_with_token<U, E, N, F>(&self, token: &CancellationToken, work: F) -> Consumer<U, E>
    where
        U: Value,
        E: Fault,
        N: Nested<U, E>,
        F: FnOnce() -> N + Send + 'static,
    {
        self.run_with_token(token, move || work().into_nested())
            .then_future(|nested| nested)
    }

    pub fn fulfilled<T: Value, E: Fault>(&self, value: T) -> Consumer<T, E> {
        self.completed(Outcome::Fulfilled(value))
    }

    pub fn faulted<T: Value, E: Fault>(&self, error: E) -> Consumer<T, E> {
        self.completed(Outcome::faulted(error))
    }

    pub fn cancelled<T: Value, E: Fault>(&self) -> Consumer<T, E> {
        self.completed(Outcome::Cancelled)
    }

    fn completed<T: Value, E: Fault>(&self, outcome: Outcome<T, E>) -> Consumer<T, E> {
        let (producer, consumer) = Producer::with_context(self.context.clone());
        producer.try_complete(outcome);
        consumer
    }
}

/// Cancels the promise if `token` fires before the work claims `started`.
///
/// The watcher only holds a weak producer, so work that is dropped without
/// running still faults the promise.
fn watch<T, E>(token: CancellationToken, consumer: &Consumer<T, E>, weak: WeakProducer<T, E>, started: Arc<AtomicBool>)
where
    T: Value,
    E: Fault,
{
    let pool = match Context::pool() {
        Context::Pool(pool) => pool,
        _ => {
            tracing::warn!("no worker pool to watch the token, cancellation applies when the work starts");
            return;
        }
    };
    let completion = consumer.completion();
    pool.spawn_ok(async move {
        let cancelled = token.cancelled();
        pin_mut!(cancelled, completion);
        if let Either::Left(_) = future::select(cancelled, completion).await {
            if let Some(producer) = weak.upgrade() {
                if !started.swap(true, Ordering::AcqRel) && producer.try_cancel() {
                    tracing::debug!("token cancelled before the work started");
                }
            }
        }
    });
}
