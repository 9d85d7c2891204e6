use crate::context::Context;
use crate::{Error, ErrorSet, Fault, Outcome, Promise, State, Value};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::task::{self, Poll, Waker};

/// The write side of a promise. Every clone may try to complete it; the first
/// attempt wins and the rest are no-ops.
///
/// # Examples
///
/// ```
/// use promise_chain::{Error, Outcome, Promise, Producer};
/// use futures::executor::block_on;
/// use std::thread;
///
/// let (promise, consumer) = Producer::<String, Error>::new();
/// let consumer2 = consumer.clone();
/// let task1 = thread::spawn(move || block_on(async {
///     println!("Received on task 1 {:?}", consumer.await);
/// }));
/// let task2 = thread::spawn(move || block_on(async {
///     println!("Received on task 2 {:?}", consumer2.await);
/// }));
/// assert!(promise.try_resolve("Hi".into()));
/// assert!(!promise.try_cancel());
/// task1.join().expect("The task1 thread has panicked.");
/// task2.join().expect("The task2 thread has panicked.");
/// ```
pub struct Producer<T: Value, E: Fault> {
    promise: Arc<Shared<T, E>>,
}

/// The read side of a promise: a cheap, cloneable handle that can be awaited,
/// polled for its state, or chained with the combinators.
///
/// A consumer remembers the [`Context`] it was created with; continuations
/// attached through it run there unless [`via`](Consumer::via) picks another.
pub struct Consumer<T: Value, E: Fault> {
    promise: Arc<Shared<T, E>>,
    context: Context,
}

/// A producer that does not count towards keeping the promise alive: once
/// every strong [`Producer`] is gone it can no longer be upgraded.
pub(crate) struct WeakProducer<T: Value, E: Fault> {
    promise: Weak<Shared<T, E>>,
}

const PENDING: u8 = 0;
const COMPLETING: u8 = 1;
const FULFILLED: u8 = 2;
const FAULTED: u8 = 3;
const CANCELLED: u8 = 4;

type Callback<T, E> = Box<dyn FnOnce(Arc<Outcome<T, E>>) + Send>;

struct Continuation<T, E> {
    context: Context,
    callback: Callback<T, E>,
}

struct Shared<T: Value, E: Fault> {
    state: AtomicU8,
    observed: AtomicBool,
    producers: AtomicUsize,
    context: Context,
    inner: Mutex<Inner<T, E>>,
}

struct Inner<T, E> {
    outcome: Option<Arc<Outcome<T, E>>>,
    continuations: Vec<Continuation<T, E>>,
    waker: Vec<Waker>,
}

impl<T: Value, E: Fault> Shared<T, E> {
    fn new(context: Context) -> Self {
        Shared {
            state: AtomicU8::new(PENDING),
            observed: AtomicBool::new(false),
            producers: AtomicUsize::new(1),
            context,
            inner: Mutex::new(Inner {
                outcome: None,
                continuations: Vec::new(),
                waker: Vec::new(),
            }),
        }
    }

    fn state(&self) -> State {
        match self.state.load(Ordering::Acquire) {
            FULFILLED => State::Fulfilled,
            FAULTED => State::Faulted,
            CANCELLED => State::Cancelled,
            _ => State::Pending,
        }
    }

    fn complete(&self, outcome: Outcome<T, E>) -> bool {
        let state = outcome.state();
        if self
            .state
            .compare_exchange(PENDING, COMPLETING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::trace!(attempted = ?state, "promise already completed");
            return false;
        }

        let outcome = Arc::new(outcome);
        let (continuations, wakers) = {
            let mut inner = self.inner.lock();
            inner.outcome = Some(outcome.clone());
            self.state.store(tag(state), Ordering::Release);
            (mem::take(&mut inner.continuations), mem::take(&mut inner.waker))
        };
        tracing::trace!(?state, continuations = continuations.len(), "promise completed");

        for waker in wakers {
            waker.wake();
        }
        for Continuation { context, callback } in continuations {
            let outcome = outcome.clone();
            context.execute(Box::new(move || callback(outcome)));
        }
        true
    }

    fn register(&self, context: Context, callback: Callback<T, E>) {
        let mut inner = self.inner.lock();
        let completed = inner.outcome.clone();
        match completed {
            Some(outcome) => {
                // Never run user code under the lock.
                drop(inner);
                context.execute(Box::new(move || callback(outcome)));
            }
            None => inner.continuations.push(Continuation { context, callback }),
        }
    }
}

impl<T: Value, E: Fault> Drop for Shared<T, E> {
    fn drop(&mut self) {
        if self.observed.load(Ordering::Acquire) {
            return;
        }
        if let Some(Outcome::Faulted(errors)) = self.inner.get_mut().outcome.as_deref() {
            tracing::warn!(
                error = %errors.primary(),
                count = errors.len(),
                "faulted promise dropped without its fault being observed"
            );
        }
    }
}

fn tag(state: State) -> u8 {
    match state {
        State::Pending => PENDING,
        State::Fulfilled => FULFILLED,
        State::Faulted => FAULTED,
        State::Cancelled => CANCELLED,
    }
}

impl<T: Value, E: Fault> Producer<T, E> {
    /// Creates a pending promise whose consumer runs continuations on `context`.
    pub fn with_context(context: Context) -> (Self, Consumer<T, E>) {
        let promise = Arc::new(Shared::new(context.clone()));
        let consumer = Consumer {
            promise: promise.clone(),
            context,
        };
        (Producer { promise }, consumer)
    }

    /// Another read handle on this promise.
    pub fn consumer(&self) -> Consumer<T, E> {
        Consumer {
            promise: self.promise.clone(),
            context: self.promise.context.clone(),
        }
    }

    pub fn try_complete(&self, outcome: Outcome<T, E>) -> bool {
        self.promise.complete(outcome)
    }

    pub fn try_resolve(&self, value: T) -> bool {
        self.try_complete(Outcome::Fulfilled(value))
    }

    pub fn try_reject(&self, error: E) -> bool {
        self.try_complete(Outcome::faulted(error))
    }

    pub fn try_reject_all(&self, errors: ErrorSet<E>) -> bool {
        self.try_complete(Outcome::Faulted(errors))
    }

    pub fn try_cancel(&self) -> bool {
        self.try_complete(Outcome::Cancelled)
    }

    /// Whether the outcome has been published. A completion still in flight
    /// on another thread reads as not completed, as it does for consumers.
    pub fn is_completed(&self) -> bool {
        self.promise.state() != State::Pending
    }

    pub(crate) fn downgrade(&self) -> WeakProducer<T, E> {
        WeakProducer {
            promise: Arc::downgrade(&self.promise),
        }
    }
}

impl<T: Value, E: Fault> WeakProducer<T, E> {
    pub(crate) fn upgrade(&self) -> Option<Producer<T, E>> {
        let promise = self.promise.upgrade()?;
        let mut producers = promise.producers.load(Ordering::Acquire);
        loop {
            if producers == 0 {
                return None;
            }
            match promise.producers.compare_exchange_weak(
                producers,
                producers + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(Producer { promise }),
                Err(actual) => producers = actual,
            }
        }
    }
}

impl<T: Value, E: Fault> Promise for Producer<T, E> {
    type Output = T;
    type Error = E;
    type Waiter = Consumer<T, E>;

    /// A pending promise on the default pool context.
    fn new() -> (Self, Self::Waiter) {
        Producer::with_context(Context::pool())
    }

    fn resolve(self, value: T) -> bool {
        self.try_resolve(value)
    }

    fn reject(self, err: E) -> bool {
        self.try_reject(err)
    }

    fn cancel(self) -> bool {
        self.try_cancel()
    }
}

impl<T: Value, E: Fault> Clone for Producer<T, E> {
    fn clone(&self) -> Self {
        self.promise.producers.fetch_add(1, Ordering::Relaxed);
        Producer {
            promise: self.promise.clone(),
        }
    }
}

impl<T: Value, E: Fault> Drop for Producer<T, E> {
    /// If this was the last producer of an unresolved promise, fault it.
    fn drop(&mut self) {
        if self.promise.producers.fetch_sub(1, Ordering::AcqRel) == 1
            && self.promise.complete(Outcome::faulted(Error::ProducerDropped.into()))
        {
            tracing::debug!("last producer dropped before completing the promise");
        }
    }
}

impl<T: Value, E: Fault> fmt::Debug for Producer<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("state", &self.promise.state())
            .finish()
    }
}

impl<T: Value, E: Fault> Consumer<T, E> {
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// The same promise, with continuations attached from here on running on
    /// `context`.
    pub fn via(&self, context: &Context) -> Self {
        Consumer {
            promise: self.promise.clone(),
            context: context.clone(),
        }
    }

    /// `Pending` until the outcome is published, then the terminal state.
    pub fn state(&self) -> State {
        self.promise.state()
    }

    pub fn is_completed(&self) -> bool {
        self.state() != State::Pending
    }

    /// The outcome if the promise has completed. Reading a fault marks it
    /// observed.
    pub fn outcome(&self) -> Option<Outcome<T, E>> {
        let outcome = self.promise.inner.lock().outcome.clone()?;
        self.mark_observed();
        Some((*outcome).clone())
    }

    /// Blocks the calling thread until the promise completes.
    ///
    /// Waiting on a dispatcher's own thread for work queued behind the current
    /// job never returns.
    pub fn wait(&self) -> Outcome<T, E> {
        futures::executor::block_on(self.clone())
    }

    /// Runs `callback` with the outcome on this consumer's context.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(Outcome<T, E>) + Send + 'static,
    {
        self.mark_observed();
        self.subscribe(self.context.clone(), move |outcome| callback((*outcome).clone()));
    }

    /// Records that someone has taken responsibility for a fault, silencing
    /// the unobserved-fault warning. Idempotent.
    pub fn mark_observed(&self) {
        self.promise.observed.store(true, Ordering::Release);
    }

    pub fn is_observed(&self) -> bool {
        self.promise.observed.load(Ordering::Acquire)
    }

    pub(crate) fn subscribe<F>(&self, context: Context, callback: F)
    where
        F: FnOnce(Arc<Outcome<T, E>>) + Send + 'static,
    {
        self.promise.register(context, Box::new(callback));
    }

    /// Resolves once the promise completes, without observing its outcome.
    pub(crate) fn completion(&self) -> impl Future<Output = ()> + Send + 'static {
        let consumer = self.clone();
        futures::future::poll_fn(move |cx| consumer.poll_outcome(cx).map(|_| ()))
    }

    fn poll_outcome(&self, cx: &mut task::Context<'_>) -> Poll<Arc<Outcome<T, E>>> {
        let mut inner = self.promise.inner.lock();
        match inner.outcome {
            Some(ref outcome) => Poll::Ready(outcome.clone()),
            None => {
                if !inner.waker.iter().any(|waker| waker.will_wake(cx.waker())) {
                    inner.waker.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl<T: Value, E: Fault> Future for Consumer<T, E> {
    type Output = Outcome<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<Self::Output> {
        self.poll_outcome(cx).map(|outcome| {
            self.mark_observed();
            (*outcome).clone()
        })
    }
}

impl<T: Value, E: Fault> Clone for Consumer<T, E> {
    fn clone(&self) -> Self {
        Consumer {
            promise: self.promise.clone(),
            context: self.context.clone(),
        }
    }
}

impl<T: Value, E: Fault> fmt::Debug for Consumer<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("state", &self.state())
            .field("context", &self.context)
            .finish()
    }
}
