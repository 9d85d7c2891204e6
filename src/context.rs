//! Execution contexts decide where a continuation runs once the promise it
//! waits on completes.
//!
//! A context is captured when a continuation is attached, never looked up when
//! the upstream finishes, so a chain runs where it was built.

use crate::dispatcher::Dispatcher;
use crate::error::panic_message;
use futures::executor::ThreadPool;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

/// A unit of work handed to a context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Anything that can run jobs; plug one in with [`Context::custom`].
pub trait Executor: Send + Sync + 'static {
    fn execute(&self, job: Job);
}

#[derive(Clone)]
pub enum Context {
    /// A shared worker pool.
    Pool(ThreadPool),
    /// Run on whichever thread completes the upstream promise.
    ///
    /// Nested inline jobs run directly up to a small depth; deeper ones are
    /// queued and drained by the outermost inline job on that thread, so a
    /// long chain settles in constant stack. A queued job has not run yet
    /// when `execute` returns, so blocking on its result from inside an
    /// inline continuation never returns.
    Inline,
    /// A single dedicated thread, see [`Dispatcher`].
    Serial(Dispatcher),
    Custom(Arc<dyn Executor>),
}

impl Context {
    /// The process-wide default worker pool.
    ///
    /// Falls back to [`Context::Inline`] if the pool threads could not be
    /// started.
    pub fn pool() -> Context {
        match default_pool() {
            Some(pool) => Context::Pool(pool.clone()),
            None => Context::Inline,
        }
    }

    /// A dedicated worker pool built from `config`.
    pub fn pool_with(config: &PoolConfig) -> io::Result<Context> {
        config.build().map(Context::Pool)
    }

    pub fn inline() -> Context {
        Context::Inline
    }

    pub fn custom<X: Executor>(executor: X) -> Context {
        Context::Custom(Arc::new(executor))
    }

    pub fn is_serial(&self) -> bool {
        matches!(self, Context::Serial(_))
    }

    pub fn execute(&self, job: Job) {
        match self {
            Context::Pool(pool) => pool.spawn_ok(async move { run_job(job, "pool") }),
            Context::Inline => run_inline(job),
            Context::Serial(dispatcher) => dispatcher.execute(job),
            Context::Custom(executor) => executor.execute(job),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::pool()
    }
}

impl From<Dispatcher> for Context {
    fn from(dispatcher: Dispatcher) -> Self {
        Context::Serial(dispatcher)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::Pool(_) => f.write_str("Context::Pool"),
            Context::Inline => f.write_str("Context::Inline"),
            Context::Serial(dispatcher) => f.debug_tuple("Context::Serial").field(dispatcher).finish(),
            Context::Custom(_) => f.write_str("Context::Custom"),
        }
    }
}

/// Settings for a worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Worker count; `None` means one per CPU.
    pub threads: Option<usize>,
    pub name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            threads: None,
            name_prefix: "promise-chain-".to_string(),
        }
    }
}

impl PoolConfig {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn build(&self) -> io::Result<ThreadPool> {
        let mut builder = ThreadPool::builder();
        builder.name_prefix(self.name_prefix.clone());
        if let Some(threads) = self.threads {
            builder.pool_size(threads.max(1));
        }
        builder.create()
    }
}

fn default_pool() -> Option<&'static ThreadPool> {
    static DEFAULT_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();
    DEFAULT_POOL
        .get_or_init(|| match PoolConfig::default().build() {
            Ok(pool) => Some(pool),
            Err(err) => {
                tracing::error!(error = %err, "failed to start the default pool, running continuations inline");
                None
            }
        })
        .as_ref()
}

/// Inline jobs allowed to nest directly before the trampoline takes over.
const MAX_INLINE_DEPTH: usize = 32;

thread_local! {
    static INLINE_DEPTH: Cell<usize> = const { Cell::new(0) };
    static INLINE_QUEUE: RefCell<VecDeque<Job>> = const { RefCell::new(VecDeque::new()) };
}

fn run_inline(job: Job) {
    let depth = INLINE_DEPTH.with(Cell::get);
    if depth >= MAX_INLINE_DEPTH {
        INLINE_QUEUE.with(|queue| queue.borrow_mut().push_back(job));
        return;
    }

    INLINE_DEPTH.with(|d| d.set(depth + 1));
    run_job(job, "inline");
    if depth == 0 {
        while let Some(next) = INLINE_QUEUE.with(|queue| queue.borrow_mut().pop_front()) {
            run_job(next, "inline");
        }
    }
    INLINE_DEPTH.with(|d| d.set(depth));
}

/// Runs `job`, logging instead of unwinding into the executor if it panics.
pub(crate) fn run_job(job: Job, origin: &'static str) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        tracing::error!(origin, panic = %panic_message(payload.as_ref()), "job panicked");
    }
}
