use std::any::Any;
use std::fmt::Debug;

/// Failures raised by the promise machinery itself rather than by user code.
///
/// User error types embed these through `From<Error>`, which is how the engine
/// reports a panicking continuation or a dropped producer without knowing the
/// caller's error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A cancellation request was observed by the running work.
    #[error("operation was cancelled")]
    Cancelled,
    /// A future-returning continuation produced no future to unwrap.
    #[error("continuation returned no future to unwrap")]
    MissingFuture,
    /// Every producer went away without completing the promise.
    #[error("producer dropped without completing the promise")]
    ProducerDropped,
    /// User code panicked while the engine was running it.
    #[error("continuation panicked: {0}")]
    Panicked(String),
}

/// Discriminant of [`Error`], used when filtering with
/// [`Consumer::catch`](crate::Consumer::catch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Cancelled,
    MissingFuture,
    ProducerDropped,
    Panicked,
}

/// Bound on every error type that can fault a promise.
///
/// `kind` is what `catch` matches on: two errors are caught by the same filter
/// exactly when their kinds compare equal.
///
/// ```
/// use promise_chain::{Error, Fault};
///
/// #[derive(Debug, Clone, thiserror::Error)]
/// enum FetchError {
///     #[error("timed out")]
///     Timeout,
///     #[error(transparent)]
///     Engine(#[from] Error),
/// }
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum FetchKind {
///     Timeout,
///     Engine,
/// }
///
/// impl Fault for FetchError {
///     type Kind = FetchKind;
///
///     fn kind(&self) -> FetchKind {
///         match self {
///             FetchError::Timeout => FetchKind::Timeout,
///             FetchError::Engine(_) => FetchKind::Engine,
///         }
///     }
///
///     fn is_cancellation(&self) -> bool {
///         matches!(self, FetchError::Engine(Error::Cancelled))
///     }
/// }
/// ```
pub trait Fault: std::error::Error + From<Error> + Clone + Send + Sync + 'static {
    type Kind: PartialEq + Debug + Send + 'static;

    fn kind(&self) -> Self::Kind;

    /// Whether this error reports an observed cancellation request.
    fn is_cancellation(&self) -> bool {
        false
    }
}

impl Fault for Error {
    type Kind = ErrorKind;

    fn kind(&self) -> ErrorKind {
        match self {
            Error::Cancelled => ErrorKind::Cancelled,
            Error::MissingFuture => ErrorKind::MissingFuture,
            Error::ProducerDropped => ErrorKind::ProducerDropped,
            Error::Panicked(_) => ErrorKind::Panicked,
        }
    }

    fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Ordered, non-empty collection of the errors that faulted a promise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSet<E> {
    primary: E,
    others: Vec<E>,
}

impl<E> ErrorSet<E> {
    pub fn new(primary: E) -> Self {
        ErrorSet {
            primary,
            others: Vec::new(),
        }
    }

    /// Builds a set from `errors`, or `None` when there are none.
    pub fn from_errors<I: IntoIterator<Item = E>>(errors: I) -> Option<Self> {
        let mut errors = errors.into_iter();
        let mut set = ErrorSet::new(errors.next()?);
        set.others.extend(errors);
        Some(set)
    }

    pub fn push(&mut self, error: E) {
        self.others.push(error);
    }

    /// The first error; the one `catch` filters on.
    pub fn primary(&self) -> &E {
        &self.primary
    }

    pub fn into_primary(self) -> E {
        self.primary
    }

    pub fn len(&self) -> usize {
        1 + self.others.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        std::iter::once(&self.primary).chain(self.others.iter())
    }

    pub fn into_vec(self) -> Vec<E> {
        let mut errors = Vec::with_capacity(self.len());
        errors.push(self.primary);
        errors.extend(self.others);
        errors
    }
}

impl<E> From<E> for ErrorSet<E> {
    fn from(error: E) -> Self {
        ErrorSet::new(error)
    }
}

/// Human-readable text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
