use crate::{Error, ErrorSet};

/// Where a promise is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Pending,
    Fulfilled,
    Faulted,
    Cancelled,
}

/// Terminal state of a promise. Every observer of a promise sees the same one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    Fulfilled(T),
    Faulted(ErrorSet<E>),
    Cancelled,
}

impl<T, E> Outcome<T, E> {
    pub fn faulted(error: E) -> Self {
        Outcome::Faulted(ErrorSet::new(error))
    }

    pub fn state(&self) -> State {
        match self {
            Outcome::Fulfilled(_) => State::Fulfilled,
            Outcome::Faulted(_) => State::Faulted,
            Outcome::Cancelled => State::Cancelled,
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Outcome::Fulfilled(_))
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self, Outcome::Faulted(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Fulfilled(value) => Some(value),
            _ => None,
        }
    }

    pub fn errors(&self) -> Option<&ErrorSet<E>> {
        match self {
            Outcome::Faulted(errors) => Some(errors),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U, E> {
        match self {
            Outcome::Fulfilled(value) => Outcome::Fulfilled(f(value)),
            Outcome::Faulted(errors) => Outcome::Faulted(errors),
            Outcome::Cancelled => Outcome::Cancelled,
        }
    }

    /// Splits off the value, re-typing a fault or cancellation so it can be
    /// forwarded unchanged to a promise of another value type.
    pub fn branch<U>(self) -> Result<T, Outcome<U, E>> {
        match self {
            Outcome::Fulfilled(value) => Ok(value),
            Outcome::Faulted(errors) => Err(Outcome::Faulted(errors)),
            Outcome::Cancelled => Err(Outcome::Cancelled),
        }
    }
}

impl<T, E: From<Error>> Outcome<T, E> {
    /// Collapses the outcome into a `Result`, keeping the primary error of a
    /// fault and reporting cancellation as [`Error::Cancelled`].
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Outcome::Fulfilled(value) => Ok(value),
            Outcome::Faulted(errors) => Err(errors.into_primary()),
            Outcome::Cancelled => Err(Error::Cancelled.into()),
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Fulfilled(value),
            Err(error) => Outcome::faulted(error),
        }
    }
}
