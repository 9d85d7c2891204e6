use super::{attach, guarded};
use crate::{Consumer, Fault, Outcome, Value};

impl<T: Value, E: Fault> Consumer<T, E> {
    /// Runs `cleanup` once this promise completes, however it completes.
    ///
    /// The returned promise mirrors this one, unless `cleanup` fails: then it
    /// is faulted with the cleanup error, even if this promise had already
    /// faulted with another one.
    pub fn finally<F>(&self, cleanup: F) -> Consumer<T, E>
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
    {
        self.finally_with(move |_| cleanup())
    }

    /// [`finally`](Consumer::finally) with a look at the outcome being
    /// passed through.
    pub fn finally_with<F>(&self, cleanup: F) -> Consumer<T, E>
    where
        F: FnOnce(&Outcome<T, E>) -> Result<(), E> + Send + 'static,
    {
        attach(self, move |outcome, producer| {
            let settled = match guarded(|| cleanup(&outcome)) {
                Ok(()) => outcome,
                Err(error) => Outcome::faulted(error),
            };
            producer.try_complete(settled);
        })
    }
}
