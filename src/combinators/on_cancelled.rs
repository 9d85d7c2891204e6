use super::{attach, guarded};
use crate::{Consumer, Fault, Outcome, Value};

impl<T: Value, E: Fault> Consumer<T, E> {
    /// Runs `handler` only if this promise is cancelled.
    ///
    /// The returned promise stays cancelled when `handler` succeeds and is
    /// faulted with its error when it fails. Values and faults pass through.
    pub fn on_cancelled<F>(&self, handler: F) -> Consumer<T, E>
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
    {
        attach(self, move |outcome, producer| {
            let settled = match outcome {
                Outcome::Cancelled => match guarded(handler) {
                    Ok(()) => Outcome::Cancelled,
                    Err(error) => Outcome::faulted(error),
                },
                other => other,
            };
            producer.try_complete(settled);
        })
    }
}
