//! Helpers shared by the unit tests.

use crate::{Error, Fault};
use parking_lot::Mutex;
use std::fmt;
use std::mem;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub(crate) enum TestError {
    #[error("ex1 #{0}")]
    Ex1(u32),
    #[error("ex2 #{0}")]
    Ex2(u32),
    #[error(transparent)]
    Engine(#[from] Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum TestKind {
    Ex1,
    Ex2,
    Engine,
}

impl Fault for TestError {
    type Kind = TestKind;

    fn kind(&self) -> TestKind {
        match self {
            TestError::Ex1(_) => TestKind::Ex1,
            TestError::Ex2(_) => TestKind::Ex2,
            TestError::Engine(_) => TestKind::Engine,
        }
    }

    fn is_cancellation(&self) -> bool {
        matches!(self, TestError::Engine(Error::Cancelled))
    }
}

struct Recorder {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

struct Message(String);

impl Visit for Message {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}

impl<S: Subscriber> Layer<S> for Recorder {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut message = Message(String::new());
        event.record(&mut message);
        self.events.lock().push((*event.metadata().level(), message.0));
    }
}

/// Runs `f` with a subscriber installed on this thread and returns the
/// messages logged at `level` meanwhile.
pub(crate) fn capture_logs<R>(level: Level, f: impl FnOnce() -> R) -> (R, Vec<String>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(Recorder { events: events.clone() });
    let result = tracing::subscriber::with_default(subscriber, f);
    let messages = mem::take(&mut *events.lock())
        .into_iter()
        .filter(|(logged, _)| *logged == level)
        .map(|(_, message)| message)
        .collect();
    (result, messages)
}
