//! A dispatcher owns one thread and runs every job sent to it on that thread,
//! in submission order. Attaching continuations through its context pins them
//! to that thread, the way a UI context would.

use crate::context::{run_job, Context, Job};
use parking_lot::Mutex;
use std::fmt;
use std::io;
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    thread_id: ThreadId,
    sender: Mutex<Option<Sender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Starts the dispatcher thread.
    pub fn spawn(name: impl Into<String>) -> io::Result<Dispatcher> {
        let name = name.into();
        let (sender, receiver) = channel::<Job>();
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            for job in receiver {
                run_job(job, "dispatcher");
            }
        })?;
        tracing::trace!(dispatcher = %name, "dispatcher started");

        Ok(Dispatcher {
            inner: Arc::new(Inner {
                name,
                thread_id: handle.thread().id(),
                sender: Mutex::new(Some(sender)),
                handle: Mutex::new(Some(handle)),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn thread_id(&self) -> ThreadId {
        self.inner.thread_id
    }

    /// Whether the calling thread is this dispatcher's thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.inner.thread_id
    }

    pub fn context(&self) -> Context {
        Context::Serial(self.clone())
    }

    /// Queues `job`. After [`shutdown`](Dispatcher::shutdown) the job is
    /// dropped without running.
    pub fn execute(&self, job: Job) {
        let rejected = match self.inner.sender.lock().as_ref() {
            Some(sender) => sender.send(job).err().map(|returned| returned.0),
            None => Some(job),
        };
        // Dropping a job can complete promises, so the lock is released first.
        if let Some(job) = rejected {
            tracing::warn!(dispatcher = %self.inner.name, "dispatcher is shut down, dropping job");
            drop(job);
        }
    }

    /// Stops accepting jobs, lets the queued ones finish and joins the thread.
    ///
    /// Called from the dispatcher's own thread it only closes the queue.
    pub fn shutdown(&self) {
        self.inner.sender.lock().take();
        if self.is_current() {
            return;
        }
        let handle = self.inner.handle.lock().take();
        if let Some(handle) = handle {
            join(&self.inner.name, handle);
        }
    }
}

fn join(name: &str, handle: JoinHandle<()>) {
    if handle.join().is_err() {
        tracing::error!(dispatcher = %name, "dispatcher thread panicked");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.sender.get_mut().take();
        if thread::current().id() == self.thread_id {
            return;
        }
        if let Some(handle) = self.handle.get_mut().take() {
            join(&self.name, handle);
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.inner.name)
            .field("thread_id", &self.inner.thread_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::capture_logs;
    use tracing::Level;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_jobs_run_in_order_on_one_thread() {
        let dispatcher = Dispatcher::spawn("test-dispatcher").unwrap();
        let (tx, rx) = mpsc::channel();
        for i in 0..10 {
            let tx = tx.clone();
            dispatcher.execute(Box::new(move || {
                tx.send((i, thread::current().id())).unwrap();
            }));
        }
        for i in 0..10 {
            let (n, id) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(n, i);
            assert_eq!(id, dispatcher.thread_id());
        }
        assert!(!dispatcher.is_current());
    }

    #[test]
    fn test_shutdown_drains_then_drops_new_jobs() {
        let dispatcher = Dispatcher::spawn("test-shutdown").unwrap();
        let (tx, rx) = mpsc::channel();
        let first = tx.clone();
        dispatcher.execute(Box::new(move || {
            thread::sleep(Duration::from_millis(20));
            first.send("queued").unwrap();
        }));
        dispatcher.shutdown();
        assert_eq!(rx.try_recv().unwrap(), "queued");

        dispatcher.execute(Box::new(move || tx.send("late").unwrap()));
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_panicked_thread_is_logged_on_join() {
        let handle = thread::spawn(|| panic!("dispatcher loop failure"));
        let ((), errors) = capture_logs(Level::ERROR, || join("test-join", handle));
        assert_eq!(errors, vec!["dispatcher thread panicked".to_string()]);

        let handle = thread::spawn(|| {});
        let ((), errors) = capture_logs(Level::ERROR, || join("test-join", handle));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_panicking_job_keeps_thread_alive() {
        let dispatcher = Dispatcher::spawn("test-panic").unwrap();
        let (tx, rx) = mpsc::channel();
        dispatcher.execute(Box::new(|| panic!("job failure")));
        dispatcher.execute(Box::new(move || tx.send(()).unwrap()));
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
