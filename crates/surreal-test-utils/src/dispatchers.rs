//! Execution contexts for observing where callbacks run.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Sender, channel};
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::Mutex;
use surreal_assets::{Callback, Dispatcher};

/// A dedicated thread that runs dispatched callbacks in order, like the main
/// thread of a UI toolkit.
pub struct ThreadDispatcher {
    sender: Option<Sender<Callback>>,
    handle: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl ThreadDispatcher {
    pub fn new(name: impl Into<String>) -> std::io::Result<Self> {
        let (sender, receiver) = channel::<Callback>();
        let handle = thread::Builder::new().name(name.into()).spawn(move || {
            for callback in receiver {
                callback();
            }
        })?;
        let thread_id = handle.thread().id();

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            thread_id,
        })
    }

    /// The thread callbacks run on.
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }
}

impl Dispatcher for ThreadDispatcher {
    fn dispatch(&self, callback: Callback) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(callback);
        }
    }
}

impl Drop for ThreadDispatcher {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take()
            && thread::current().id() != self.thread_id
        {
            let _ = handle.join();
        }
    }
}

/// Runs callbacks inline while recording each dispatch.
#[derive(Default)]
pub struct RecordingDispatcher {
    dispatched: AtomicUsize,
    threads: Mutex<Vec<ThreadId>>,
}

impl RecordingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of callbacks dispatched so far.
    pub fn count(&self) -> usize {
        self.dispatched.load(Ordering::SeqCst)
    }

    /// The threads each dispatch happened on, in order.
    pub fn threads(&self) -> Vec<ThreadId> {
        self.threads.lock().clone()
    }
}

impl Dispatcher for RecordingDispatcher {
    fn dispatch(&self, callback: Callback) {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        self.threads.lock().push(thread::current().id());
        callback();
    }
}
