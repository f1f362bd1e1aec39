//! Execution contexts for completion callbacks and the substrate loaders run on.
//!
//! The manager never decides on its own where code runs. Loader futures go to
//! a [`Spawner`]; continuations go to the [`Dispatcher`] captured when they
//! were registered, so a callback registered from the main thread runs on the
//! main thread even when the load finished on a worker.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;

use async_executor::Executor;
use parking_lot::Mutex;
use surreal_core::TaskPool;

/// A continuation waiting for an asset to settle.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// A unit of background work handed to a [`Spawner`].
pub type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// An execution context callbacks can be sent to.
pub trait Dispatcher: Send + Sync + 'static {
    /// Run `callback` on this context, now or later.
    fn dispatch(&self, callback: Callback);
}

/// Runs callbacks right away on whichever thread dispatches them.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateDispatcher;

impl Dispatcher for ImmediateDispatcher {
    fn dispatch(&self, callback: Callback) {
        callback();
    }
}

/// Queues callbacks until the owning context drains them.
///
/// This is the bridge for single-threaded consumers: the game loop (or UI
/// thread) calls [`run_pending`](Self::run_pending) once per tick and every
/// callback executes there, regardless of which thread completed the load.
#[derive(Default)]
pub struct QueuedDispatcher {
    queue: Mutex<VecDeque<Callback>>,
}

impl QueuedDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every queued callback on the current thread, in FIFO order.
    ///
    /// Callbacks queued while draining run in the same call. Returns how many
    /// callbacks ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            // Pop under the lock, run outside it: callbacks may dispatch again.
            let next = self.queue.lock().pop_front();
            let Some(callback) = next else {
                break;
            };
            callback();
            ran += 1;
        }
        ran
    }

    /// Number of callbacks waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

impl Dispatcher for QueuedDispatcher {
    fn dispatch(&self, callback: Callback) {
        self.queue.lock().push_back(callback);
    }
}

/// The substrate loader futures are spawned onto.
pub trait Spawner: Send + Sync + 'static {
    /// Start `task` in the background. It must not run to completion inline.
    fn spawn(&self, task: BoxedTask);
}

impl Spawner for TaskPool {
    fn spawn(&self, task: BoxedTask) {
        TaskPool::spawn(self, task).detach();
    }
}

/// A host-ticked executor: loads make progress when the host calls
/// `try_tick`/`run` on it, typically once per frame.
impl Spawner for Executor<'static> {
    fn spawn(&self, task: BoxedTask) {
        Executor::spawn(self, task).detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_immediate_dispatcher_runs_inline() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        ImmediateDispatcher.dispatch(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_queued_dispatcher_runs_fifo_on_drain() {
        let dispatcher = QueuedDispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            dispatcher.dispatch(Box::new(move || order.lock().push(i)));
        }

        assert_eq!(dispatcher.pending(), 3);
        assert!(order.lock().is_empty());

        assert_eq!(dispatcher.run_pending(), 3);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
        assert_eq!(dispatcher.pending(), 0);
    }

    #[test]
    fn test_queued_dispatcher_drains_nested_dispatches() {
        let dispatcher = Arc::new(QueuedDispatcher::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let inner_dispatcher = dispatcher.clone();
        let inner_counter = counter.clone();
        dispatcher.dispatch(Box::new(move || {
            inner_counter.fetch_add(1, Ordering::SeqCst);
            let c = inner_counter.clone();
            inner_dispatcher.dispatch(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }));

        assert_eq!(dispatcher.run_pending(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_executor_spawner_runs_on_tick() {
        let executor = Executor::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        Spawner::spawn(
            &executor,
            Box::pin(async move {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        while executor.try_tick() {}
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
