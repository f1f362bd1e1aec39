//! Background task pool.
//!
//! Worker threads drive a shared `async_executor::Executor`, so loaders and
//! other async work can run off the thread that requested them.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use async_executor::{Executor, Task};

/// How long an idle worker sleeps before polling the executor again.
const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// A thread pool for executing async tasks.
///
/// # Example
///
/// ```
/// use surreal_core::TaskPool;
///
/// let pool = TaskPool::new(2).unwrap();
/// let task = pool.spawn(async { 21 * 2 });
/// assert_eq!(pollster::block_on(task), 42);
/// ```
pub struct TaskPool {
    executor: Arc<Executor<'static>>,
    threads: Vec<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl TaskPool {
    /// Create a new task pool with the specified number of worker threads.
    ///
    /// Fails with `InvalidInput` for zero threads, or with the OS error if a
    /// worker thread cannot be started.
    pub fn new(num_threads: usize) -> io::Result<Self> {
        if num_threads == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "TaskPool must have at least one thread",
            ));
        }

        let executor = Arc::new(Executor::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut pool = Self {
            executor,
            threads: Vec::with_capacity(num_threads),
            shutdown,
        };

        for i in 0..num_threads {
            let executor = pool.executor.clone();
            let shutdown = pool.shutdown.clone();

            let handle = thread::Builder::new()
                .name(format!("surreal-task-{}", i))
                .spawn(move || {
                    while !shutdown.load(Ordering::Relaxed) {
                        if !executor.try_tick() {
                            thread::sleep(IDLE_BACKOFF);
                        }
                    }
                })?;

            pool.threads.push(handle);
        }

        tracing::debug!("TaskPool created with {} threads", num_threads);

        Ok(pool)
    }

    /// Create a task pool with one thread per available CPU core.
    pub fn with_num_cpus() -> io::Result<Self> {
        Self::new(num_cpus::get())
    }

    /// Create a task pool that leaves one core free for the main thread.
    pub fn default_threads() -> io::Result<Self> {
        Self::new(num_cpus::get().saturating_sub(1).max(1))
    }

    /// Spawn an async task on the pool.
    ///
    /// Dropping the returned `Task` cancels it; call `detach` to let it run
    /// to completion unobserved.
    pub fn spawn<T>(&self, future: impl Future<Output = T> + Send + 'static) -> Task<T>
    where
        T: Send + 'static,
    {
        self.executor.spawn(future)
    }

    /// Get the number of worker threads in this pool.
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Stop the workers and wait for them to exit.
    ///
    /// Tasks that have not been polled to completion by then are abandoned.
    pub fn shutdown(mut self) {
        tracing::debug!("Shutting down TaskPool with {} threads", self.threads.len());

        self.shutdown.store(true, Ordering::Relaxed);

        for handle in std::mem::take(&mut self.threads) {
            if let Err(e) = handle.join() {
                tracing::error!("Task pool thread panicked: {:?}", e);
            }
        }

        tracing::debug!("TaskPool shutdown complete");
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_pool_creation() {
        let pool = TaskPool::new(2).unwrap();
        assert_eq!(pool.thread_count(), 2);
    }

    #[test]
    fn test_spawn_and_await() {
        let pool = TaskPool::new(2).unwrap();
        let task = pool.spawn(async { 42 });
        assert_eq!(pollster::block_on(task), 42);
    }

    #[test]
    fn test_tasks_run_off_the_calling_thread() {
        let pool = TaskPool::new(1).unwrap();
        let caller = thread::current().id();
        let worker = pollster::block_on(pool.spawn(async { thread::current().id() }));
        assert_ne!(caller, worker);
    }

    #[test]
    fn test_multiple_tasks() {
        let pool = TaskPool::new(4).unwrap();

        let tasks: Vec<_> = (0..10).map(|i| pool.spawn(async move { i * 2 })).collect();
        let results: Vec<_> = tasks.into_iter().map(pollster::block_on).collect();

        assert_eq!(results, vec![0, 2, 4, 6, 8, 10, 12, 14, 16, 18]);
    }

    #[test]
    fn test_default_threads() {
        let pool = TaskPool::default_threads().unwrap();
        assert!(pool.thread_count() >= 1);
        assert!(pool.thread_count() <= num_cpus::get());
    }

    #[test]
    fn test_zero_threads_is_rejected() {
        let err = TaskPool::new(0).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_shutdown() {
        let pool = TaskPool::new(2).unwrap();
        pool.spawn(async { 1 }).detach();
        pool.spawn(async { 2 }).detach();
        pool.shutdown();
    }
}
