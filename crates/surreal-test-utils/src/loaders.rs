//! Scripted loaders and stand-in asset types.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Poll, Waker};

use parking_lot::Mutex;
use surreal_assets::{Asset, AssetError, AssetLoader, LoadContext, LoadFuture, VirtualPath};

#[derive(Default)]
struct GateState {
    open: bool,
    wakers: Vec<Waker>,
}

/// Holds loads back until the test opens it.
///
/// Clones share the same gate. Opening is permanent.
#[derive(Clone, Default)]
pub struct Gate {
    state: Arc<Mutex<GateState>>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let every waiting and future load through.
    pub fn open(&self) {
        let wakers = {
            let mut state = self.state.lock();
            state.open = true;
            std::mem::take(&mut state.wakers)
        };
        for waker in wakers {
            waker.wake();
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Resolves once the gate is open.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let state = self.state.clone();
        futures_lite::future::poll_fn(move |cx| {
            let mut state = state.lock();
            if state.open {
                Poll::Ready(())
            } else {
                state.wakers.push(cx.waker().clone());
                Poll::Pending
            }
        })
    }
}

/// Counts how many times a loader was invoked.
#[derive(Clone, Default)]
pub struct LoadCounter {
    count: Arc<AtomicUsize>,
}

impl LoadCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    fn increment(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records every `dispose` call it observes, by name.
#[derive(Clone, Default)]
pub struct DisposeTracker {
    disposed: Arc<Mutex<Vec<String>>>,
}

impl DisposeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: impl Into<String>) {
        self.disposed.lock().push(name.into());
    }

    /// Total number of dispose calls.
    pub fn count(&self) -> usize {
        self.disposed.lock().len()
    }

    /// Number of dispose calls for `name`.
    pub fn count_for(&self, name: &str) -> usize {
        self.disposed.lock().iter().filter(|n| *n == name).count()
    }

    pub fn names(&self) -> Vec<String> {
        self.disposed.lock().clone()
    }
}

/// A stand-in for a GPU texture.
#[derive(Debug)]
pub struct Texture {
    pub name: String,
    tracker: Option<DisposeTracker>,
}

impl Texture {
    pub fn new(path: &VirtualPath) -> Self {
        Self {
            name: path.to_string(),
            tracker: None,
        }
    }

    /// Record disposal of this texture into `tracker`.
    pub fn with_tracker(mut self, tracker: &DisposeTracker) -> Self {
        self.tracker = Some(tracker.clone());
        self
    }
}

impl std::fmt::Debug for DisposeTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisposeTracker").field("count", &self.count()).finish()
    }
}

impl Asset for Texture {
    fn type_name() -> &'static str {
        "Texture"
    }

    fn estimated_size(&self) -> usize {
        self.name.len()
    }

    fn dispose(&self) {
        if let Some(tracker) = &self.tracker {
            tracker.record(self.name.clone());
        }
    }
}

/// A stand-in for an audio clip.
#[derive(Debug)]
pub struct Sound {
    pub name: String,
}

impl Sound {
    pub fn new(path: &VirtualPath) -> Self {
        Self {
            name: path.to_string(),
        }
    }
}

impl Asset for Sound {
    fn type_name() -> &'static str {
        "Sound"
    }
}

#[derive(Clone)]
enum Outcome {
    Succeed,
    Fail(String),
    Panic(String),
}

/// A loader whose behavior is chosen by the test.
///
/// By default it builds the asset with the given constructor as soon as it
/// is polled. It can be held behind a [`Gate`], made to fail or to panic.
pub struct ScriptedLoader<A: Asset> {
    make: Arc<dyn Fn(&VirtualPath) -> A + Send + Sync>,
    outcome: Outcome,
    gate: Option<Gate>,
    calls: LoadCounter,
    disposed: Option<DisposeTracker>,
}

impl<A: Asset> ScriptedLoader<A> {
    pub fn new(make: impl Fn(&VirtualPath) -> A + Send + Sync + 'static) -> Self {
        Self {
            make: Arc::new(make),
            outcome: Outcome::Succeed,
            gate: None,
            calls: LoadCounter::new(),
            disposed: None,
        }
    }

    /// Wait for `gate` before producing anything.
    pub fn gated(mut self, gate: &Gate) -> Self {
        self.gate = Some(gate.clone());
        self
    }

    /// Count invocations into `counter`.
    pub fn counted(mut self, counter: &LoadCounter) -> Self {
        self.calls = counter.clone();
        self
    }

    /// Fail every load with a loader error carrying `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.outcome = Outcome::Fail(message.into());
        self
    }

    /// Panic with `message` in every load.
    pub fn panicking(mut self, message: impl Into<String>) -> Self {
        self.outcome = Outcome::Panic(message.into());
        self
    }

    /// Record `loader:<type name>` into `tracker` when the loader is disposed.
    pub fn disposed_into(mut self, tracker: &DisposeTracker) -> Self {
        self.disposed = Some(tracker.clone());
        self
    }
}

impl<A: Asset> AssetLoader for ScriptedLoader<A> {
    type Asset = A;

    fn load(&self, ctx: LoadContext) -> LoadFuture<A> {
        self.calls.increment();
        let make = self.make.clone();
        let gate = self.gate.clone();
        let outcome = self.outcome.clone();

        Box::pin(async move {
            if let Some(gate) = gate {
                gate.wait().await;
            }
            match outcome {
                Outcome::Succeed => Ok(make(ctx.path())),
                Outcome::Fail(message) => Err(AssetError::loader(ctx.path(), message)),
                Outcome::Panic(message) => panic!("{}", message),
            }
        })
    }

    fn dispose(&self) {
        if let Some(tracker) = &self.disposed {
            tracker.record(format!("loader:{}", A::type_name()));
        }
    }
}
